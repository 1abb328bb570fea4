use petgraph::algo::{has_path_connecting, is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction::{Incoming, Outgoing};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::params::Param;
use crate::ExecutionId;

/// Name of the output entry a pipeline Execution uses to list its component
/// Executions.
pub const STEPS_OUTPUT: &str = "steps";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Execution {0} does not exist")]
    UnknownExecution(ExecutionId),
    #[error("attaching {upstream} upstream of {downstream} would create a cycle")]
    Cycle {
        upstream: ExecutionId,
        downstream: ExecutionId,
    },
}

/// Upstream ids referenced by `data`/`list:data` inputs, deduplicated in
/// first-seen order.
pub fn upstream_ids(inputs: &[Param]) -> Vec<ExecutionId> {
    let mut seen = HashSet::new();
    inputs
        .iter()
        .flat_map(Param::referenced_ids)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Component Execution ids listed by the `steps` output entry.
pub fn component_ids(outputs: &[Param]) -> Vec<ExecutionId> {
    outputs
        .iter()
        .filter(|p| p.name == STEPS_OUTPUT)
        .flat_map(|p| match &p.value {
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_i64().and_then(|n| ExecutionId::try_from(n).ok()))
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        })
        .collect()
}

/// Directed upstream -> downstream relation between Executions.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<ExecutionId, ()>,
    node_indices: HashMap<ExecutionId, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges(edges: impl IntoIterator<Item = (ExecutionId, ExecutionId)>) -> Self {
        let mut g = Self::new();
        for (upstream, downstream) in edges {
            g.add_dependency(upstream, downstream);
        }
        g
    }

    pub fn add_execution(&mut self, id: ExecutionId) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(id);
        self.node_indices.insert(id, idx);
        idx
    }

    pub fn contains(&self, id: ExecutionId) -> bool {
        self.node_indices.contains_key(&id)
    }

    /// Adds the edge without checking for cycles. Repeated edges are ignored.
    pub fn add_dependency(&mut self, upstream: ExecutionId, downstream: ExecutionId) {
        let u = self.add_execution(upstream);
        let d = self.add_execution(downstream);
        if self.graph.find_edge(u, d).is_none() {
            self.graph.add_edge(u, d, ());
        }
    }

    /// True when an edge `upstream -> downstream` would close a cycle.
    pub fn would_create_cycle(&self, upstream: ExecutionId, downstream: ExecutionId) -> bool {
        if upstream == downstream {
            return true;
        }
        match (self.node_indices.get(&downstream), self.node_indices.get(&upstream)) {
            (Some(&d), Some(&u)) => has_path_connecting(&self.graph, d, u, None),
            _ => false,
        }
    }

    /// Attaches every id in `upstreams` as a direct upstream of `downstream`.
    /// `known` decides whether an id refers to an existing Execution. Nothing
    /// is added unless the whole set is accepted.
    pub fn attach<F>(
        &mut self,
        downstream: ExecutionId,
        upstreams: &[ExecutionId],
        known: F,
    ) -> Result<(), GraphError>
    where
        F: Fn(ExecutionId) -> bool,
    {
        if let Some(&missing) = upstreams.iter().find(|&&id| !known(id)) {
            return Err(GraphError::UnknownExecution(missing));
        }
        let mut trial = self.clone();
        for &upstream in upstreams {
            if trial.would_create_cycle(upstream, downstream) {
                return Err(GraphError::Cycle {
                    upstream,
                    downstream,
                });
            }
            trial.add_dependency(upstream, downstream);
        }
        *self = trial;
        Ok(())
    }

    pub fn direct_upstream(&self, id: ExecutionId) -> Vec<ExecutionId> {
        self.neighbours(id, Incoming)
    }

    pub fn direct_downstream(&self, id: ExecutionId) -> Vec<ExecutionId> {
        self.neighbours(id, Outgoing)
    }

    /// Transitive upstream closure, excluding `id` itself.
    pub fn all_upstream(&self, id: ExecutionId) -> HashSet<ExecutionId> {
        self.closure(id, Incoming)
    }

    /// Transitive downstream closure, excluding `id` itself.
    pub fn all_downstream(&self, id: ExecutionId) -> HashSet<ExecutionId> {
        self.closure(id, Outgoing)
    }

    pub fn is_dag(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }

    /// Upstream-first ordering of every Execution in the graph.
    pub fn topological_order(&self) -> Result<Vec<ExecutionId>, GraphError> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|idx| self.graph[idx]).collect())
            .map_err(|cycle| {
                let id = self.graph[cycle.node_id()];
                GraphError::Cycle {
                    upstream: id,
                    downstream: id,
                }
            })
    }

    fn neighbours(&self, id: ExecutionId, dir: petgraph::Direction) -> Vec<ExecutionId> {
        let Some(&idx) = self.node_indices.get(&id) else {
            return Vec::new();
        };
        let mut ids: Vec<ExecutionId> = self
            .graph
            .neighbors_directed(idx, dir)
            .map(|n| self.graph[n])
            .collect();
        ids.sort_unstable();
        ids
    }

    fn closure(&self, id: ExecutionId, dir: petgraph::Direction) -> HashSet<ExecutionId> {
        let mut visited = HashSet::new();
        let Some(&start) = self.node_indices.get(&id) else {
            return visited;
        };
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for next in self.graph.neighbors_directed(current, dir) {
                if visited.insert(self.graph[next]) {
                    stack.push(next);
                }
            }
        }
        visited.remove(&id);
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diamond() -> DependencyGraph {
        // 1 -> 2, 1 -> 3, 2 -> 4, 3 -> 4
        DependencyGraph::from_edges([(1, 2), (1, 3), (2, 4), (3, 4)])
    }

    #[test]
    fn test_upstream_ids_from_inputs() {
        let inputs = vec![
            Param::data("genome", 10),
            Param::new("reads", crate::ParamKind::DataList(None), json!([11, 10, "12"])),
            Param::basic("depth", 30),
        ];
        assert_eq!(upstream_ids(&inputs), vec![10, 11, 12]);
    }

    #[test]
    fn test_closures_and_order() {
        let g = diamond();
        assert!(g.is_dag());
        assert_eq!(g.direct_upstream(4), vec![2, 3]);
        assert_eq!(g.all_upstream(4), HashSet::from([1, 2, 3]));
        assert_eq!(g.all_downstream(1), HashSet::from([2, 3, 4]));
        let order = g.topological_order().unwrap();
        assert_eq!(order.first(), Some(&1));
        assert_eq!(order.last(), Some(&4));
    }

    #[test]
    fn test_attach_rejects_cycles_and_unknown_ids() {
        let mut g = diamond();
        let known = |id: ExecutionId| (1..=5).contains(&id);

        assert_eq!(
            g.attach(1, &[4], known),
            Err(GraphError::Cycle {
                upstream: 4,
                downstream: 1
            })
        );
        assert_eq!(g.attach(5, &[9], known), Err(GraphError::UnknownExecution(9)));
        assert_eq!(g.attach(2, &[2], known), Err(GraphError::Cycle { upstream: 2, downstream: 2 }));

        g.attach(5, &[4, 2], known).unwrap();
        assert_eq!(g.direct_upstream(5), vec![2, 4]);
        assert!(g.is_dag());
    }

    #[test]
    fn test_failed_attach_leaves_graph_untouched() {
        let mut g = DependencyGraph::from_edges([(1, 2)]);
        let err = g.attach(1, &[3, 2], |_| true).unwrap_err();
        assert_eq!(err, GraphError::Cycle { upstream: 2, downstream: 1 });
        assert!(!g.contains(3));
    }

    #[test]
    fn test_component_ids_read_steps_output() {
        let outputs = vec![
            Param::basic("count", "1"),
            Param::new(STEPS_OUTPUT, crate::ParamKind::Other("steps".into()), json!([7, 8])),
        ];
        assert_eq!(component_ids(&outputs), vec![7, 8]);
    }
}

// src/db/execution_ops.rs

use std::collections::HashSet;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::result::QueryResult;
use crate::models::execution::{Execution, ExecutionStatus, NewExecution, NewUpstreamEdge, UpstreamEdge};
use crate::schema::{execution_upstream, executions};
use crate::{CollectionId, CommandId, ExecutionId, SampleId};

pub struct ExecutionDraft<'a> {
    pub name: &'a str,
    pub command_id: Option<CommandId>,
    pub private: bool,
    pub sample_id: Option<SampleId>,
    pub collection_id: Option<CollectionId>,
    pub input: &'a str,
}

pub fn create_execution(conn: &mut SqliteConnection, draft: &ExecutionDraft) -> QueryResult<Execution> {
    let now = crate::now();
    let new_exec = NewExecution {
        name: draft.name,
        command_id: draft.command_id,
        private: draft.private,
        sample_id: draft.sample_id,
        collection_id: draft.collection_id,
        input: draft.input,
        status: ExecutionStatus::Created.as_str(),
        created: now,
        modified: now,
    };
    diesel::insert_into(executions::table)
        .values(&new_exec)
        .execute(conn)?;

    executions::table
        .order(executions::id.desc())
        .first(conn)
}

pub fn get_execution_by_id(conn: &mut SqliteConnection, exec_id: ExecutionId) -> QueryResult<Execution> {
    executions::table.find(exec_id).first(conn)
}

pub fn find_execution(conn: &mut SqliteConnection, exec_id: ExecutionId) -> QueryResult<Option<Execution>> {
    executions::table.find(exec_id).first(conn).optional()
}

pub fn list_executions(conn: &mut SqliteConnection, ids: &[ExecutionId]) -> QueryResult<Vec<Execution>> {
    executions::table
        .filter(executions::id.eq_any(ids.to_vec()))
        .order(executions::id.asc())
        .load(conn)
}

/// Ids currently in `status`, oldest first.
pub fn list_ids_by_status(conn: &mut SqliteConnection, status: ExecutionStatus) -> QueryResult<Vec<ExecutionId>> {
    executions::table
        .filter(executions::status.eq(status.as_str()))
        .order(executions::id.asc())
        .select(executions::id)
        .load(conn)
}

pub fn list_executions_by_sample(conn: &mut SqliteConnection, sample_id: SampleId) -> QueryResult<Vec<Execution>> {
    executions::table
        .filter(executions::sample_id.eq(sample_id))
        .order(executions::created.desc())
        .load(conn)
}

/// `(id, private, sample_id, collection_id)` for each existing id in `ids`.
pub fn privacy_rows(
    conn: &mut SqliteConnection,
    ids: &[ExecutionId],
) -> QueryResult<Vec<(ExecutionId, bool, Option<SampleId>, Option<CollectionId>)>> {
    executions::table
        .filter(executions::id.eq_any(ids.to_vec()))
        .select((
            executions::id,
            executions::private,
            executions::sample_id,
            executions::collection_id,
        ))
        .load(conn)
}

pub fn update_execution_name(conn: &mut SqliteConnection, exec_id: ExecutionId, name: &str) -> QueryResult<usize> {
    diesel::update(executions::table.find(exec_id))
        .set((executions::name.eq(name), executions::modified.eq(crate::now())))
        .execute(conn)
}

pub fn set_private(conn: &mut SqliteConnection, exec_id: ExecutionId, private: bool) -> QueryResult<usize> {
    diesel::update(executions::table.find(exec_id))
        .set((executions::private.eq(private), executions::modified.eq(crate::now())))
        .execute(conn)
}

/// Executions directly under the collection follow its flag.
pub fn set_private_in_collection(
    conn: &mut SqliteConnection,
    collection_id: CollectionId,
    private: bool,
) -> QueryResult<usize> {
    diesel::update(executions::table.filter(executions::collection_id.eq(collection_id)))
        .set((executions::private.eq(private), executions::modified.eq(crate::now())))
        .execute(conn)
}

/// Executions whose effective parent is one of `sample_ids` (no collection set).
pub fn set_private_for_samples(
    conn: &mut SqliteConnection,
    sample_ids: &[SampleId],
    private: bool,
) -> QueryResult<usize> {
    diesel::update(
        executions::table
            .filter(executions::collection_id.is_null())
            .filter(executions::sample_id.eq_any(sample_ids.to_vec())),
    )
    .set((executions::private.eq(private), executions::modified.eq(crate::now())))
    .execute(conn)
}

pub fn set_parent(
    conn: &mut SqliteConnection,
    exec_id: ExecutionId,
    sample_id: Option<SampleId>,
    collection_id: Option<CollectionId>,
    private: bool,
) -> QueryResult<usize> {
    diesel::update(executions::table.find(exec_id))
        .set((
            executions::sample_id.eq(sample_id),
            executions::collection_id.eq(collection_id),
            executions::private.eq(private),
            executions::modified.eq(crate::now()),
        ))
        .execute(conn)
}

/// Moves the row from `from` to `to`; returns 0 when it was in any other
/// state.
pub fn transition(
    conn: &mut SqliteConnection,
    exec_id: ExecutionId,
    from: ExecutionStatus,
    to: ExecutionStatus,
) -> QueryResult<usize> {
    diesel::update(
        executions::table
            .find(exec_id)
            .filter(executions::status.eq(from.as_str())),
    )
    .set((
        executions::status.eq(to.as_str()),
        executions::modified.eq(crate::now()),
    ))
    .execute(conn)
}

/// Moves `PREPARED -> RUNNING` atomically; returns 0 when the row was in any
/// other state.
pub fn mark_running(conn: &mut SqliteConnection, exec_id: ExecutionId, started: NaiveDateTime) -> QueryResult<usize> {
    diesel::update(
        executions::table
            .find(exec_id)
            .filter(executions::status.eq(ExecutionStatus::Prepared.as_str())),
    )
    .set((
        executions::status.eq(ExecutionStatus::Running.as_str()),
        executions::started.eq(Some(started)),
        executions::modified.eq(crate::now()),
    ))
    .execute(conn)
}

pub fn set_command_line(conn: &mut SqliteConnection, exec_id: ExecutionId, command_line: &str) -> QueryResult<usize> {
    diesel::update(executions::table.find(exec_id))
        .set(executions::command_line.eq(command_line))
        .execute(conn)
}

pub fn set_terminal(conn: &mut SqliteConnection, exec_id: ExecutionId, terminal: &str) -> QueryResult<usize> {
    diesel::update(executions::table.find(exec_id))
        .set(executions::terminal.eq(terminal))
        .execute(conn)
}

pub fn set_identifier(conn: &mut SqliteConnection, exec_id: ExecutionId, identifier: &str) -> QueryResult<usize> {
    diesel::update(executions::table.find(exec_id))
        .set(executions::identifier.eq(identifier))
        .execute(conn)
}

pub fn set_output(conn: &mut SqliteConnection, exec_id: ExecutionId, output: &str) -> QueryResult<usize> {
    diesel::update(executions::table.find(exec_id))
        .set(executions::output.eq(output))
        .execute(conn)
}

/// Writes the terminal state of a run in one statement.
pub fn finish(
    conn: &mut SqliteConnection,
    exec_id: ExecutionId,
    status: ExecutionStatus,
    error: &str,
    terminal: &str,
    finished: NaiveDateTime,
) -> QueryResult<usize> {
    diesel::update(executions::table.find(exec_id))
        .set((
            executions::status.eq(status.as_str()),
            executions::error.eq(error),
            executions::terminal.eq(terminal),
            executions::finished.eq(Some(finished)),
            executions::modified.eq(crate::now()),
        ))
        .execute(conn)
}

/// Marks the row ERROR only while it is still in `from`; returns 0 otherwise.
pub fn fail_if_status(
    conn: &mut SqliteConnection,
    exec_id: ExecutionId,
    from: ExecutionStatus,
    error: &str,
    finished: NaiveDateTime,
) -> QueryResult<usize> {
    diesel::update(
        executions::table
            .find(exec_id)
            .filter(executions::status.eq(from.as_str())),
    )
    .set((
        executions::status.eq(ExecutionStatus::Error.as_str()),
        executions::error.eq(error),
        executions::finished.eq(Some(finished)),
        executions::modified.eq(crate::now()),
    ))
    .execute(conn)
}

/// Marks a run that was abandoned mid-flight. Rows already finished are left
/// untouched.
pub fn abandon_if_unfinished(
    conn: &mut SqliteConnection,
    exec_id: ExecutionId,
    error: &str,
    finished: NaiveDateTime,
) -> QueryResult<usize> {
    diesel::update(
        executions::table
            .find(exec_id)
            .filter(executions::finished.is_null()),
    )
    .set((
        executions::status.eq(ExecutionStatus::Error.as_str()),
        executions::error.eq(error),
        executions::finished.eq(Some(finished)),
        executions::modified.eq(crate::now()),
    ))
    .execute(conn)
}

pub fn add_upstream(conn: &mut SqliteConnection, upstream_id: ExecutionId, downstream_id: ExecutionId) -> QueryResult<usize> {
    diesel::insert_into(execution_upstream::table)
        .values(&NewUpstreamEdge { upstream_id, downstream_id })
        .on_conflict((execution_upstream::upstream_id, execution_upstream::downstream_id))
        .do_nothing()
        .execute(conn)
}

pub fn list_upstream_ids(conn: &mut SqliteConnection, exec_id: ExecutionId) -> QueryResult<Vec<ExecutionId>> {
    execution_upstream::table
        .filter(execution_upstream::downstream_id.eq(exec_id))
        .order(execution_upstream::id.asc())
        .select(execution_upstream::upstream_id)
        .load(conn)
}

pub fn list_downstream_ids(conn: &mut SqliteConnection, exec_id: ExecutionId) -> QueryResult<Vec<ExecutionId>> {
    execution_upstream::table
        .filter(execution_upstream::upstream_id.eq(exec_id))
        .order(execution_upstream::id.asc())
        .select(execution_upstream::downstream_id)
        .load(conn)
}

/// Every edge reachable by walking upstream from `ids`, breadth first. These
/// are all the edges a cycle through a new downstream of `ids` could use.
pub fn ancestor_edges(conn: &mut SqliteConnection, ids: &[ExecutionId]) -> QueryResult<Vec<UpstreamEdge>> {
    let mut seen: HashSet<ExecutionId> = ids.iter().copied().collect();
    let mut frontier: Vec<ExecutionId> = seen.iter().copied().collect();
    let mut edges = Vec::new();
    while !frontier.is_empty() {
        let level: Vec<UpstreamEdge> = execution_upstream::table
            .filter(execution_upstream::downstream_id.eq_any(frontier.clone()))
            .order(execution_upstream::id.asc())
            .load(conn)?;
        frontier = level
            .iter()
            .map(|edge| edge.upstream_id)
            .filter(|id| seen.insert(*id))
            .collect();
        edges.extend(level);
    }
    Ok(edges)
}

//! Pipeline-side building blocks shared by the orchestrator: the
//! `{name, type, value}` parameter lists, the execution dependency graph,
//! command-line assembly, output harvesting and engine log parsing.

pub mod params;
pub mod dependency;
pub mod command_line;
pub mod outputs;
pub mod engine_log;

pub use params::{Param, ParamKind};
pub use dependency::{DependencyGraph, GraphError};
pub use command_line::{build_invocation, CommandLineError, Invocation, InvocationSpec};
pub use outputs::{collect_outputs, parse_output_schema, OutputError, OutputSpec};

/// Mirrors the store's integer primary key.
pub type ExecutionId = i32;

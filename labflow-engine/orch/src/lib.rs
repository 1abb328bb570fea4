pub mod error;
pub mod run_dir;
pub mod pipeline_engine;
pub mod orchestrator;
pub mod handler;

pub use error::OrchError;
pub use handler::{RunHandler, RUN_HANDLER_ID};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use pipeline_engine::{EngineOutput, NextflowEngine, PipelineEngine};
pub use run_dir::Upload;

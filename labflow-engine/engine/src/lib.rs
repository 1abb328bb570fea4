pub mod config;
pub mod engine;
pub mod error;
pub mod logging;

pub use config::{ConfigError, EngineConfig};
pub use engine::{LabflowEngine, RunRequest};
pub use error::EngineError;
pub use logging::init_logging;

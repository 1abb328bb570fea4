use std::path::{Path, PathBuf};
use std::time::Duration;

use orch::OrchestratorConfig;
use thiserror::Error;

pub const DATABASE_URL: &str = "LABFLOW_DATABASE_URL";
pub const EXECUTIONS_ROOT: &str = "LABFLOW_EXECUTIONS_ROOT";
pub const PIPELINES_ROOT: &str = "LABFLOW_PIPELINES_ROOT";
pub const ENGINE_PROGRAM: &str = "LABFLOW_ENGINE_PROGRAM";
pub const ENGINE_CONFIG: &str = "LABFLOW_ENGINE_CONFIG";
pub const RUN_TIMEOUT_SECS: &str = "LABFLOW_RUN_TIMEOUT_SECS";
pub const POLL_INTERVAL_SECS: &str = "LABFLOW_POLL_INTERVAL_SECS";
pub const LOG_FILTER: &str = "LABFLOW_LOG";

pub const DEFAULT_LOG_FILTER: &str = "warn,labflow_engine=info,orch=info,queue=info";
const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}: '{value}' is not a positive number of seconds")]
    InvalidNumber { key: &'static str, value: String },

    #[error("could not resolve the working directory: {0}")]
    WorkingDir(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub database_url: String,
    pub executions_root: PathBuf,
    pub pipelines_root: PathBuf,
    pub engine_program: String,
    pub engine_config: PathBuf,
    pub run_timeout: Duration,
    /// How often the worker looks for PREPARED Executions.
    pub poll_interval: Duration,
    pub log_filter: String,
}

impl EngineConfig {
    /// Reads `LABFLOW_*` variables. Call `dotenv().ok()` first to pick up a
    /// `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let pipelines_root = get(PIPELINES_ROOT)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./pipelines"));
        let engine_config = get(ENGINE_CONFIG)
            .map(PathBuf::from)
            .unwrap_or_else(|| pipelines_root.join("nextflow.config"));
        let run_timeout = seconds(RUN_TIMEOUT_SECS, get(RUN_TIMEOUT_SECS), DEFAULT_RUN_TIMEOUT)?;
        let poll_interval = seconds(POLL_INTERVAL_SECS, get(POLL_INTERVAL_SECS), DEFAULT_POLL_INTERVAL)?;

        Ok(Self {
            database_url: get(DATABASE_URL).unwrap_or_else(|| "labflow.sqlite3".to_string()),
            executions_root: get(EXECUTIONS_ROOT)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./executions")),
            pipelines_root,
            engine_program: get(ENGINE_PROGRAM).unwrap_or_else(|| "nextflow".to_string()),
            engine_config,
            run_timeout,
            poll_interval,
            log_filter: get(LOG_FILTER).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }

    /// Orchestrator settings with every path made absolute, since the engine
    /// runs inside the run directory.
    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig, ConfigError> {
        let cwd = std::env::current_dir()?;
        Ok(OrchestratorConfig {
            executions_root: absolute(&cwd, &self.executions_root),
            pipelines_root: absolute(&cwd, &self.pipelines_root),
            engine_config: absolute(&cwd, &self.engine_config),
            run_timeout: self.run_timeout,
        })
    }
}

fn seconds(key: &'static str, raw: Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::InvalidNumber { key, value: raw }),
        },
    }
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

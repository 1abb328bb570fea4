use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use labflow_pipeline::engine_log::PROCESS_LOG_FIELDS;
use labflow_pipeline::Invocation;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Upper bound for the engine's `log` sub-command.
const LOG_QUERY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout, followed by stderr when the engine wrote any.
    pub transcript: String,
}

impl EngineOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// The external workflow engine.
#[async_trait]
pub trait PipelineEngine: Send + Sync + 'static {
    /// Executable placed at the head of every invocation.
    fn program(&self) -> &str;

    /// Runs the invocation to completion. Exceeding `limit` kills the process
    /// and returns an error.
    async fn launch(&self, invocation: &Invocation, limit: Duration) -> anyhow::Result<EngineOutput>;

    /// Tab-separated `name, workdir, status` rows for a finished run.
    async fn process_log(&self, run_dir: &Path, identifier: &str) -> anyhow::Result<String>;
}

/// Stdout and stderr a sub-process left in its work directory; missing files
/// read as empty.
pub async fn read_process_output(work_dir: &Path) -> (String, String) {
    let stdout = tokio::fs::read_to_string(work_dir.join(".command.out"))
        .await
        .unwrap_or_default();
    let stderr = tokio::fs::read_to_string(work_dir.join(".command.err"))
        .await
        .unwrap_or_default();
    (stdout, stderr)
}

fn transcript(stdout: &[u8], stderr: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&String::from_utf8_lossy(stderr));
    }
    text
}

/// Drives the Nextflow CLI as a child process.
#[derive(Debug, Clone)]
pub struct NextflowEngine {
    program: String,
}

impl NextflowEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl PipelineEngine for NextflowEngine {
    fn program(&self) -> &str {
        &self.program
    }

    async fn launch(&self, invocation: &Invocation, limit: Duration) -> anyhow::Result<EngineOutput> {
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to launch '{}'", invocation.program))?;
        debug!(pid = ?child.id(), "engine started");

        // dropping the wait future on expiry drops the child, which kills it
        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(output) => output.context("failed to wait for the engine")?,
            Err(_) => bail!(
                "engine did not finish within {}s and was killed",
                limit.as_secs()
            ),
        };
        Ok(EngineOutput {
            exit_code: output.status.code(),
            transcript: transcript(&output.stdout, &output.stderr),
        })
    }

    async fn process_log(&self, run_dir: &Path, identifier: &str) -> anyhow::Result<String> {
        let mut query = Command::new(&self.program);
        query
            .args(["log", identifier, "-f", PROCESS_LOG_FIELDS])
            .current_dir(run_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let output = timeout(LOG_QUERY_TIMEOUT, query.output())
            .await
            .context("engine log query timed out")?
            .context("failed to query the engine log")?;
        if !output.status.success() {
            bail!(
                "engine log query for '{}' failed: {}",
                identifier,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

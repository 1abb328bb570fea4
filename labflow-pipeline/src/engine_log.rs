//! Parsing of the workflow engine's console transcript and its per-run
//! process log.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

static RUN_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([a-z0-9]+_[a-z0-9]+)\]").expect("static run identifier pattern")
});

/// Process statuses the engine reports for a failed task.
pub const FAILURE_STATUSES: [&str; 2] = ["FAILED", "ABORTED"];

/// Fields requested from the engine's `log` subcommand, in column order.
pub const PROCESS_LOG_FIELDS: &str = "name,workdir,status";

/// Run name printed by the engine on launch, e.g. `[sad_turing]`.
pub fn parse_run_identifier(transcript: &str) -> Option<String> {
    RUN_IDENTIFIER
        .captures(transcript)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRow {
    pub name: String,
    pub work_dir: PathBuf,
    pub status: String,
}

impl ProcessRow {
    pub fn is_failure(&self) -> bool {
        FAILURE_STATUSES.contains(&self.status.as_str())
    }
}

/// Tab-separated `name, workdir, status` rows; blank or short lines are skipped.
pub fn parse_process_rows(log: &str) -> Vec<ProcessRow> {
    log.lines()
        .filter_map(|line| {
            let mut cols = line.split('\t').map(str::trim);
            let name = cols.next().filter(|s| !s.is_empty())?;
            let work_dir = cols.next().filter(|s| !s.is_empty())?;
            let status = cols.next().filter(|s| !s.is_empty())?;
            Some(ProcessRow {
                name: name.to_string(),
                work_dir: PathBuf::from(work_dir),
                status: status.to_string(),
            })
        })
        .collect()
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::params::{first_file_output, is_plain_file_name, Param, ParamKind};
use crate::ExecutionId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandLineError {
    #[error("input '{name}' is not a plain file name in the run directory")]
    InvalidFileInput { name: String },
    #[error("input '{name}' does not reference an upstream Execution")]
    InvalidDataInput { name: String },
    #[error("upstream Execution {0} is not available")]
    MissingUpstream(ExecutionId),
    #[error("upstream Execution {upstream} has no file output for input '{name}'")]
    NoFileOutput { name: String, upstream: ExecutionId },
}

/// Fixed parts of a pipeline invocation.
#[derive(Debug, Clone, Copy)]
pub struct InvocationSpec<'a> {
    pub program: &'a str,
    pub config: &'a Path,
    pub script: &'a Path,
    pub run_dir: &'a Path,
    pub executions_root: &'a Path,
}

/// A ready-to-spawn command: program, argument vector and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl Invocation {
    /// Human-readable command line; arguments containing whitespace are
    /// double-quoted.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote(arg: &str) -> String {
    if arg.chars().any(char::is_whitespace) {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

fn flag(name: &str) -> String {
    format!("--{name}")
}

/// Builds `<program> -C <config> run <script> --<name> <value> ...`.
///
/// `upstream_outputs` maps every upstream id referenced by a data input to
/// that Execution's parsed output list.
pub fn build_invocation(
    spec: InvocationSpec<'_>,
    inputs: &[Param],
    upstream_outputs: &HashMap<ExecutionId, Vec<Param>>,
) -> Result<Invocation, CommandLineError> {
    let mut args = vec![
        "-C".to_string(),
        spec.config.display().to_string(),
        "run".to_string(),
        spec.script.display().to_string(),
    ];

    for input in inputs {
        match &input.kind {
            ParamKind::File => {
                let file = input
                    .file_name()
                    .filter(|f| is_plain_file_name(f))
                    .ok_or_else(|| CommandLineError::InvalidFileInput {
                        name: input.name.clone(),
                    })?;
                args.push(flag(&input.name));
                args.push(spec.run_dir.join(file).display().to_string());
            }
            ParamKind::Data | ParamKind::DataList(_) => {
                let ids = input.referenced_ids();
                if ids.is_empty() {
                    return Err(CommandLineError::InvalidDataInput {
                        name: input.name.clone(),
                    });
                }
                let paths = ids
                    .into_iter()
                    .map(|id| upstream_file(spec.executions_root, &input.name, id, upstream_outputs))
                    .collect::<Result<Vec<_>, _>>()?;
                args.push(flag(&input.name));
                args.push(paths.join(","));
            }
            ParamKind::Basic => {
                let value = match &input.value {
                    Value::Null => continue,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                args.push(flag(&input.name));
                args.push(value);
            }
            ParamKind::Other(kind) => {
                trace!(name = %input.name, kind = %kind, "skipping input of unhandled type");
            }
        }
    }

    Ok(Invocation {
        program: spec.program.to_string(),
        args,
        working_dir: spec.run_dir.to_path_buf(),
    })
}

fn upstream_file(
    executions_root: &Path,
    name: &str,
    upstream: ExecutionId,
    upstream_outputs: &HashMap<ExecutionId, Vec<Param>>,
) -> Result<String, CommandLineError> {
    let outputs = upstream_outputs
        .get(&upstream)
        .ok_or(CommandLineError::MissingUpstream(upstream))?;
    let file = first_file_output(outputs).ok_or_else(|| CommandLineError::NoFileOutput {
        name: name.to_string(),
        upstream,
    })?;
    Ok(executions_root
        .join(upstream.to_string())
        .join(file)
        .display()
        .to_string())
}

//! Per-Execution working directories under the executions root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use labflow_pipeline::params::is_plain_file_name;
use labflow_sqlite::ExecutionId;

/// A user-supplied input file to stage into the run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
        }
    }
}

pub fn run_dir(executions_root: &Path, execution_id: ExecutionId) -> PathBuf {
    executions_root.join(execution_id.to_string())
}

/// Creates the run directory. An existing directory is an error, never reused.
pub fn allocate(executions_root: &Path, execution_id: ExecutionId) -> io::Result<PathBuf> {
    fs::create_dir_all(executions_root)?;
    let dir = run_dir(executions_root, execution_id);
    fs::create_dir(&dir)?;
    Ok(dir)
}

fn plain_file_name(name: &str) -> io::Result<&str> {
    if is_plain_file_name(name) {
        Ok(name)
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{name}' is not a plain file name"),
        ))
    }
}

pub fn stage_upload(dir: &Path, upload: &Upload) -> io::Result<PathBuf> {
    let path = dir.join(plain_file_name(&upload.file_name)?);
    fs::write(&path, &upload.contents)?;
    Ok(path)
}

/// Copies the command's script template into the run directory, keeping its
/// file name. Relative scripts resolve against `pipelines_root`.
pub fn copy_script(pipelines_root: &Path, script: &str, dir: &Path) -> io::Result<PathBuf> {
    let source = pipelines_root.join(script);
    let file_name = source.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("'{script}' has no file name"))
    })?;
    let target = dir.join(file_name);
    fs::copy(&source, &target)?;
    Ok(target)
}

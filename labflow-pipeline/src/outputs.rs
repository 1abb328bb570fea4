use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::params::{Param, ParamKind};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("invalid output schema: {0}")]
    Schema(#[from] serde_json::Error),
    #[error("invalid match pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("failed to scan run directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// One entry of a Command's output schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputSpec {
    /// Files under the run directory whose relative path matches the glob.
    File {
        name: String,
        #[serde(rename = "match")]
        pattern: String,
    },
    /// First stdout line of any process starting with the prefix.
    Basic {
        name: String,
        #[serde(rename = "match")]
        prefix: String,
    },
}

pub fn parse_output_schema(raw: &str) -> Result<Vec<OutputSpec>, OutputError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(raw)?)
}

/// Translates a glob into an anchored regex. `*` and `?` stay inside one
/// path segment, `**` crosses segments.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, OutputError> {
    let mut re = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    re.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    re.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '[' => match chars[i..].iter().position(|&c| c == ']') {
                Some(end) if end > 1 => {
                    let class: String = chars[i + 1..i + end].iter().collect();
                    let class = class.strip_prefix('!').map_or(class.clone(), |rest| format!("^{rest}"));
                    re.push('[');
                    re.push_str(&class.replace('\\', "\\\\"));
                    re.push(']');
                    i += end + 1;
                    continue;
                }
                _ => re.push_str("\\["),
            },
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    re.push('$');
    Regex::new(&re).map_err(|source| OutputError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Harvests outputs for a finished run. File entries come one per matching
/// file, sorted by relative path; basic entries only when a line matched.
pub fn collect_outputs<S: AsRef<str>>(
    run_dir: &Path,
    specs: &[OutputSpec],
    process_stdouts: &[S],
) -> Result<Vec<Param>, OutputError> {
    let mut outputs = Vec::new();
    for spec in specs {
        match spec {
            OutputSpec::File { name, pattern } => {
                let matcher = glob_to_regex(pattern)?;
                let mut found = matching_files(run_dir, &matcher)?;
                found.sort();
                debug!(output = %name, %pattern, count = found.len(), "matched output files");
                outputs.extend(found.into_iter().map(|(file, size)| {
                    Param::new(name.clone(), ParamKind::File, json!({ "file": file, "size": size }))
                }));
            }
            OutputSpec::Basic { name, prefix } => {
                let hit = process_stdouts
                    .iter()
                    .flat_map(|out| out.as_ref().lines())
                    .find_map(|line| line.strip_prefix(prefix.as_str()));
                if let Some(rest) = hit {
                    outputs.push(Param::basic(name.clone(), rest.trim()));
                }
            }
        }
    }
    Ok(outputs)
}

fn matching_files(run_dir: &Path, matcher: &Regex) -> Result<Vec<(String, u64)>, OutputError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(run_dir).min_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(run_dir) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if matcher.is_match(&relative) {
            found.push((relative, entry.metadata()?.len()));
        }
    }
    Ok(found)
}

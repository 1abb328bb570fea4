use std::fmt;
use std::str::FromStr;

use diesel::prelude::*;
use crate::schema::{execution_upstream, executions};
use crate::models::Parent;
use crate::{CollectionId, CommandId, ExecutionId, SampleId};
use chrono::NaiveDateTime;
use serde::{Serialize, Deserialize};

use crate::naive_dt_seconds::{naive as dt_seconds, naive_opt as dt_seconds_opt};

/// Run state machine: `Created -> Prepared -> Running -> {Ok, Error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Created,
    Prepared,
    Running,
    Ok,
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Created => "CREATED",
            ExecutionStatus::Prepared => "PREPARED",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Ok => "OK",
            ExecutionStatus::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Ok | ExecutionStatus::Error)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown execution status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for ExecutionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(ExecutionStatus::Created),
            "PREPARED" => Ok(ExecutionStatus::Prepared),
            "RUNNING" => Ok(ExecutionStatus::Running),
            "OK" => Ok(ExecutionStatus::Ok),
            "ERROR" => Ok(ExecutionStatus::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = executions)]
pub struct Execution {
    pub id: ExecutionId,
    pub name: String,
    pub command_id: Option<CommandId>,
    pub private: bool,
    pub sample_id: Option<SampleId>,
    pub collection_id: Option<CollectionId>,

    /// JSON list of `{name, type, value}`
    pub input: String,
    /// JSON list of `{name, type, value}`
    pub output: String,

    pub status: String,
    pub error: String,
    pub terminal: String,
    pub identifier: String,
    pub command_line: String,

    #[serde(with = "dt_seconds_opt")]
    pub started: Option<NaiveDateTime>,

    #[serde(with = "dt_seconds_opt")]
    pub finished: Option<NaiveDateTime>,

    #[serde(with = "dt_seconds")]
    pub created: NaiveDateTime,

    #[serde(with = "dt_seconds")]
    pub modified: NaiveDateTime,
}

impl Execution {
    pub fn parent(&self) -> Parent {
        Parent::resolve(self.collection_id, self.sample_id)
    }

    pub fn status(&self) -> Result<ExecutionStatus, UnknownStatus> {
        self.status.parse()
    }
}

#[derive(Insertable)]
#[diesel(table_name = executions)]
pub struct NewExecution<'a> {
    pub name: &'a str,
    pub command_id: Option<CommandId>,
    pub private: bool,
    pub sample_id: Option<SampleId>,
    pub collection_id: Option<CollectionId>,
    pub input: &'a str,
    pub status: &'a str,
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
}

#[derive(Queryable, Selectable, Debug, Clone, Copy, PartialEq, Eq)]
#[diesel(table_name = execution_upstream)]
pub struct UpstreamEdge {
    pub id: i32,
    pub upstream_id: ExecutionId,
    pub downstream_id: ExecutionId,
}

#[derive(Insertable)]
#[diesel(table_name = execution_upstream)]
pub struct NewUpstreamEdge {
    pub upstream_id: ExecutionId,
    pub downstream_id: ExecutionId,
}

use diesel::prelude::*;
use crate::schema::process_records;
use crate::ExecutionId;
use chrono::NaiveDateTime;
use serde::{Serialize, Deserialize};

use crate::naive_dt_seconds::naive as dt_seconds;

/// One engine sub-step observed in a run's log.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = process_records)]
pub struct ProcessRecord {
    pub id: i32,
    pub execution_id: ExecutionId,
    pub name: String,
    pub status: String,
    pub work_dir: String,
    pub stdout: String,
    pub stderr: String,

    #[serde(with = "dt_seconds")]
    pub created: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = process_records)]
pub struct NewProcessRecord<'a> {
    pub execution_id: ExecutionId,
    pub name: &'a str,
    pub status: &'a str,
    pub work_dir: &'a str,
    pub stdout: &'a str,
    pub stderr: &'a str,
    pub created: NaiveDateTime,
}

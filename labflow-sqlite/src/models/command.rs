use diesel::prelude::*;
use crate::schema::commands;
use chrono::NaiveDateTime;
use serde::{Serialize, Deserialize};

use crate::naive_dt_seconds::naive as dt_seconds;

/// A reusable pipeline: the script to run plus the JSON output schema
/// harvested after a successful run.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = commands)]
pub struct Command {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub script: String,
    pub outputs: String,

    #[serde(with = "dt_seconds")]
    pub created: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = commands)]
pub struct NewCommand<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub script: &'a str,
    pub outputs: &'a str,
    pub created: NaiveDateTime,
}

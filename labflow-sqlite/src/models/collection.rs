use diesel::prelude::*;
use crate::schema::collections;
use chrono::NaiveDateTime;
use serde::{Serialize, Deserialize};

use crate::naive_dt_seconds::naive as dt_seconds;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = collections)]
pub struct Collection {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub private: bool,

    #[serde(with = "dt_seconds")]
    pub created: NaiveDateTime,

    #[serde(with = "dt_seconds")]
    pub modified: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = collections)]
pub struct NewCollection<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub private: bool,
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
}

use diesel::prelude::*;
use crate::schema::samples;
use crate::CollectionId;
use chrono::NaiveDateTime;
use serde::{Serialize, Deserialize};

use crate::naive_dt_seconds::naive as dt_seconds;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = samples)]
pub struct Sample {
    pub id: i32,
    pub name: String,
    pub private: bool,
    pub collection_id: Option<CollectionId>,

    #[serde(with = "dt_seconds")]
    pub created: NaiveDateTime,

    #[serde(with = "dt_seconds")]
    pub modified: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = samples)]
pub struct NewSample<'a> {
    pub name: &'a str,
    pub private: bool,
    pub collection_id: Option<CollectionId>,
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
}

use diesel::prelude::*;
use crate::schema::{user_group_links, user_groups};
use chrono::NaiveDateTime;
use serde::{Serialize, Deserialize};

use crate::naive_dt_seconds::naive as dt_seconds;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = user_groups)]
pub struct Group {
    pub id: i32,
    pub slug: String,
    pub name: String,

    #[serde(with = "dt_seconds")]
    pub created: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = user_groups)]
pub struct NewGroup<'a> {
    pub slug: &'a str,
    pub name: &'a str,
    pub created: NaiveDateTime,
}

/// Membership row; `permission` holds a `GroupRole` level.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = user_group_links)]
pub struct UserGroupLink {
    pub id: i32,
    pub user_id: i32,
    pub group_id: i32,
    pub permission: i32,
}

#[derive(Insertable)]
#[diesel(table_name = user_group_links)]
pub struct NewUserGroupLink {
    pub user_id: i32,
    pub group_id: i32,
    pub permission: i32,
}

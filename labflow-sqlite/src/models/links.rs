//! (subject, object, level) rows. `permission` holds a `Permission` level.

use diesel::prelude::*;
use crate::schema::{collection_group_links, collection_user_links, execution_user_links, sample_user_links};
use serde::{Serialize, Deserialize};

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = collection_user_links)]
pub struct CollectionUserLink {
    pub id: i32,
    pub collection_id: i32,
    pub user_id: i32,
    pub permission: i32,
}

#[derive(Insertable)]
#[diesel(table_name = collection_user_links)]
pub struct NewCollectionUserLink {
    pub collection_id: i32,
    pub user_id: i32,
    pub permission: i32,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = collection_group_links)]
pub struct CollectionGroupLink {
    pub id: i32,
    pub collection_id: i32,
    pub group_id: i32,
    pub permission: i32,
}

#[derive(Insertable)]
#[diesel(table_name = collection_group_links)]
pub struct NewCollectionGroupLink {
    pub collection_id: i32,
    pub group_id: i32,
    pub permission: i32,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = sample_user_links)]
pub struct SampleUserLink {
    pub id: i32,
    pub sample_id: i32,
    pub user_id: i32,
    pub permission: i32,
}

#[derive(Insertable)]
#[diesel(table_name = sample_user_links)]
pub struct NewSampleUserLink {
    pub sample_id: i32,
    pub user_id: i32,
    pub permission: i32,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = execution_user_links)]
pub struct ExecutionUserLink {
    pub id: i32,
    pub execution_id: i32,
    pub user_id: i32,
    pub permission: i32,
}

#[derive(Insertable)]
#[diesel(table_name = execution_user_links)]
pub struct NewExecutionUserLink {
    pub execution_id: i32,
    pub user_id: i32,
    pub permission: i32,
}

// src/db/collection_ops.rs

use diesel::prelude::*;
use diesel::result::QueryResult;
use crate::models::collection::{Collection, NewCollection};
use crate::schema::collections;
use crate::CollectionId;

pub fn create_collection(
    conn: &mut SqliteConnection,
    name: &str,
    description: &str,
    private: bool,
) -> QueryResult<Collection> {
    let now = crate::now();
    let new_c = NewCollection {
        name,
        description,
        private,
        created: now,
        modified: now,
    };
    diesel::insert_into(collections::table)
        .values(&new_c)
        .execute(conn)?;

    collections::table
        .order(collections::id.desc())
        .first(conn)
}

pub fn get_collection_by_id(conn: &mut SqliteConnection, collection_id: CollectionId) -> QueryResult<Collection> {
    collections::table.find(collection_id).first(conn)
}

pub fn find_collection(conn: &mut SqliteConnection, collection_id: CollectionId) -> QueryResult<Option<Collection>> {
    collections::table.find(collection_id).first(conn).optional()
}

pub fn list_collections(conn: &mut SqliteConnection, ids: &[CollectionId]) -> QueryResult<Vec<Collection>> {
    collections::table
        .filter(collections::id.eq_any(ids.to_vec()))
        .order(collections::id.asc())
        .load(conn)
}

pub fn update_collection_details(
    conn: &mut SqliteConnection,
    collection_id: CollectionId,
    name: &str,
    description: &str,
) -> QueryResult<usize> {
    diesel::update(collections::table.find(collection_id))
        .set((
            collections::name.eq(name),
            collections::description.eq(description),
            collections::modified.eq(crate::now()),
        ))
        .execute(conn)
}

pub fn set_private(conn: &mut SqliteConnection, collection_id: CollectionId, private: bool) -> QueryResult<usize> {
    diesel::update(collections::table.find(collection_id))
        .set((
            collections::private.eq(private),
            collections::modified.eq(crate::now()),
        ))
        .execute(conn)
}

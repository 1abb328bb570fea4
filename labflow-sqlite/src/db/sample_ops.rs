// src/db/sample_ops.rs

use diesel::prelude::*;
use diesel::result::QueryResult;
use crate::models::sample::{NewSample, Sample};
use crate::schema::samples;
use crate::{CollectionId, SampleId};

pub fn create_sample(
    conn: &mut SqliteConnection,
    name: &str,
    private: bool,
    collection_id: Option<CollectionId>,
) -> QueryResult<Sample> {
    let now = crate::now();
    let new_s = NewSample {
        name,
        private,
        collection_id,
        created: now,
        modified: now,
    };
    diesel::insert_into(samples::table)
        .values(&new_s)
        .execute(conn)?;

    samples::table
        .order(samples::id.desc())
        .first(conn)
}

pub fn get_sample_by_id(conn: &mut SqliteConnection, sample_id: SampleId) -> QueryResult<Sample> {
    samples::table.find(sample_id).first(conn)
}

pub fn find_sample(conn: &mut SqliteConnection, sample_id: SampleId) -> QueryResult<Option<Sample>> {
    samples::table.find(sample_id).first(conn).optional()
}

pub fn list_samples_in_collection(conn: &mut SqliteConnection, collection_id: CollectionId) -> QueryResult<Vec<Sample>> {
    samples::table
        .filter(samples::collection_id.eq(collection_id))
        .order(samples::id.asc())
        .load(conn)
}

/// `(id, private, collection_id)` for each existing id in `ids`.
pub fn privacy_rows(
    conn: &mut SqliteConnection,
    ids: &[SampleId],
) -> QueryResult<Vec<(SampleId, bool, Option<CollectionId>)>> {
    samples::table
        .filter(samples::id.eq_any(ids.to_vec()))
        .select((samples::id, samples::private, samples::collection_id))
        .load(conn)
}

pub fn update_sample_name(conn: &mut SqliteConnection, sample_id: SampleId, name: &str) -> QueryResult<usize> {
    diesel::update(samples::table.find(sample_id))
        .set((samples::name.eq(name), samples::modified.eq(crate::now())))
        .execute(conn)
}

pub fn set_private(conn: &mut SqliteConnection, sample_id: SampleId, private: bool) -> QueryResult<usize> {
    diesel::update(samples::table.find(sample_id))
        .set((samples::private.eq(private), samples::modified.eq(crate::now())))
        .execute(conn)
}

/// Aligns every sample of the collection with the collection's flag.
pub fn set_private_in_collection(
    conn: &mut SqliteConnection,
    collection_id: CollectionId,
    private: bool,
) -> QueryResult<usize> {
    diesel::update(samples::table.filter(samples::collection_id.eq(collection_id)))
        .set((samples::private.eq(private), samples::modified.eq(crate::now())))
        .execute(conn)
}

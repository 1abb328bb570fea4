//! Batched form of `can_view`.
//!
//! Query cost per call is constant in the number of ids: collections take one
//! query, samples three (rows, direct links, parent collections), executions
//! at most six (rows, direct links, parent collections, parent samples).

use std::collections::HashSet;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use labflow_sqlite::db::{execution_ops, link_ops, sample_ops};
use labflow_sqlite::models::GroupRole;
use labflow_sqlite::schema::{collection_group_links, collection_user_links, collections, user_group_links};
use labflow_sqlite::{CollectionId, ExecutionId, SampleId, UserId};

use crate::error::AccessError;
use crate::resolver::EntityRef;

pub fn visible_collections(
    conn: &mut SqliteConnection,
    user: Option<UserId>,
    ids: &[CollectionId],
) -> Result<HashSet<CollectionId>, AccessError> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    let candidates = collections::table.filter(collections::id.eq_any(ids.to_vec()));

    let Some(user_id) = user else {
        let public: Vec<CollectionId> = candidates
            .filter(collections::private.eq(false))
            .select(collections::id)
            .load(conn)?;
        return Ok(public.into_iter().collect());
    };

    let direct = collection_user_links::table
        .filter(collection_user_links::user_id.eq(user_id))
        .select(collection_user_links::collection_id);
    let member_groups = user_group_links::table
        .filter(user_group_links::user_id.eq(user_id))
        .filter(user_group_links::permission.ge(GroupRole::Member.level()))
        .select(user_group_links::group_id);
    let via_groups = collection_group_links::table
        .filter(collection_group_links::group_id.eq_any(member_groups))
        .select(collection_group_links::collection_id);

    let found: Vec<CollectionId> = candidates
        .filter(
            collections::private
                .eq(false)
                .or(collections::id.eq_any(direct))
                .or(collections::id.eq_any(via_groups)),
        )
        .select(collections::id)
        .load(conn)?;
    Ok(found.into_iter().collect())
}

pub fn visible_samples(
    conn: &mut SqliteConnection,
    user: Option<UserId>,
    ids: &[SampleId],
) -> Result<HashSet<SampleId>, AccessError> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    let rows = sample_ops::privacy_rows(conn, ids)?;
    let Some(user_id) = user else {
        return Ok(rows.into_iter().filter(|(_, private, _)| !private).map(|(id, ..)| id).collect());
    };

    let linked: HashSet<SampleId> = link_ops::linked_sample_ids(conn, user_id, ids)?.into_iter().collect();
    let parents: Vec<CollectionId> = rows.iter().filter_map(|(_, _, cid)| *cid).collect();
    let parents = visible_collections(conn, user, &parents)?;

    Ok(rows
        .into_iter()
        .filter(|(id, private, cid)| {
            !private || linked.contains(id) || cid.is_some_and(|c| parents.contains(&c))
        })
        .map(|(id, ..)| id)
        .collect())
}

pub fn visible_executions(
    conn: &mut SqliteConnection,
    user: Option<UserId>,
    ids: &[ExecutionId],
) -> Result<HashSet<ExecutionId>, AccessError> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    let rows = execution_ops::privacy_rows(conn, ids)?;
    let Some(user_id) = user else {
        return Ok(rows.into_iter().filter(|(_, private, ..)| !private).map(|(id, ..)| id).collect());
    };

    let linked: HashSet<ExecutionId> = link_ops::linked_execution_ids(conn, user_id, ids)?
        .into_iter()
        .collect();
    // collection parent wins, so only collection-less rows consult the sample
    let parent_collections: Vec<CollectionId> = rows.iter().filter_map(|(.., cid)| *cid).collect();
    let parent_samples: Vec<SampleId> = rows
        .iter()
        .filter(|(.., cid)| cid.is_none())
        .filter_map(|(_, _, sid, _)| *sid)
        .collect();
    let collections = visible_collections(conn, user, &parent_collections)?;
    let samples = visible_samples(conn, user, &parent_samples)?;

    Ok(rows
        .into_iter()
        .filter(|(id, private, sid, cid)| {
            let inherited = match (cid, sid) {
                (Some(c), _) => collections.contains(c),
                (None, Some(s)) => samples.contains(s),
                (None, None) => false,
            };
            !private || linked.contains(id) || inherited
        })
        .map(|(id, ..)| id)
        .collect())
}

/// Mixed-type variant: groups the refs by kind and filters each batch.
pub fn visible(
    conn: &mut SqliteConnection,
    user: Option<UserId>,
    entities: &[EntityRef],
) -> Result<HashSet<EntityRef>, AccessError> {
    let mut collection_ids = Vec::new();
    let mut sample_ids = Vec::new();
    let mut execution_ids = Vec::new();
    for entity in entities {
        match *entity {
            EntityRef::Collection(id) => collection_ids.push(id),
            EntityRef::Sample(id) => sample_ids.push(id),
            EntityRef::Execution(id) => execution_ids.push(id),
        }
    }

    let mut result = HashSet::new();
    result.extend(visible_collections(conn, user, &collection_ids)?.into_iter().map(EntityRef::Collection));
    result.extend(visible_samples(conn, user, &sample_ids)?.into_iter().map(EntityRef::Sample));
    result.extend(visible_executions(conn, user, &execution_ids)?.into_iter().map(EntityRef::Execution));
    Ok(result)
}

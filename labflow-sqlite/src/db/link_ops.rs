// src/db/link_ops.rs
//
// Read and write access for the four permission link tables. Every lookup
// returns `Permission::None` when no row exists.

use diesel::prelude::*;
use diesel::result::QueryResult;
use crate::models::links::{
    CollectionGroupLink, CollectionUserLink, NewCollectionGroupLink, NewCollectionUserLink,
    NewExecutionUserLink, NewSampleUserLink,
};
use crate::models::{GroupRole, Permission};
use crate::schema::{
    collection_group_links, collection_user_links, execution_user_links, sample_user_links,
    user_group_links,
};
use crate::{CollectionId, ExecutionId, GroupId, SampleId, UserId};

fn level_of(stored: Option<i32>) -> Permission {
    stored.map(Permission::from_level).unwrap_or_default()
}

// -----------------------------
// collection <-> user
// -----------------------------

pub fn collection_user_level(
    conn: &mut SqliteConnection,
    collection_id: CollectionId,
    user_id: UserId,
) -> QueryResult<Permission> {
    let stored = collection_user_links::table
        .filter(collection_user_links::collection_id.eq(collection_id))
        .filter(collection_user_links::user_id.eq(user_id))
        .select(collection_user_links::permission)
        .first::<i32>(conn)
        .optional()?;
    Ok(level_of(stored))
}

/// `Permission::None` deletes the link.
pub fn set_collection_user_level(
    conn: &mut SqliteConnection,
    collection_id: CollectionId,
    user_id: UserId,
    level: Permission,
) -> QueryResult<usize> {
    if level == Permission::None {
        return diesel::delete(
            collection_user_links::table
                .filter(collection_user_links::collection_id.eq(collection_id))
                .filter(collection_user_links::user_id.eq(user_id)),
        )
        .execute(conn);
    }
    diesel::insert_into(collection_user_links::table)
        .values(&NewCollectionUserLink {
            collection_id,
            user_id,
            permission: level.level(),
        })
        .on_conflict((collection_user_links::collection_id, collection_user_links::user_id))
        .do_update()
        .set(collection_user_links::permission.eq(level.level()))
        .execute(conn)
}

pub fn list_collection_user_links(
    conn: &mut SqliteConnection,
    collection_id: CollectionId,
) -> QueryResult<Vec<CollectionUserLink>> {
    collection_user_links::table
        .filter(collection_user_links::collection_id.eq(collection_id))
        .order(collection_user_links::id.asc())
        .load(conn)
}

pub fn collection_owner_count(conn: &mut SqliteConnection, collection_id: CollectionId) -> QueryResult<i64> {
    collection_user_links::table
        .filter(collection_user_links::collection_id.eq(collection_id))
        .filter(collection_user_links::permission.eq(Permission::Own.level()))
        .count()
        .get_result(conn)
}

// -----------------------------
// collection <-> group
// -----------------------------

pub fn collection_group_level(
    conn: &mut SqliteConnection,
    collection_id: CollectionId,
    group_id: GroupId,
) -> QueryResult<Permission> {
    let stored = collection_group_links::table
        .filter(collection_group_links::collection_id.eq(collection_id))
        .filter(collection_group_links::group_id.eq(group_id))
        .select(collection_group_links::permission)
        .first::<i32>(conn)
        .optional()?;
    Ok(level_of(stored).capped_for_group())
}

/// Levels above `Share` are stored as `Share`; `Permission::None` deletes.
pub fn set_collection_group_level(
    conn: &mut SqliteConnection,
    collection_id: CollectionId,
    group_id: GroupId,
    level: Permission,
) -> QueryResult<usize> {
    if level == Permission::None {
        return diesel::delete(
            collection_group_links::table
                .filter(collection_group_links::collection_id.eq(collection_id))
                .filter(collection_group_links::group_id.eq(group_id)),
        )
        .execute(conn);
    }
    let stored = level.capped_for_group().level();
    diesel::insert_into(collection_group_links::table)
        .values(&NewCollectionGroupLink {
            collection_id,
            group_id,
            permission: stored,
        })
        .on_conflict((collection_group_links::collection_id, collection_group_links::group_id))
        .do_update()
        .set(collection_group_links::permission.eq(stored))
        .execute(conn)
}

pub fn list_collection_group_links(
    conn: &mut SqliteConnection,
    collection_id: CollectionId,
) -> QueryResult<Vec<CollectionGroupLink>> {
    collection_group_links::table
        .filter(collection_group_links::collection_id.eq(collection_id))
        .order(collection_group_links::id.asc())
        .load(conn)
}

/// Highest level any of the user's member/admin groups holds on the collection.
pub fn collection_level_via_groups(
    conn: &mut SqliteConnection,
    collection_id: CollectionId,
    user_id: UserId,
) -> QueryResult<Permission> {
    let member_groups = user_group_links::table
        .filter(user_group_links::user_id.eq(user_id))
        .filter(user_group_links::permission.ge(GroupRole::Member.level()))
        .select(user_group_links::group_id);
    let levels: Vec<i32> = collection_group_links::table
        .filter(collection_group_links::collection_id.eq(collection_id))
        .filter(collection_group_links::group_id.eq_any(member_groups))
        .select(collection_group_links::permission)
        .load(conn)?;
    Ok(level_of(levels.into_iter().max()).capped_for_group())
}

// -----------------------------
// sample <-> user
// -----------------------------

pub fn sample_user_level(conn: &mut SqliteConnection, sample_id: SampleId, user_id: UserId) -> QueryResult<Permission> {
    let stored = sample_user_links::table
        .filter(sample_user_links::sample_id.eq(sample_id))
        .filter(sample_user_links::user_id.eq(user_id))
        .select(sample_user_links::permission)
        .first::<i32>(conn)
        .optional()?;
    Ok(level_of(stored))
}

pub fn set_sample_user_level(
    conn: &mut SqliteConnection,
    sample_id: SampleId,
    user_id: UserId,
    level: Permission,
) -> QueryResult<usize> {
    if level == Permission::None {
        return diesel::delete(
            sample_user_links::table
                .filter(sample_user_links::sample_id.eq(sample_id))
                .filter(sample_user_links::user_id.eq(user_id)),
        )
        .execute(conn);
    }
    diesel::insert_into(sample_user_links::table)
        .values(&NewSampleUserLink {
            sample_id,
            user_id,
            permission: level.level(),
        })
        .on_conflict((sample_user_links::sample_id, sample_user_links::user_id))
        .do_update()
        .set(sample_user_links::permission.eq(level.level()))
        .execute(conn)
}

// -----------------------------
// execution <-> user
// -----------------------------

pub fn execution_user_level(
    conn: &mut SqliteConnection,
    execution_id: ExecutionId,
    user_id: UserId,
) -> QueryResult<Permission> {
    let stored = execution_user_links::table
        .filter(execution_user_links::execution_id.eq(execution_id))
        .filter(execution_user_links::user_id.eq(user_id))
        .select(execution_user_links::permission)
        .first::<i32>(conn)
        .optional()?;
    Ok(level_of(stored))
}

pub fn set_execution_user_level(
    conn: &mut SqliteConnection,
    execution_id: ExecutionId,
    user_id: UserId,
    level: Permission,
) -> QueryResult<usize> {
    if level == Permission::None {
        return diesel::delete(
            execution_user_links::table
                .filter(execution_user_links::execution_id.eq(execution_id))
                .filter(execution_user_links::user_id.eq(user_id)),
        )
        .execute(conn);
    }
    diesel::insert_into(execution_user_links::table)
        .values(&NewExecutionUserLink {
            execution_id,
            user_id,
            permission: level.level(),
        })
        .on_conflict((execution_user_links::execution_id, execution_user_links::user_id))
        .do_update()
        .set(execution_user_links::permission.eq(level.level()))
        .execute(conn)
}

/// Users holding an `Own` link on the execution, earliest link first. The
/// first entry is the creator unless ownership was reassigned.
pub fn execution_owner_ids(conn: &mut SqliteConnection, execution_id: ExecutionId) -> QueryResult<Vec<UserId>> {
    execution_user_links::table
        .filter(execution_user_links::execution_id.eq(execution_id))
        .filter(execution_user_links::permission.eq(Permission::Own.level()))
        .order(execution_user_links::id.asc())
        .select(execution_user_links::user_id)
        .load(conn)
}

// -----------------------------
// batch lookups for visibility filtering
// -----------------------------

/// Subset of `ids` that the user holds a direct sample link on.
pub fn linked_sample_ids(conn: &mut SqliteConnection, user_id: UserId, ids: &[SampleId]) -> QueryResult<Vec<SampleId>> {
    sample_user_links::table
        .filter(sample_user_links::user_id.eq(user_id))
        .filter(sample_user_links::sample_id.eq_any(ids.to_vec()))
        .select(sample_user_links::sample_id)
        .load(conn)
}

/// Subset of `ids` that the user holds a direct execution link on.
pub fn linked_execution_ids(
    conn: &mut SqliteConnection,
    user_id: UserId,
    ids: &[ExecutionId],
) -> QueryResult<Vec<ExecutionId>> {
    execution_user_links::table
        .filter(execution_user_links::user_id.eq(user_id))
        .filter(execution_user_links::execution_id.eq_any(ids.to_vec()))
        .select(execution_user_links::execution_id)
        .load(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{collection_ops, group_ops, user_ops};
    use crate::test_support::memory_conn;

    #[test]
    fn test_set_level_upserts_and_deletes() {
        let mut conn = memory_conn();
        let alice = user_ops::create_user(&mut conn, "alice", "").unwrap();
        let c = collection_ops::create_collection(&mut conn, "c", "", true).unwrap();

        set_collection_user_level(&mut conn, c.id, alice.id, Permission::View).unwrap();
        set_collection_user_level(&mut conn, c.id, alice.id, Permission::Own).unwrap();
        assert_eq!(list_collection_user_links(&mut conn, c.id).unwrap().len(), 1);
        assert_eq!(collection_user_level(&mut conn, c.id, alice.id).unwrap(), Permission::Own);
        assert_eq!(collection_owner_count(&mut conn, c.id).unwrap(), 1);

        set_collection_user_level(&mut conn, c.id, alice.id, Permission::None).unwrap();
        assert_eq!(collection_user_level(&mut conn, c.id, alice.id).unwrap(), Permission::None);
        assert_eq!(collection_owner_count(&mut conn, c.id).unwrap(), 0);
    }

    #[test]
    fn test_group_levels_cap_at_share_and_skip_invitees() {
        let mut conn = memory_conn();
        let bob = user_ops::create_user(&mut conn, "bob", "").unwrap();
        let lab = group_ops::create_group(&mut conn, "lab", "Lab").unwrap();
        let c = collection_ops::create_collection(&mut conn, "c", "", true).unwrap();

        set_collection_group_level(&mut conn, c.id, lab.id, Permission::Own).unwrap();
        assert_eq!(collection_group_level(&mut conn, c.id, lab.id).unwrap(), Permission::Share);

        group_ops::set_membership(&mut conn, bob.id, lab.id, GroupRole::Invited).unwrap();
        assert_eq!(collection_level_via_groups(&mut conn, c.id, bob.id).unwrap(), Permission::None);

        group_ops::set_membership(&mut conn, bob.id, lab.id, GroupRole::Member).unwrap();
        assert_eq!(collection_level_via_groups(&mut conn, c.id, bob.id).unwrap(), Permission::Share);
    }

    #[test]
    fn test_execution_owners_in_link_order() {
        use crate::db::execution_ops::{self, ExecutionDraft};

        let mut conn = memory_conn();
        let alice = user_ops::create_user(&mut conn, "alice", "").unwrap();
        let bob = user_ops::create_user(&mut conn, "bob", "").unwrap();
        let carol = user_ops::create_user(&mut conn, "carol", "").unwrap();
        let e = execution_ops::create_execution(
            &mut conn,
            &ExecutionDraft {
                name: "e",
                command_id: None,
                private: true,
                sample_id: None,
                collection_id: None,
                input: "[]",
            },
        )
        .unwrap();
        assert!(execution_owner_ids(&mut conn, e.id).unwrap().is_empty());

        set_execution_user_level(&mut conn, e.id, bob.id, Permission::Own).unwrap();
        set_execution_user_level(&mut conn, e.id, carol.id, Permission::Edit).unwrap();
        set_execution_user_level(&mut conn, e.id, alice.id, Permission::Own).unwrap();
        assert_eq!(execution_owner_ids(&mut conn, e.id).unwrap(), vec![bob.id, alice.id]);
    }
}

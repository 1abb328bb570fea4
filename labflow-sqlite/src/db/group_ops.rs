// src/db/group_ops.rs

use diesel::prelude::*;
use diesel::result::QueryResult;
use crate::models::group::{Group, NewGroup, NewUserGroupLink, UserGroupLink};
use crate::models::GroupRole;
use crate::schema::{user_group_links, user_groups};
use crate::{GroupId, UserId};

pub fn create_group(conn: &mut SqliteConnection, slug: &str, name: &str) -> QueryResult<Group> {
    let new_g = NewGroup {
        slug,
        name,
        created: crate::now(),
    };
    diesel::insert_into(user_groups::table)
        .values(&new_g)
        .execute(conn)?;

    user_groups::table
        .order(user_groups::id.desc())
        .first(conn)
}

pub fn get_group_by_id(conn: &mut SqliteConnection, group_id: GroupId) -> QueryResult<Group> {
    user_groups::table.find(group_id).first(conn)
}

pub fn find_group(conn: &mut SqliteConnection, group_id: GroupId) -> QueryResult<Option<Group>> {
    user_groups::table.find(group_id).first(conn).optional()
}

/// Inserts or replaces the user's role in the group.
pub fn set_membership(
    conn: &mut SqliteConnection,
    user_id: UserId,
    group_id: GroupId,
    role: GroupRole,
) -> QueryResult<usize> {
    diesel::insert_into(user_group_links::table)
        .values(&NewUserGroupLink {
            user_id,
            group_id,
            permission: role.level(),
        })
        .on_conflict((user_group_links::user_id, user_group_links::group_id))
        .do_update()
        .set(user_group_links::permission.eq(role.level()))
        .execute(conn)
}

pub fn remove_membership(conn: &mut SqliteConnection, user_id: UserId, group_id: GroupId) -> QueryResult<usize> {
    diesel::delete(
        user_group_links::table
            .filter(user_group_links::user_id.eq(user_id))
            .filter(user_group_links::group_id.eq(group_id)),
    )
    .execute(conn)
}

pub fn get_membership(
    conn: &mut SqliteConnection,
    user_id: UserId,
    group_id: GroupId,
) -> QueryResult<Option<GroupRole>> {
    let level: Option<i32> = user_group_links::table
        .filter(user_group_links::user_id.eq(user_id))
        .filter(user_group_links::group_id.eq(group_id))
        .select(user_group_links::permission)
        .first(conn)
        .optional()?;
    Ok(level.and_then(GroupRole::from_level))
}

pub fn list_members(conn: &mut SqliteConnection, group_id: GroupId) -> QueryResult<Vec<UserGroupLink>> {
    user_group_links::table
        .filter(user_group_links::group_id.eq(group_id))
        .order(user_group_links::user_id.asc())
        .load(conn)
}

/// Groups whose collection permissions flow to the user (member or admin).
pub fn cascading_group_ids(conn: &mut SqliteConnection, user_id: UserId) -> QueryResult<Vec<GroupId>> {
    user_group_links::table
        .filter(user_group_links::user_id.eq(user_id))
        .filter(user_group_links::permission.ge(GroupRole::Member.level()))
        .select(user_group_links::group_id)
        .load(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::user_ops;
    use crate::test_support::memory_conn;

    #[test]
    fn test_membership_upsert_and_cascade_filter() {
        let mut conn = memory_conn();
        let alice = user_ops::create_user(&mut conn, "alice", "").unwrap();
        let lab = create_group(&mut conn, "lab", "Lab").unwrap();
        let core = create_group(&mut conn, "core", "Core").unwrap();

        set_membership(&mut conn, alice.id, lab.id, GroupRole::Invited).unwrap();
        set_membership(&mut conn, alice.id, core.id, GroupRole::Admin).unwrap();
        assert_eq!(cascading_group_ids(&mut conn, alice.id).unwrap(), vec![core.id]);

        // accepting the invitation replaces the row instead of duplicating it
        set_membership(&mut conn, alice.id, lab.id, GroupRole::Member).unwrap();
        assert_eq!(list_members(&mut conn, lab.id).unwrap().len(), 1);
        assert_eq!(get_membership(&mut conn, alice.id, lab.id).unwrap(), Some(GroupRole::Member));

        let mut ids = cascading_group_ids(&mut conn, alice.id).unwrap();
        ids.sort();
        assert_eq!(ids, vec![lab.id, core.id]);

        remove_membership(&mut conn, alice.id, core.id).unwrap();
        assert_eq!(get_membership(&mut conn, alice.id, core.id).unwrap(), None);
    }
}

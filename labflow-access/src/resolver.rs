//! Effective permission of a user on a single entity.
//!
//! The level is the maximum over the entity's public flag, the user's direct
//! link, the parent's fully resolved level and (for collections) the links of
//! groups the user is a member or admin of. Anonymous callers only ever see
//! the entity's own public flag. A missing entity resolves to
//! `Permission::None`, so callers cannot tell it apart from a hidden one.

use diesel::sqlite::SqliteConnection;
use labflow_sqlite::db::{collection_ops, execution_ops, link_ops, sample_ops};
use labflow_sqlite::models::{Parent, Permission};
use labflow_sqlite::{CollectionId, ExecutionId, SampleId, UserId};

use crate::error::AccessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Collection(CollectionId),
    Sample(SampleId),
    Execution(ExecutionId),
}

impl EntityRef {
    /// Request field name used in error messages.
    pub fn field(&self) -> &'static str {
        match self {
            EntityRef::Collection(_) => "collection",
            EntityRef::Sample(_) => "sample",
            EntityRef::Execution(_) => "execution",
        }
    }

    pub fn from_parent(parent: Parent) -> Option<Self> {
        match parent {
            Parent::None => None,
            Parent::Collection(id) => Some(EntityRef::Collection(id)),
            Parent::Sample(id) => Some(EntityRef::Sample(id)),
        }
    }
}

pub fn effective_level(
    conn: &mut SqliteConnection,
    user: Option<UserId>,
    entity: EntityRef,
) -> Result<Permission, AccessError> {
    match entity {
        EntityRef::Collection(id) => collection_level(conn, user, id),
        EntityRef::Sample(id) => sample_level(conn, user, id),
        EntityRef::Execution(id) => execution_level(conn, user, id),
    }
}

fn public_level(private: bool) -> Permission {
    if private {
        Permission::None
    } else {
        Permission::View
    }
}

pub fn collection_level(
    conn: &mut SqliteConnection,
    user: Option<UserId>,
    id: CollectionId,
) -> Result<Permission, AccessError> {
    let Some(collection) = collection_ops::find_collection(conn, id)? else {
        return Ok(Permission::None);
    };
    let mut level = public_level(collection.private);
    let Some(user_id) = user else {
        return Ok(level);
    };

    level = level.max(link_ops::collection_user_level(conn, id, user_id)?);
    if level.is_owner() {
        return Ok(level);
    }
    Ok(level.max(link_ops::collection_level_via_groups(conn, id, user_id)?))
}

pub fn sample_level(
    conn: &mut SqliteConnection,
    user: Option<UserId>,
    id: SampleId,
) -> Result<Permission, AccessError> {
    let Some(sample) = sample_ops::find_sample(conn, id)? else {
        return Ok(Permission::None);
    };
    let mut level = public_level(sample.private);
    let Some(user_id) = user else {
        return Ok(level);
    };

    level = level.max(link_ops::sample_user_level(conn, id, user_id)?);
    if level.is_owner() {
        return Ok(level);
    }
    if let Some(collection_id) = sample.collection_id {
        level = level.max(collection_level(conn, user, collection_id)?);
    }
    Ok(level)
}

pub fn execution_level(
    conn: &mut SqliteConnection,
    user: Option<UserId>,
    id: ExecutionId,
) -> Result<Permission, AccessError> {
    let Some(execution) = execution_ops::find_execution(conn, id)? else {
        return Ok(Permission::None);
    };
    let mut level = public_level(execution.private);
    let Some(user_id) = user else {
        return Ok(level);
    };

    level = level.max(link_ops::execution_user_level(conn, id, user_id)?);
    if level.is_owner() {
        return Ok(level);
    }
    let inherited = match execution.parent() {
        Parent::Collection(cid) => collection_level(conn, user, cid)?,
        Parent::Sample(sid) => sample_level(conn, user, sid)?,
        Parent::None => Permission::None,
    };
    Ok(level.max(inherited))
}

pub fn can_view(conn: &mut SqliteConnection, user: Option<UserId>, entity: EntityRef) -> Result<bool, AccessError> {
    Ok(effective_level(conn, user, entity)?.can_view())
}

pub fn can_edit(conn: &mut SqliteConnection, user: Option<UserId>, entity: EntityRef) -> Result<bool, AccessError> {
    Ok(effective_level(conn, user, entity)?.can_edit())
}

pub fn can_share(conn: &mut SqliteConnection, user: Option<UserId>, entity: EntityRef) -> Result<bool, AccessError> {
    Ok(effective_level(conn, user, entity)?.can_share())
}

pub fn is_owner(conn: &mut SqliteConnection, user: Option<UserId>, entity: EntityRef) -> Result<bool, AccessError> {
    Ok(effective_level(conn, user, entity)?.is_owner())
}

pub fn require_user(user: Option<UserId>) -> Result<UserId, AccessError> {
    user.ok_or_else(AccessError::not_authorized)
}

/// Gate for single-entity operations: NotFound below `view`, PermissionDenied
/// below `needed`. Returns the resolved level.
pub fn require(
    conn: &mut SqliteConnection,
    user: Option<UserId>,
    entity: EntityRef,
    needed: Permission,
) -> Result<Permission, AccessError> {
    let level = effective_level(conn, user, entity)?;
    if !level.can_view() {
        return Err(AccessError::not_found(entity.field()));
    }
    if level < needed {
        let verb = match needed {
            Permission::Own => "own",
            Permission::Share => "share",
            _ => "edit",
        };
        return Err(AccessError::permission_denied(
            entity.field(),
            format!("You do not have permission to {verb} this {}", entity.field()),
        ));
    }
    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_conn, owned_collection, user};
    use labflow_sqlite::db::execution_ops::ExecutionDraft;
    use labflow_sqlite::db::group_ops;
    use labflow_sqlite::models::GroupRole;

    fn execution(
        conn: &mut SqliteConnection,
        private: bool,
        sample_id: Option<SampleId>,
        collection_id: Option<CollectionId>,
    ) -> ExecutionId {
        execution_ops::create_execution(
            conn,
            &ExecutionDraft {
                name: "run",
                command_id: None,
                private,
                sample_id,
                collection_id,
                input: "[]",
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_public_flag_is_only_source_for_anonymous() {
        let mut conn = memory_conn();
        let a = user(&mut conn, "a");
        let public = owned_collection(&mut conn, a, false);
        let private = owned_collection(&mut conn, a, true);

        assert_eq!(collection_level(&mut conn, None, public).unwrap(), Permission::View);
        assert_eq!(collection_level(&mut conn, None, private).unwrap(), Permission::None);
        assert_eq!(collection_level(&mut conn, Some(a), private).unwrap(), Permission::Own);

        // a private sample in a public collection stays hidden from anonymous
        let s = sample_ops::create_sample(&mut conn, "s", true, Some(public)).unwrap();
        assert_eq!(sample_level(&mut conn, None, s.id).unwrap(), Permission::None);
        let b = user(&mut conn, "b");
        assert_eq!(sample_level(&mut conn, Some(b), s.id).unwrap(), Permission::View);
    }

    #[test]
    fn test_sample_and_execution_cascade() {
        let mut conn = memory_conn();
        let a = user(&mut conn, "a");
        let b = user(&mut conn, "b");
        let c = owned_collection(&mut conn, a, true);
        link_ops::set_collection_user_level(&mut conn, c, b, Permission::Edit).unwrap();
        let s = sample_ops::create_sample(&mut conn, "s", true, Some(c)).unwrap().id;

        assert_eq!(sample_level(&mut conn, Some(b), s).unwrap(), Permission::Edit);

        let via_sample = execution(&mut conn, true, Some(s), None);
        assert_eq!(execution_level(&mut conn, Some(b), via_sample).unwrap(), Permission::Edit);

        // collection wins over sample when both are set
        let other = owned_collection(&mut conn, a, true);
        let both = execution(&mut conn, true, Some(s), Some(other));
        assert_eq!(execution_level(&mut conn, Some(b), both).unwrap(), Permission::None);

        link_ops::set_execution_user_level(&mut conn, both, b, Permission::Share).unwrap();
        assert_eq!(execution_level(&mut conn, Some(b), both).unwrap(), Permission::Share);
    }

    #[test]
    fn test_group_cascade_requires_membership() {
        let mut conn = memory_conn();
        let a = user(&mut conn, "a");
        let member = user(&mut conn, "member");
        let invitee = user(&mut conn, "invitee");
        let c = owned_collection(&mut conn, a, true);
        let s = sample_ops::create_sample(&mut conn, "s", true, Some(c)).unwrap().id;
        let g = group_ops::create_group(&mut conn, "lab", "Lab").unwrap().id;
        group_ops::set_membership(&mut conn, member, g, GroupRole::Member).unwrap();
        group_ops::set_membership(&mut conn, invitee, g, GroupRole::Invited).unwrap();
        link_ops::set_collection_group_level(&mut conn, c, g, Permission::Share).unwrap();

        assert_eq!(collection_level(&mut conn, Some(member), c).unwrap(), Permission::Share);
        assert_eq!(sample_level(&mut conn, Some(member), s).unwrap(), Permission::Share);
        assert_eq!(collection_level(&mut conn, Some(invitee), c).unwrap(), Permission::None);
        assert!(!can_view(&mut conn, Some(invitee), EntityRef::Sample(s)).unwrap());
    }

    #[test]
    fn test_levels_are_monotonic() {
        let mut conn = memory_conn();
        let a = user(&mut conn, "a");
        let b = user(&mut conn, "b");
        let c = owned_collection(&mut conn, a, true);
        for level in [Permission::None, Permission::View, Permission::Edit, Permission::Share, Permission::Own] {
            link_ops::set_collection_user_level(&mut conn, c, b, level).unwrap();
            let entity = EntityRef::Collection(c);
            let checks = [
                can_view(&mut conn, Some(b), entity).unwrap(),
                can_edit(&mut conn, Some(b), entity).unwrap(),
                can_share(&mut conn, Some(b), entity).unwrap(),
                is_owner(&mut conn, Some(b), entity).unwrap(),
            ];
            // once a capability is missing, every higher one is missing too
            let first_missing = checks.iter().position(|ok| !ok).unwrap_or(checks.len());
            assert!(checks[first_missing..].iter().all(|ok| !ok));
            assert_eq!(first_missing as i32, level.level());
        }
    }

    #[test]
    fn test_missing_entity_looks_hidden() {
        let mut conn = memory_conn();
        let a = user(&mut conn, "a");
        let err = require(&mut conn, Some(a), EntityRef::Execution(99), Permission::View).unwrap_err();
        assert!(matches!(err, AccessError::NotFound { .. }));
        assert!(matches!(require_user(None), Err(AccessError::NotAuthorized { .. })));
    }
}

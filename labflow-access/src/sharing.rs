//! Granting and revoking access.
//!
//! The acting user needs `share` on the entity. Any change that grants,
//! removes or alters an `own` link additionally needs the actor to be an
//! owner, resolved again before every change. Collection changes run inside
//! an IMMEDIATE transaction that also verifies at least one owner remains.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use labflow_sqlite::db::{group_ops, link_ops, user_ops};
use labflow_sqlite::models::links::{CollectionGroupLink, CollectionUserLink};
use labflow_sqlite::models::Permission;
use labflow_sqlite::{CollectionId, GroupId, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AccessError;
use crate::resolver::{effective_level, require, require_user, EntityRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Grantee {
    User(UserId),
    Group(GroupId),
}

/// One requested link change; `Permission::None` removes the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessChange {
    pub grantee: Grantee,
    pub level: Permission,
}

impl AccessChange {
    pub fn user(user_id: UserId, level: Permission) -> Self {
        Self {
            grantee: Grantee::User(user_id),
            level,
        }
    }

    pub fn group(group_id: GroupId, level: Permission) -> Self {
        Self {
            grantee: Grantee::Group(group_id),
            level,
        }
    }
}

/// Sets `target`'s direct link on any entity type.
pub fn set_user_permission(
    conn: &mut SqliteConnection,
    actor: Option<UserId>,
    entity: EntityRef,
    target: UserId,
    level: Permission,
) -> Result<(), AccessError> {
    match entity {
        EntityRef::Collection(id) => {
            apply_collection_access(conn, actor, id, &[AccessChange::user(target, level)])
        }
        EntityRef::Sample(_) | EntityRef::Execution(_) => {
            conn.immediate_transaction(|conn| set_child_permission(conn, actor, entity, target, level))
        }
    }
}

pub fn set_collection_group_permission(
    conn: &mut SqliteConnection,
    actor: Option<UserId>,
    collection_id: CollectionId,
    group_id: GroupId,
    level: Permission,
) -> Result<(), AccessError> {
    apply_collection_access(conn, actor, collection_id, &[AccessChange::group(group_id, level)])
}

/// Applies `changes` in order, all or nothing.
pub fn apply_collection_access(
    conn: &mut SqliteConnection,
    actor: Option<UserId>,
    collection_id: CollectionId,
    changes: &[AccessChange],
) -> Result<(), AccessError> {
    let entity = EntityRef::Collection(collection_id);
    conn.immediate_transaction::<_, AccessError, _>(|conn| {
        for change in changes {
            apply_one(conn, actor, collection_id, change)?;
        }
        if link_ops::collection_owner_count(conn, collection_id)? == 0 {
            return Err(AccessError::invariant(
                "permission",
                "A collection must always have at least one owner",
            ));
        }
        info!(
            collection = collection_id,
            changes = changes.len(),
            "updated {} access",
            entity.field()
        );
        Ok(())
    })
}

fn apply_one(
    conn: &mut SqliteConnection,
    actor: Option<UserId>,
    collection_id: CollectionId,
    change: &AccessChange,
) -> Result<(), AccessError> {
    let entity = EntityRef::Collection(collection_id);
    require_user(actor)?;
    require(conn, actor, entity, Permission::Share)?;

    match change.grantee {
        Grantee::User(user_id) => {
            ensure_user_exists(conn, user_id)?;
            let previous = link_ops::collection_user_level(conn, collection_id, user_id)?;
            if touches_ownership(previous, change.level) {
                require_owner(conn, actor, entity)?;
            }
            link_ops::set_collection_user_level(conn, collection_id, user_id, change.level)?;
            debug!(collection = collection_id, user = user_id, level = ?change.level, "set user link");
        }
        Grantee::Group(group_id) => {
            if change.level.is_owner() {
                return Err(AccessError::invariant("permission", "Groups cannot own a collection"));
            }
            if group_ops::find_group(conn, group_id)?.is_none() {
                return Err(AccessError::not_found("group"));
            }
            link_ops::set_collection_group_level(conn, collection_id, group_id, change.level)?;
            debug!(collection = collection_id, group = group_id, level = ?change.level, "set group link");
        }
    }
    Ok(())
}

fn set_child_permission(
    conn: &mut SqliteConnection,
    actor: Option<UserId>,
    entity: EntityRef,
    target: UserId,
    level: Permission,
) -> Result<(), AccessError> {
    require_user(actor)?;
    require(conn, actor, entity, Permission::Share)?;
    ensure_user_exists(conn, target)?;

    let previous = match entity {
        EntityRef::Sample(id) => link_ops::sample_user_level(conn, id, target)?,
        EntityRef::Execution(id) => link_ops::execution_user_level(conn, id, target)?,
        EntityRef::Collection(id) => link_ops::collection_user_level(conn, id, target)?,
    };
    if touches_ownership(previous, level) {
        require_owner(conn, actor, entity)?;
    }
    match entity {
        EntityRef::Sample(id) => link_ops::set_sample_user_level(conn, id, target, level)?,
        EntityRef::Execution(id) => link_ops::set_execution_user_level(conn, id, target, level)?,
        EntityRef::Collection(id) => link_ops::set_collection_user_level(conn, id, target, level)?,
    };
    info!(entity = ?entity, user = target, level = ?level, "updated user link");
    Ok(())
}

fn touches_ownership(previous: Permission, next: Permission) -> bool {
    previous != next && (previous.is_owner() || next.is_owner())
}

fn require_owner(conn: &mut SqliteConnection, actor: Option<UserId>, entity: EntityRef) -> Result<(), AccessError> {
    if effective_level(conn, actor, entity)?.is_owner() {
        Ok(())
    } else {
        Err(AccessError::permission_denied(
            "permission",
            format!("Only owners can change ownership of this {}", entity.field()),
        ))
    }
}

fn ensure_user_exists(conn: &mut SqliteConnection, user_id: UserId) -> Result<(), AccessError> {
    match user_ops::find_user(conn, user_id)? {
        Some(_) => Ok(()),
        None => Err(AccessError::not_found("user")),
    }
}

/// Current user and group links on a collection; requires `share`.
pub fn collection_access(
    conn: &mut SqliteConnection,
    actor: Option<UserId>,
    collection_id: CollectionId,
) -> Result<(Vec<CollectionUserLink>, Vec<CollectionGroupLink>), AccessError> {
    require_user(actor)?;
    require(conn, actor, EntityRef::Collection(collection_id), Permission::Share)?;
    Ok((
        link_ops::list_collection_user_links(conn, collection_id)?,
        link_ops::list_collection_group_links(conn, collection_id)?,
    ))
}

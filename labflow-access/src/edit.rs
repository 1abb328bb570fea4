//! Permission-gated creation, update and fetch of Collections, Samples and
//! Executions.
//!
//! A child with a parent always carries the parent's `private` flag. Changing
//! the flag on a parent rewrites it on every child in the same transaction.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use labflow_pipeline::dependency::upstream_ids;
use labflow_pipeline::params::{is_plain_file_name, params_to_json, Param, ParamKind};
use labflow_sqlite::db::execution_ops::{self, ExecutionDraft};
use labflow_sqlite::db::{collection_ops, command_ops, link_ops, sample_ops};
use labflow_sqlite::models::collection::Collection;
use labflow_sqlite::models::execution::Execution;
use labflow_sqlite::models::sample::Sample;
use labflow_sqlite::models::{Parent, Permission};
use labflow_sqlite::{CollectionId, CommandId, ExecutionId, SampleId, UserId};
use tracing::{debug, info};

use crate::error::AccessError;
use crate::resolver::{require, require_user, EntityRef};
use crate::visibility::visible_executions;

#[derive(Debug, Clone, Default)]
pub struct CreateCollection {
    pub name: String,
    pub description: String,
    pub private: bool,
}

/// `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateCollection {
    pub id: CollectionId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub private: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateSample {
    pub name: String,
    /// Ignored when `collection_id` is set.
    pub private: bool,
    pub collection_id: Option<CollectionId>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSample {
    pub id: SampleId,
    pub name: Option<String>,
    /// Ignored while the sample belongs to a collection.
    pub private: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CreateExecution {
    pub name: String,
    pub command_id: Option<CommandId>,
    pub parent: Parent,
    /// Ignored when `parent` is set.
    pub private: bool,
    pub input: Vec<Param>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateExecution {
    pub id: ExecutionId,
    pub name: Option<String>,
    /// Ignored while the execution has a parent.
    pub private: Option<bool>,
}

// -----------------------------
// fetch
// -----------------------------

pub fn fetch_collection(
    conn: &mut SqliteConnection,
    user: Option<UserId>,
    id: CollectionId,
) -> Result<Collection, AccessError> {
    require(conn, user, EntityRef::Collection(id), Permission::View)?;
    Ok(collection_ops::get_collection_by_id(conn, id)?)
}

pub fn fetch_sample(conn: &mut SqliteConnection, user: Option<UserId>, id: SampleId) -> Result<Sample, AccessError> {
    require(conn, user, EntityRef::Sample(id), Permission::View)?;
    Ok(sample_ops::get_sample_by_id(conn, id)?)
}

pub fn fetch_execution(
    conn: &mut SqliteConnection,
    user: Option<UserId>,
    id: ExecutionId,
) -> Result<Execution, AccessError> {
    require(conn, user, EntityRef::Execution(id), Permission::View)?;
    Ok(execution_ops::get_execution_by_id(conn, id)?)
}

// -----------------------------
// collections
// -----------------------------

pub fn create_collection(
    conn: &mut SqliteConnection,
    actor: Option<UserId>,
    req: &CreateCollection,
) -> Result<Collection, AccessError> {
    let user_id = require_user(actor)?;
    conn.transaction::<_, AccessError, _>(|conn| {
        let collection = collection_ops::create_collection(conn, &req.name, &req.description, req.private)?;
        link_ops::set_collection_user_level(conn, collection.id, user_id, Permission::Own)?;
        info!(collection = collection.id, user = user_id, "created collection");
        Ok(collection)
    })
}

pub fn update_collection(
    conn: &mut SqliteConnection,
    actor: Option<UserId>,
    req: &UpdateCollection,
) -> Result<Collection, AccessError> {
    require_user(actor)?;
    conn.transaction::<_, AccessError, _>(|conn| {
        require(conn, actor, EntityRef::Collection(req.id), Permission::Edit)?;
        let current = collection_ops::get_collection_by_id(conn, req.id)?;

        if req.name.is_some() || req.description.is_some() {
            let name = req.name.as_deref().unwrap_or(&current.name);
            let description = req.description.as_deref().unwrap_or(&current.description);
            collection_ops::update_collection_details(conn, req.id, name, description)?;
        }
        if let Some(private) = req.private.filter(|p| *p != current.private) {
            cascade_collection_privacy(conn, req.id, private)?;
        }
        Ok(collection_ops::get_collection_by_id(conn, req.id)?)
    })
}

fn cascade_collection_privacy(
    conn: &mut SqliteConnection,
    collection_id: CollectionId,
    private: bool,
) -> Result<(), AccessError> {
    collection_ops::set_private(conn, collection_id, private)?;
    let samples = sample_ops::set_private_in_collection(conn, collection_id, private)?;
    let sample_ids: Vec<SampleId> = sample_ops::list_samples_in_collection(conn, collection_id)?
        .into_iter()
        .map(|s| s.id)
        .collect();
    let executions = execution_ops::set_private_in_collection(conn, collection_id, private)?
        + execution_ops::set_private_for_samples(conn, &sample_ids, private)?;
    info!(collection = collection_id, private, samples, executions, "cascaded privacy");
    Ok(())
}

// -----------------------------
// samples
// -----------------------------

pub fn create_sample(conn: &mut SqliteConnection, actor: Option<UserId>, req: &CreateSample) -> Result<Sample, AccessError> {
    let user_id = require_user(actor)?;
    conn.transaction::<_, AccessError, _>(|conn| {
        let private = match req.collection_id {
            Some(cid) => {
                require(conn, actor, EntityRef::Collection(cid), Permission::Edit)?;
                collection_ops::get_collection_by_id(conn, cid)?.private
            }
            None => req.private,
        };
        let sample = sample_ops::create_sample(conn, &req.name, private, req.collection_id)?;
        link_ops::set_sample_user_level(conn, sample.id, user_id, Permission::Own)?;
        info!(sample = sample.id, user = user_id, "created sample");
        Ok(sample)
    })
}

pub fn update_sample(conn: &mut SqliteConnection, actor: Option<UserId>, req: &UpdateSample) -> Result<Sample, AccessError> {
    require_user(actor)?;
    conn.transaction::<_, AccessError, _>(|conn| {
        require(conn, actor, EntityRef::Sample(req.id), Permission::Edit)?;
        let current = sample_ops::get_sample_by_id(conn, req.id)?;

        if let Some(name) = &req.name {
            sample_ops::update_sample_name(conn, req.id, name)?;
        }
        match req.private.filter(|p| *p != current.private) {
            Some(_) if current.collection_id.is_some() => {
                debug!(sample = req.id, "ignoring privacy change on a sample inside a collection");
            }
            Some(private) => {
                sample_ops::set_private(conn, req.id, private)?;
                let executions = execution_ops::set_private_for_samples(conn, &[req.id], private)?;
                info!(sample = req.id, private, executions, "cascaded privacy");
            }
            None => {}
        }
        Ok(sample_ops::get_sample_by_id(conn, req.id)?)
    })
}

// -----------------------------
// executions
// -----------------------------

pub fn create_execution(
    conn: &mut SqliteConnection,
    actor: Option<UserId>,
    req: &CreateExecution,
) -> Result<Execution, AccessError> {
    let user_id = require_user(actor)?;
    let input = params_to_json(&req.input).map_err(|e| AccessError::invariant("input", e.to_string()))?;

    conn.transaction::<_, AccessError, _>(|conn| {
        if let Some(command_id) = req.command_id {
            if command_ops::find_command(conn, command_id)?.is_none() {
                return Err(AccessError::not_found("command"));
            }
        }
        check_inputs(conn, actor, &req.input)?;
        let private = match EntityRef::from_parent(req.parent) {
            Some(parent) => {
                require(conn, actor, parent, Permission::Edit)?;
                parent_private(conn, req.parent)?.unwrap_or(req.private)
            }
            None => req.private,
        };
        let (sample_id, collection_id) = match req.parent {
            Parent::Collection(cid) => (None, Some(cid)),
            Parent::Sample(sid) => (Some(sid), None),
            Parent::None => (None, None),
        };

        let execution = execution_ops::create_execution(
            conn,
            &ExecutionDraft {
                name: &req.name,
                command_id: req.command_id,
                private,
                sample_id,
                collection_id,
                input: &input,
            },
        )?;
        link_ops::set_execution_user_level(conn, execution.id, user_id, Permission::Own)?;
        info!(execution = execution.id, user = user_id, "created execution");
        Ok(execution)
    })
}

pub fn update_execution(
    conn: &mut SqliteConnection,
    actor: Option<UserId>,
    req: &UpdateExecution,
) -> Result<Execution, AccessError> {
    require_user(actor)?;
    conn.transaction::<_, AccessError, _>(|conn| {
        require(conn, actor, EntityRef::Execution(req.id), Permission::Edit)?;
        let current = execution_ops::get_execution_by_id(conn, req.id)?;

        if let Some(name) = &req.name {
            execution_ops::update_execution_name(conn, req.id, name)?;
        }
        if let Some(private) = req.private.filter(|p| *p != current.private) {
            if current.parent() == Parent::None {
                execution_ops::set_private(conn, req.id, private)?;
            } else {
                debug!(execution = req.id, "ignoring privacy change on an execution with a parent");
            }
        }
        Ok(execution_ops::get_execution_by_id(conn, req.id)?)
    })
}

/// File inputs must name a file directly inside the run directory, and every
/// referenced upstream Execution must be visible to the actor. Hidden and
/// absent upstreams are reported the same way.
fn check_inputs(conn: &mut SqliteConnection, actor: Option<UserId>, inputs: &[Param]) -> Result<(), AccessError> {
    for input in inputs.iter().filter(|p| p.kind == ParamKind::File) {
        if !input.file_name().is_some_and(is_plain_file_name) {
            return Err(AccessError::invariant(
                "input",
                format!("Input '{}' must be a plain file name", input.name),
            ));
        }
    }

    let ids = upstream_ids(inputs);
    let visible = visible_executions(conn, actor, &ids)?;
    match ids.into_iter().find(|id| !visible.contains(id)) {
        Some(id) => {
            debug!(upstream = id, "rejecting input that references an unavailable execution");
            Err(AccessError::NotFound {
                field: "input".into(),
                message: format!("Execution {id} does not exist"),
            })
        }
        None => Ok(()),
    }
}

/// `private` flag of the parent, `None` when there is no parent.
pub fn parent_private(conn: &mut SqliteConnection, parent: Parent) -> Result<Option<bool>, AccessError> {
    Ok(match parent {
        Parent::Collection(cid) => Some(collection_ops::get_collection_by_id(conn, cid)?.private),
        Parent::Sample(sid) => Some(sample_ops::get_sample_by_id(conn, sid)?.private),
        Parent::None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{can_view, is_owner};
    use crate::test_support::{memory_conn, user};

    fn execution_req(parent: Parent, private: bool) -> CreateExecution {
        CreateExecution {
            name: "align".into(),
            command_id: None,
            parent,
            private,
            input: vec![Param::basic("threads", 4)],
        }
    }

    #[test]
    fn test_creator_owns_new_entities() {
        let mut conn = memory_conn();
        let a = user(&mut conn, "a");
        let c = create_collection(&mut conn, Some(a), &CreateCollection { name: "c".into(), private: true, ..Default::default() }).unwrap();
        assert!(is_owner(&mut conn, Some(a), EntityRef::Collection(c.id)).unwrap());

        let e = create_execution(&mut conn, Some(a), &execution_req(Parent::None, true)).unwrap();
        assert!(is_owner(&mut conn, Some(a), EntityRef::Execution(e.id)).unwrap());
        assert_eq!(e.input, r#"[{"name":"threads","type":"basic","value":4}]"#);

        let err = create_collection(&mut conn, None, &CreateCollection::default()).unwrap_err();
        assert!(matches!(err, AccessError::NotAuthorized { .. }));
    }

    #[test]
    fn test_children_take_parent_privacy() {
        let mut conn = memory_conn();
        let a = user(&mut conn, "a");
        let c = create_collection(&mut conn, Some(a), &CreateCollection { name: "c".into(), private: true, ..Default::default() }).unwrap();
        let s = create_sample(&mut conn, Some(a), &CreateSample { name: "s".into(), private: false, collection_id: Some(c.id) }).unwrap();
        assert!(s.private);

        let e = create_execution(&mut conn, Some(a), &execution_req(Parent::Sample(s.id), false)).unwrap();
        assert!(e.private);

        let s = update_sample(&mut conn, Some(a), &UpdateSample { id: s.id, private: Some(false), ..Default::default() }).unwrap();
        assert!(s.private);
        let e = update_execution(&mut conn, Some(a), &UpdateExecution { id: e.id, private: Some(false), ..Default::default() }).unwrap();
        assert!(e.private);
    }

    #[test]
    fn test_collection_privacy_cascades() {
        let mut conn = memory_conn();
        let a = user(&mut conn, "a");
        let b = user(&mut conn, "b");
        let c = create_collection(&mut conn, Some(a), &CreateCollection { name: "c".into(), private: true, ..Default::default() }).unwrap();
        let s = create_sample(&mut conn, Some(a), &CreateSample { name: "s".into(), private: true, collection_id: Some(c.id) }).unwrap();
        let on_sample = create_execution(&mut conn, Some(a), &execution_req(Parent::Sample(s.id), true)).unwrap();
        let on_collection = create_execution(&mut conn, Some(a), &execution_req(Parent::Collection(c.id), true)).unwrap();

        let c = update_collection(&mut conn, Some(a), &UpdateCollection { id: c.id, private: Some(false), name: Some("renamed".into()), ..Default::default() }).unwrap();
        assert!(!c.private);
        assert_eq!(c.name, "renamed");
        assert!(!sample_ops::get_sample_by_id(&mut conn, s.id).unwrap().private);
        for id in [on_sample.id, on_collection.id] {
            assert!(!execution_ops::get_execution_by_id(&mut conn, id).unwrap().private);
            assert!(can_view(&mut conn, None, EntityRef::Execution(id)).unwrap());
        }

        let err = update_collection(&mut conn, Some(b), &UpdateCollection { id: c.id, private: Some(true), ..Default::default() }).unwrap_err();
        assert!(matches!(err, AccessError::PermissionDenied { .. }));
    }

    #[test]
    fn test_attaching_requires_edit_on_parent() {
        let mut conn = memory_conn();
        let a = user(&mut conn, "a");
        let b = user(&mut conn, "b");
        let c = create_collection(&mut conn, Some(a), &CreateCollection { name: "c".into(), private: true, ..Default::default() }).unwrap();

        let err = create_sample(&mut conn, Some(b), &CreateSample { name: "s".into(), private: true, collection_id: Some(c.id) }).unwrap_err();
        assert!(matches!(err, AccessError::NotFound { .. }));

        link_ops::set_collection_user_level(&mut conn, c.id, b, Permission::View).unwrap();
        let err = create_execution(&mut conn, Some(b), &execution_req(Parent::Collection(c.id), true)).unwrap_err();
        assert!(matches!(err, AccessError::PermissionDenied { .. }));

        let err = create_execution(&mut conn, Some(a), &CreateExecution { command_id: Some(42), ..execution_req(Parent::None, true) }).unwrap_err();
        assert!(matches!(err, AccessError::NotFound { .. }));
    }

    #[test]
    fn test_fetch_hides_private_and_missing_alike() {
        let mut conn = memory_conn();
        let a = user(&mut conn, "a");
        let b = user(&mut conn, "b");
        let c = create_collection(&mut conn, Some(a), &CreateCollection { name: "c".into(), private: true, ..Default::default() }).unwrap();

        assert_eq!(fetch_collection(&mut conn, Some(a), c.id).unwrap().id, c.id);
        let hidden = fetch_collection(&mut conn, Some(b), c.id).unwrap_err().to_string();
        let missing = fetch_collection(&mut conn, Some(b), c.id + 100).unwrap_err().to_string();
        assert_eq!(hidden, missing);
        assert!(matches!(fetch_sample(&mut conn, None, 1), Err(AccessError::NotFound { .. })));
        assert!(matches!(fetch_execution(&mut conn, Some(a), 1), Err(AccessError::NotFound { .. })));
    }

    #[test]
    fn test_inputs_must_reference_visible_executions() {
        let mut conn = memory_conn();
        let a = user(&mut conn, "a");
        let b = user(&mut conn, "b");
        let upstream = create_execution(&mut conn, Some(a), &execution_req(Parent::None, true)).unwrap();
        let consumer = CreateExecution {
            input: vec![Param::new("reads", ParamKind::DataList(None), serde_json::json!([upstream.id]))],
            ..execution_req(Parent::None, true)
        };

        let hidden = create_execution(&mut conn, Some(b), &consumer).unwrap_err();
        assert!(matches!(hidden, AccessError::NotFound { .. }));
        let missing = CreateExecution { input: vec![Param::data("genome", upstream.id + 100)], ..consumer.clone() };
        let missing = create_execution(&mut conn, Some(b), &missing).unwrap_err();
        assert_eq!(hidden.to_string(), format!("input: Execution {} does not exist", upstream.id));
        assert_eq!(missing.to_string(), format!("input: Execution {} does not exist", upstream.id + 100));

        link_ops::set_execution_user_level(&mut conn, upstream.id, b, Permission::View).unwrap();
        let e = create_execution(&mut conn, Some(b), &consumer).unwrap();
        assert!(is_owner(&mut conn, Some(b), EntityRef::Execution(e.id)).unwrap());
    }

    #[test]
    fn test_file_inputs_must_be_plain_names() {
        let mut conn = memory_conn();
        let a = user(&mut conn, "a");
        for bad in ["/etc/passwd", "../7/out.bam", ""] {
            let req = CreateExecution { input: vec![Param::file("sheet", bad)], ..execution_req(Parent::None, true) };
            let err = create_execution(&mut conn, Some(a), &req).unwrap_err();
            assert!(matches!(err, AccessError::InvariantViolation { .. }), "{bad}");
        }
        let req = CreateExecution { input: vec![Param::file("sheet", "samples.csv")], ..execution_req(Parent::None, true) };
        assert!(create_execution(&mut conn, Some(a), &req).is_ok());
    }
}

pub mod permission;
pub mod user;
pub mod group;
pub mod collection;
pub mod sample;
pub mod command;
pub mod execution;
pub mod process_record;
pub mod links;

pub use permission::{GroupRole, Permission};

use crate::{CollectionId, SampleId};

/// The entity an Execution (or Sample) inherits access and privacy from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent {
    None,
    Collection(CollectionId),
    Sample(SampleId),
}

impl Parent {
    /// Collection takes precedence when both references are set.
    pub fn resolve(collection_id: Option<CollectionId>, sample_id: Option<SampleId>) -> Self {
        match (collection_id, sample_id) {
            (Some(c), _) => Parent::Collection(c),
            (None, Some(s)) => Parent::Sample(s),
            (None, None) => Parent::None,
        }
    }
}

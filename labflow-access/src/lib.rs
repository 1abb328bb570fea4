//! Permission resolution, batched visibility and permission-gated mutations
//! for Collections, Samples and Executions.

pub mod error;
pub mod resolver;
pub mod visibility;
pub mod sharing;
pub mod edit;

pub use error::AccessError;
pub use resolver::{can_edit, can_share, can_view, effective_level, is_owner, EntityRef};
pub use visibility::{visible, visible_collections, visible_executions, visible_samples};

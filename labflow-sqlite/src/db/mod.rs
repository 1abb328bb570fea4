pub mod user_ops;
pub mod group_ops;
pub mod collection_ops;
pub mod sample_ops;
pub mod command_ops;
pub mod execution_ops;
pub mod process_ops;
pub mod link_ops;

//! CLI command implementations.

pub mod add;
pub mod delete;
pub mod list;
pub mod log;
pub mod sync;

//! SQLite-backed local store.

mod connection;
pub mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{ContactRepository, GroupRepository};

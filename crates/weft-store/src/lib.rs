//! SQLite persistence for execution records and agent metrics.

pub mod store;

pub use store::SqliteStore;

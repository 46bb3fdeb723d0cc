//! SQLite Adapter
//!
//! Durable SeenStore backed by a single-file SQLite database.

mod store;

pub use store::SqliteSeenStore;

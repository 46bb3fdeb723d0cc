//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - CSFloat: listings API client
//! - SQLite: durable seen/notified store
//! - ntfy: push notification transport
//! - CLI: Command-line interface definitions

pub mod csfloat;
pub mod sqlite;
pub mod ntfy;
pub mod cli;

pub use csfloat::{CsfloatClient, CsfloatConfig};
pub use sqlite::SqliteSeenStore;
pub use ntfy::{NtfyNotifier, NtfyConfig};
pub use cli::CliApp;

//! CLI Adapter
//!
//! Command-line interface for the listing monitor.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CliApp, Command, RunCmd, CheckCmd, CleanupCmd, StatsCmd, DEFAULT_CONFIG_PATH};

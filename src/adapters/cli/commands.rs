//! CLI Command Definitions
//!
//! Argument parsing for the csfloat-sniper binary. Handlers live in main.rs.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";

/// csfloat-sniper - CSFloat listing monitor with push alerts for underpriced items
#[derive(Parser, Debug)]
#[command(
    name = "csfloat-sniper",
    version = env!("CARGO_PKG_VERSION"),
    about = "CSFloat listing monitor with push alerts for underpriced items",
    long_about = "Polls the most recent CSFloat listings with an adaptive rate controller, \
                  deduplicates them against a local window and a SQLite store, and sends \
                  one ntfy notification per listing priced below its reference value."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the monitor loop
    Run(RunCmd),

    /// Fetch one page and report deals without writing state
    Check(CheckCmd),

    /// Delete seen-listing rows older than the retention window
    Cleanup(CleanupCmd),

    /// Show seen-listing store counts
    Stats(StatsCmd),
}

#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log deals instead of sending notifications
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct CheckCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Page size to request (defaults to the configured maximum)
    #[arg(short, long, value_name = "N")]
    pub limit: Option<u32>,
}

#[derive(Parser, Debug)]
pub struct CleanupCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override retention window in days
    #[arg(long, value_name = "DAYS")]
    pub days: Option<u32>,
}

#[derive(Parser, Debug)]
pub struct StatsCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_dry_run() {
        let app = CliApp::try_parse_from(["csfloat-sniper", "run", "--dry-run", "-v"]).unwrap();

        assert!(app.verbose);
        match app.command {
            Command::Run(cmd) => {
                assert!(cmd.dry_run);
                assert_eq!(cmd.config, PathBuf::from(DEFAULT_CONFIG_PATH));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_cleanup_days() {
        let app = CliApp::try_parse_from([
            "csfloat-sniper", "cleanup", "--config", "alt.toml", "--days", "3",
        ])
        .unwrap();

        match app.command {
            Command::Cleanup(cmd) => {
                assert_eq!(cmd.days, Some(3));
                assert_eq!(cmd.config, PathBuf::from("alt.toml"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(CliApp::try_parse_from(["csfloat-sniper"]).is_err());
    }
}

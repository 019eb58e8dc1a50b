//! CLI argument parsing using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Connect enrolment sync - Keep course enrolments in line with Connect
#[derive(Parser, Debug)]
#[command(name = "enrol-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Snapshot file holding Connect and target system state
    #[arg(long, global = true, env = "ENROL_SYNC_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Sync configuration (TOML); defaults apply when absent
    #[arg(long, global = true, env = "ENROL_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Synchronize enrolments for one course or all of them
    ///
    /// Examples:
    ///   enrol-sync run                 # All courses
    ///   enrol-sync run --course 42     # One course
    ///   enrol-sync run --dry 1         # Show the plan, change nothing
    Run {
        /// Course id; 0 syncs every course with a Connect instance
        #[arg(long, default_value_t = 0)]
        course: u64,

        /// Dry run (0 or 1)
        #[arg(long, value_name = "0|1", default_value = "0", value_parser = parse_flag, action = ArgAction::Set)]
        dry: bool,

        /// Log progress (0 or 1)
        #[arg(long, value_name = "0|1", default_value = "1", value_parser = parse_flag, action = ArgAction::Set)]
        verbose: bool,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scheduled task: live sync of every course
    Task,
}

impl Commands {
    /// Whether info-level logs were requested
    pub fn verbose(&self) -> bool {
        match self {
            Commands::Run { verbose, .. } => *verbose,
            Commands::Task => true,
        }
    }
}

/// Parse a `0`/`1` flag value
fn parse_flag(value: &str) -> Result<bool, String> {
    match value.trim() {
        "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        other => Err(format!("expected 0 or 1, got {other:?}")),
    }
}

//! Connect enrolment sync CLI
//!
//! Runs the enrolment sync against a snapshot of Connect and the target
//! system. Exit codes: 0 success, 1 error, 2 sync disabled.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands};
use commands::{ExitStatus, RunArgs};
use error::Result;

fn main() {
    let status = match run() {
        Ok(status) => status,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitStatus::Failed
        }
    };
    std::process::exit(status.code());
}

fn run() -> Result<ExitStatus> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        // No command provided - show help hint
        println!("{} Connect enrolment sync", "enrol-sync".green().bold());
        println!();
        println!("Run {} for available commands.", "enrol-sync --help".cyan());
        return Ok(ExitStatus::Success);
    };

    init_tracing(command.verbose());

    let snapshot = cli.snapshot.as_deref();
    let config = cli.config.as_deref();
    match command {
        Commands::Run {
            course,
            dry,
            json,
            ..
        } => {
            let args = RunArgs {
                course,
                dry_run: dry,
                json,
            };
            commands::run_sync(snapshot, config, &args)
        }
        Commands::Task => commands::run_task(snapshot, config),
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the verbosity flag
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("{}: could not install logger: {}", "warning".yellow().bold(), e);
    }
}

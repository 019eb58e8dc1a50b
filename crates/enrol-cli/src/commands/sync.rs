//! Run and task command implementations
//!
//! Both commands load the snapshot, run the SyncEngine against it and, unless
//! this is a dry run, write the snapshot back.

use std::path::Path;

use colored::Colorize;

use enrol_core::store::SnapshotStore;
use enrol_core::{
    CourseId, CourseReport, Error, Interrupt, SyncConfig, SyncEngine, SyncOptions, SyncOutcome,
    SyncReport,
};

use crate::error::{CliError, Result};

/// Process exit status of a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failed,
    Disabled,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failed => 1,
            ExitStatus::Disabled => 2,
        }
    }

    fn from_report(report: &SyncReport) -> Self {
        match report.outcome {
            SyncOutcome::Disabled => ExitStatus::Disabled,
            SyncOutcome::Interrupted => ExitStatus::Failed,
            SyncOutcome::Completed if report.is_clean() => ExitStatus::Success,
            SyncOutcome::Completed => ExitStatus::Failed,
        }
    }
}

/// Arguments of the run command
#[derive(Debug, Clone)]
pub struct RunArgs {
    /// 0 for every course
    pub course: u64,
    pub dry_run: bool,
    pub json: bool,
}

/// Run the run command
pub fn run_sync(snapshot: Option<&Path>, config: Option<&Path>, args: &RunArgs) -> Result<ExitStatus> {
    let snapshot = require_snapshot(snapshot)?;
    let config = SyncConfig::load_or_default(config)?;
    let store = SnapshotStore::load(snapshot)?;

    if !args.json {
        let mode = if args.dry_run { " (dry run)" } else { "" };
        println!(
            "{} Synchronizing Connect enrolments{}...",
            "=>".blue().bold(),
            mode
        );
    }

    let options = SyncOptions {
        dry_run: args.dry_run,
        interrupt: Some(install_interrupt()),
    };
    let engine = SyncEngine::new(&config, &store, &store, &store, &store);

    let report = if args.course == 0 {
        engine.sync_all(&options)?
    } else {
        match engine.sync_course(CourseId(args.course), &options) {
            Ok(course) => single_course_report(args.dry_run, course),
            Err(Error::PluginDisabled) => {
                SyncReport::start(args.dry_run).finish(SyncOutcome::Disabled)
            }
            Err(e) => return Err(e.into()),
        }
    };

    if !args.dry_run && report.outcome != SyncOutcome::Disabled {
        store.save(snapshot)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(ExitStatus::from_report(&report))
}

/// Run the scheduled task
///
/// A live sync of every course; equivalent to `run --course 0 --dry 0`.
pub fn run_task(snapshot: Option<&Path>, config: Option<&Path>) -> Result<ExitStatus> {
    let args = RunArgs {
        course: 0,
        dry_run: false,
        json: false,
    };
    run_sync(snapshot, config, &args)
}

fn require_snapshot(snapshot: Option<&Path>) -> Result<&Path> {
    snapshot.ok_or_else(|| {
        CliError::user("No snapshot given. Pass --snapshot <path> or set ENROL_SYNC_SNAPSHOT.")
    })
}

fn single_course_report(dry_run: bool, course: CourseReport) -> SyncReport {
    let mut report = SyncReport::start(dry_run);
    report.courses.push(course);
    report.finish(SyncOutcome::Completed)
}

/// Ctrl+C stops the run at the next course boundary
fn install_interrupt() -> Interrupt {
    let interrupt = Interrupt::new();
    let handle = interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || handle.trigger()) {
        tracing::warn!(error = %e, "Could not install Ctrl+C handler");
    }
    interrupt
}

fn print_report(report: &SyncReport) {
    if report.outcome == SyncOutcome::Disabled {
        println!(
            "{} Connect enrolment sync is disabled.",
            "DISABLED".yellow().bold()
        );
        return;
    }

    for course in &report.courses {
        if course.actions.is_empty() && course.skipped.is_empty() && course.failures.is_empty() {
            continue;
        }
        println!("{} course {}", "->".blue(), course.course_id.to_string().cyan());
        for action in &course.actions {
            println!("   {} {}", "+".green(), action);
        }
        for skipped in &course.skipped {
            println!(
                "   {} skipped {}: {}",
                "-".yellow(),
                skipped.username.to_string().cyan(),
                skipped.reason
            );
        }
        for failure in &course.failures {
            println!("   {} {}: {}", "!".red(), failure.command, failure.error);
        }
    }

    for error in &report.errors {
        println!(
            "{} course {}: {}",
            "ERROR".red().bold(),
            error.course_id,
            error.message
        );
    }

    if report.outcome == SyncOutcome::Interrupted {
        println!(
            "{} Stopped before every course was synchronized.",
            "INTERRUPTED".yellow().bold()
        );
    }

    let verb = if report.dry_run { "would be made" } else { "made" };
    let changes = report.change_count();
    if changes == 0 && report.is_clean() {
        println!("{} Already synchronized. No changes needed.", "OK".green().bold());
    } else if report.is_clean() {
        println!(
            "{} {} change(s) {} across {} course(s).",
            "OK".green().bold(),
            changes,
            verb,
            report.courses.len()
        );
    } else {
        println!(
            "{} {} change(s) {}, {} failed command(s), {} failed course(s).",
            "WARN".yellow().bold(),
            changes,
            verb,
            report.failure_count(),
            report.errors.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Failed.code(), 1);
        assert_eq!(ExitStatus::Disabled.code(), 2);
    }

    #[test]
    fn status_from_report() {
        let disabled = SyncReport::start(false).finish(SyncOutcome::Disabled);
        assert_eq!(ExitStatus::from_report(&disabled), ExitStatus::Disabled);

        let clean = SyncReport::start(false).finish(SyncOutcome::Completed);
        assert_eq!(ExitStatus::from_report(&clean), ExitStatus::Success);

        let mut failed = SyncReport::start(false);
        failed.errors.push(enrol_core::sync::CourseError {
            course_id: CourseId(3),
            message: "Course not found: 3".to_string(),
        });
        let failed = failed.finish(SyncOutcome::Completed);
        assert_eq!(ExitStatus::from_report(&failed), ExitStatus::Failed);
    }

    #[test]
    fn missing_snapshot_is_a_user_error() {
        let result = require_snapshot(None);
        assert!(matches!(result, Err(CliError::User { .. })));
    }
}

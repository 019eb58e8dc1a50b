//! SyncEngine for bringing target enrolments in line with Connect
//!
//! This module provides:
//! - **apply**: Execute reconciler commands, or describe them in dry-run
//! - **engine**: Per-course and whole-site orchestration
//! - **report**: Run and course reports

mod apply;
mod engine;
mod report;

pub use apply::{Applier, ApplyReport, CommandFailure, SkippedUser};
pub use engine::{Interrupt, SyncEngine, SyncOptions};
pub use report::{CourseError, CourseReport, SyncOutcome, SyncReport};

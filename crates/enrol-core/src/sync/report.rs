//! Reports produced by the sync engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{CourseId, InstanceId};
use super::apply::{ApplyReport, CommandFailure, SkippedUser};

/// Result of syncing a single course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseReport {
    pub course_id: CourseId,
    /// Instances that contributed desired state
    pub instances: Vec<InstanceId>,
    /// Commands the reconciler produced
    pub planned: usize,
    /// Commands applied (or that would be applied in dry-run)
    pub change_count: usize,
    pub actions: Vec<String>,
    pub skipped: Vec<SkippedUser>,
    pub failures: Vec<CommandFailure>,
}

impl CourseReport {
    /// Report for a course that had nothing to do
    pub fn empty(course_id: CourseId) -> Self {
        Self {
            course_id,
            instances: Vec::new(),
            planned: 0,
            change_count: 0,
            actions: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub(crate) fn from_apply(
        course_id: CourseId,
        instances: Vec<InstanceId>,
        planned: usize,
        apply: ApplyReport,
    ) -> Self {
        Self {
            course_id,
            instances,
            planned,
            change_count: apply.applied,
            actions: apply.actions,
            skipped: apply.skipped,
            failures: apply.failures,
        }
    }
}

/// A course that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseError {
    pub course_id: CourseId,
    pub message: String,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    /// Every selected course was visited
    Completed,
    /// The sync is switched off; nothing was read or written
    Disabled,
    /// Stopped at a course boundary; completed courses stay applied
    Interrupted,
}

/// Result of a sync run over one or more courses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub outcome: SyncOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub courses: Vec<CourseReport>,
    pub errors: Vec<CourseError>,
}

impl SyncReport {
    /// Start a new run report
    pub fn start(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            dry_run,
            outcome: SyncOutcome::Completed,
            started_at: Utc::now(),
            finished_at: None,
            courses: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Stamp the finish time
    pub fn finish(mut self, outcome: SyncOutcome) -> Self {
        self.outcome = outcome;
        self.finished_at = Some(Utc::now());
        self
    }

    /// Total changes across all courses
    pub fn change_count(&self) -> usize {
        self.courses.iter().map(|c| c.change_count).sum()
    }

    /// Commands that failed across all courses
    pub fn failure_count(&self) -> usize {
        self.courses.iter().map(|c| c.failures.len()).sum()
    }

    /// No course errors and no failed commands
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.failure_count() == 0
    }
}

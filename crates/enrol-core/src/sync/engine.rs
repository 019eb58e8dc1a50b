//! SyncEngine implementation
//!
//! The SyncEngine drives courses through load → reconcile → apply, one course
//! at a time. Every failure is contained at the smallest scope that allows
//! the run to keep going: a command, a user, or a course.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::SyncConfig;
use crate::directory::{ExternalSource, TargetReader, TargetWriter, UserProvisioner};
use crate::ids::CourseId;
use crate::loader::StateLoader;
use crate::model::{EnrolInstance, EnrolMethod};
use crate::reconcile::Reconciler;
use crate::{Error, Result};

use super::apply::Applier;
use super::report::{CourseError, CourseReport, SyncOutcome, SyncReport};

/// Cooperative stop flag, checked between courses
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running sync to stop at the next course boundary
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for sync operations
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// If true, report what would change without calling the writer.
    /// Actions will be prefixed with "[dry-run] Would ..."
    pub dry_run: bool,
    /// Stop flag for long runs
    pub interrupt: Option<Interrupt>,
}

impl SyncOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            interrupt: None,
        }
    }

    fn interrupted(&self) -> bool {
        self.interrupt.as_ref().is_some_and(Interrupt::is_triggered)
    }
}

/// Engine for synchronizing Connect enrolments into the target system
pub struct SyncEngine<'a> {
    config: &'a SyncConfig,
    source: &'a dyn ExternalSource,
    reader: &'a dyn TargetReader,
    writer: &'a dyn TargetWriter,
    provisioner: &'a dyn UserProvisioner,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        config: &'a SyncConfig,
        source: &'a dyn ExternalSource,
        reader: &'a dyn TargetReader,
        writer: &'a dyn TargetWriter,
        provisioner: &'a dyn UserProvisioner,
    ) -> Self {
        Self {
            config,
            source,
            reader,
            writer,
            provisioner,
        }
    }

    /// Sync a single course
    ///
    /// # Errors
    ///
    /// - [`Error::PluginDisabled`] when the sync is switched off
    /// - [`Error::CourseNotFound`] when the course does not exist
    /// - [`Error::InvalidInstance`] when an enabled instance fails validation
    /// - any read error from the collaborators
    ///
    /// A course without enabled instances is not an error; it yields an
    /// empty report.
    pub fn sync_course(&self, course_id: CourseId, options: &SyncOptions) -> Result<CourseReport> {
        if !self.config.is_enabled() {
            return Err(Error::PluginDisabled);
        }

        let instances: Vec<EnrolInstance> = self
            .reader
            .enrol_instances()?
            .into_iter()
            .filter(|i| i.course_id == course_id)
            .collect();

        self.run_course(course_id, &instances, options)
    }

    /// Sync every course that has an enabled instance
    ///
    /// Course failures are logged and recorded in the report; they never stop
    /// the run. A disabled sync returns a report with
    /// [`SyncOutcome::Disabled`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the instance list cannot be read.
    pub fn sync_all(&self, options: &SyncOptions) -> Result<SyncReport> {
        let mut report = SyncReport::start(options.dry_run);

        if !self.config.is_enabled() {
            tracing::info!("Connect enrolment sync is disabled, nothing to do");
            return Ok(report.finish(SyncOutcome::Disabled));
        }

        tracing::info!(run_id = %report.run_id, dry_run = options.dry_run, "Synchronizing Connect enrolments...");

        let mut by_course: BTreeMap<CourseId, Vec<EnrolInstance>> = BTreeMap::new();
        for instance in self.reader.enrol_instances()? {
            if instance.enabled {
                by_course
                    .entry(instance.course_id)
                    .or_default()
                    .push(instance);
            }
        }

        let mut outcome = SyncOutcome::Completed;
        for (course_id, instances) in by_course {
            if options.interrupted() {
                tracing::warn!(course_id = %course_id, "Interrupted, stopping before course");
                outcome = SyncOutcome::Interrupted;
                break;
            }

            match self.run_course(course_id, &instances, options) {
                Ok(course_report) => report.courses.push(course_report),
                Err(e) => {
                    tracing::error!(course_id = %course_id, error = %e, "Course sync failed, continuing");
                    report.errors.push(CourseError {
                        course_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        let report = report.finish(outcome);
        tracing::info!(
            run_id = %report.run_id,
            courses = report.courses.len(),
            errors = report.errors.len(),
            changes = report.change_count(),
            "...Connect enrolment updates finished"
        );
        Ok(report)
    }

    fn run_course(
        &self,
        course_id: CourseId,
        instances: &[EnrolInstance],
        options: &SyncOptions,
    ) -> Result<CourseReport> {
        let span = tracing::info_span!("course", course_id = %course_id);
        let _guard = span.enter();

        if !self.reader.course_exists(course_id)? {
            return Err(Error::CourseNotFound { course_id });
        }

        let active = select_instances(instances)?;
        if active.is_empty() {
            tracing::debug!("No enabled Connect instances, skipping");
            return Ok(CourseReport::empty(course_id));
        }

        let loader = StateLoader::new(self.source, self.reader, self.config);
        let info = loader.load(course_id, &active)?;
        tracing::debug!(
            current = info.current.len(),
            latest = info.latest.len(),
            "Loaded course state"
        );

        let plan = Reconciler::new().reconcile(&info);
        let planned = plan.commands.len();
        let applied =
            Applier::new(self.writer, self.provisioner).apply(&plan.commands, options.dry_run);

        tracing::info!(
            planned,
            changes = applied.change_count(),
            failures = applied.failures.len(),
            skipped = applied.skipped.len(),
            "Course synchronized"
        );

        Ok(CourseReport::from_apply(
            course_id,
            active.iter().map(|i| i.id).collect(),
            planned,
            applied,
        ))
    }
}

/// Enabled, valid instances of one course in ascending id order
///
/// Enabled instances must use the external method. When two share a Connect
/// course key, the lower id wins and the other is ignored.
fn select_instances(instances: &[EnrolInstance]) -> Result<Vec<EnrolInstance>> {
    let mut enabled: Vec<&EnrolInstance> = instances.iter().filter(|i| i.enabled).collect();
    enabled.sort_by_key(|i| i.id);

    let mut seen_keys = BTreeSet::new();
    let mut selected = Vec::new();
    for instance in enabled {
        if instance.method != EnrolMethod::External {
            return Err(Error::InvalidInstance {
                instance_id: instance.id,
                reason: format!("expected an external enrol instance, found {}", instance.method),
            });
        }

        if !seen_keys.insert(instance.course_key) {
            tracing::warn!(
                instance_id = %instance.id,
                course_key = %instance.course_key,
                "Duplicate Connect instance for course key, ignoring"
            );
            continue;
        }

        selected.push(instance.clone());
    }

    Ok(selected)
}

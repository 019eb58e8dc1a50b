//! State loading
//!
//! Builds the two per-user indices the reconciler compares: the latest state
//! (Connect rows that pass the instance's status filter) and the current state
//! (enrolments and role assignments already in the target system).

use std::collections::{BTreeMap, BTreeSet};

use crate::config::SyncConfig;
use crate::directory::{CourseFilter, ExternalSource, TargetReader};
use crate::ids::{CourseId, InstanceId};
use crate::model::{
    Component, CourseInfo, CurrentState, DesiredState, EnrolInstance, EnrolMethod,
    MembershipRecord, Username,
};
use crate::Result;

/// Loads current and latest state for a course
pub struct StateLoader<'a> {
    source: &'a dyn ExternalSource,
    target: &'a dyn TargetReader,
    config: &'a SyncConfig,
}

impl<'a> StateLoader<'a> {
    pub fn new(
        source: &'a dyn ExternalSource,
        target: &'a dyn TargetReader,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    /// Load both sides of a course
    pub fn load(&self, course_id: CourseId, instances: &[EnrolInstance]) -> Result<CourseInfo> {
        Ok(CourseInfo {
            course_id,
            current: self.load_current(course_id, instances)?,
            latest: self.load_latest(course_id, instances)?,
        })
    }

    /// Desired memberships for a course, keyed by username
    ///
    /// Instances are visited in ascending id order and Connect rows in source
    /// order; when a user appears more than once, the last row wins.
    pub fn load_latest(
        &self,
        course_id: CourseId,
        instances: &[EnrolInstance],
    ) -> Result<BTreeMap<Username, DesiredState>> {
        let mut ordered = active(course_id, instances);
        ordered.sort_by_key(|i| i.id);

        let mut linked_rows: Option<Vec<MembershipRecord>> = None;
        let mut latest = BTreeMap::new();

        for instance in ordered {
            let allowed = self.config.allowed_statuses(&instance.allowed_statuses);
            tracing::debug!(
                course_id = %course_id,
                instance_id = %instance.id,
                course_key = %instance.course_key,
                allowed = %allowed,
                "Loading Connect enrolments"
            );

            let keyed;
            let rows: &[MembershipRecord] = if instance.course_key.is_default() {
                if linked_rows.is_none() {
                    let rows = self
                        .source
                        .memberships(CourseFilter::All)?
                        .into_iter()
                        .filter(|row| row.linked_course == Some(course_id))
                        .collect();
                    linked_rows = Some(rows);
                }
                linked_rows.as_deref().unwrap_or_default()
            } else {
                keyed = self
                    .source
                    .memberships(CourseFilter::Key(instance.course_key))?;
                &keyed
            };

            for row in rows {
                if row.username.is_empty() {
                    tracing::warn!(
                        external_user_id = %row.external_user_id,
                        "Skipping Connect row without a username"
                    );
                    continue;
                }

                if !allowed.is_allowed(&row.status_code) {
                    tracing::debug!(
                        username = %row.username,
                        status = %row.status_code,
                        "Status not allowed, dropping"
                    );
                    continue;
                }

                let Some(role_id) = self.config.role_for(&row.role_name) else {
                    tracing::warn!(
                        username = %row.username,
                        role = %row.role_name,
                        "No target role mapped for Connect role, dropping"
                    );
                    continue;
                };

                let target_user_id = self.target.find_user(&row.username)?;
                let desired = DesiredState {
                    external_user_id: row.external_user_id,
                    target_user_id,
                    instance_id: instance.id,
                    role_id,
                };

                if let Some(previous) = latest.insert(row.username.clone(), desired) {
                    tracing::debug!(
                        username = %row.username,
                        replaced_instance = %previous.instance_id,
                        replaced_role = %previous.role_id,
                        "Duplicate Connect enrolment, keeping the later row"
                    );
                }
            }
        }

        Ok(latest)
    }

    /// Existing memberships for a course, keyed by username
    ///
    /// Enrolment and role rows are merged; a user with only one kind of row
    /// still gets an entry. When a role is held under several owners it is
    /// recorded as sync-owned if any of them is the sync.
    ///
    /// External enrolments through instances outside `instances` (disabled
    /// or ignored ones) are frozen: they are left out, and so are the sync
    /// roles of users whose only external enrolments are frozen.
    pub fn load_current(
        &self,
        course_id: CourseId,
        instances: &[EnrolInstance],
    ) -> Result<BTreeMap<Username, CurrentState>> {
        let selected: BTreeSet<InstanceId> =
            active(course_id, instances).iter().map(|i| i.id).collect();
        let mut current: BTreeMap<Username, CurrentState> = BTreeMap::new();
        let mut frozen = BTreeSet::new();

        for row in self.target.enrolments(course_id)? {
            if row.method == EnrolMethod::External && !selected.contains(&row.instance_id) {
                tracing::debug!(
                    username = %row.username,
                    instance_id = %row.instance_id,
                    "Enrolment through an inactive instance, leaving it alone"
                );
                frozen.insert(row.username);
                continue;
            }
            current
                .entry(row.username)
                .or_insert_with(|| CurrentState::new(row.user_id))
                .enrols
                .insert(row.instance_id, row.method);
        }

        for row in self.target.role_assignments(course_id)? {
            let sync = row.component.is_sync();
            current
                .entry(row.username)
                .or_insert_with(|| CurrentState::new(row.user_id))
                .roles
                .entry(row.role_id)
                .and_modify(|owner| {
                    if sync {
                        *owner = Component::Sync;
                    }
                })
                .or_insert(row.component);
        }

        for username in &frozen {
            if let Some(state) = current.get_mut(username) {
                if state.external_instances().next().is_none() {
                    state.roles.retain(|_, owner| !owner.is_sync());
                }
            }
        }
        current.retain(|_, state| !state.enrols.is_empty() || !state.roles.is_empty());

        Ok(current)
    }
}

/// Enabled instances of `course_id`
fn active(course_id: CourseId, instances: &[EnrolInstance]) -> Vec<&EnrolInstance> {
    instances
        .iter()
        .filter(|i| i.enabled && i.course_id == course_id)
        .collect()
}

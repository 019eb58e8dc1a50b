//! JSON snapshot backend
//!
//! [`SnapshotStore`] holds both Connect and the target system in memory and
//! implements every collaborator trait over them. It applies the target
//! system's own mutation rules:
//!
//! - enrolling through an instance also assigns the role, owned by the sync,
//!   unless the user already holds that role
//! - unenrolling drops the sync-owned roles once the user has no external
//!   enrolment left in the course
//! - repeated writes are no-ops

mod snapshot;

pub use snapshot::{
    CourseEntry, EnrolmentEntry, ExternalUserEntry, RoleEntry, Snapshot, UserEntry,
};

use std::cell::{Ref, RefCell};
use std::path::Path;

use crate::directory::{CourseFilter, ExternalSource, TargetReader, TargetWriter, UserProvisioner};
use crate::ids::{CourseId, ExternalUserId, InstanceId, RoleId, UserId};
use crate::model::{
    Component, EnrolInstance, EnrolMethod, EnrolmentRecord, MembershipRecord, RoleRecord, Username,
};
use crate::{Error, Result};

/// In-memory target system and Connect directory backed by a [`Snapshot`]
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshot: RefCell<Snapshot>,
}

impl SnapshotStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: RefCell::new(snapshot),
        }
    }

    /// Read a snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(Snapshot::load(path)?))
    }

    /// Write the current state back to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        self.snapshot.borrow().save(path)
    }

    pub fn snapshot(&self) -> Ref<'_, Snapshot> {
        self.snapshot.borrow()
    }

    pub fn into_snapshot(self) -> Snapshot {
        self.snapshot.into_inner()
    }

    fn username_of(snapshot: &Snapshot, user_id: UserId) -> Option<Username> {
        snapshot.user(user_id).map(|u| u.username.clone())
    }

    fn require_instance(snapshot: &Snapshot, instance_id: InstanceId) -> Result<EnrolInstance> {
        snapshot
            .instance(instance_id)
            .cloned()
            .ok_or(Error::UnknownInstance { instance_id })
    }

    fn require_user(snapshot: &Snapshot, user_id: UserId) -> Result<()> {
        snapshot
            .user(user_id)
            .map(|_| ())
            .ok_or(Error::UnknownUser { user_id })
    }
}

impl ExternalSource for SnapshotStore {
    fn memberships(&self, filter: CourseFilter) -> Result<Vec<MembershipRecord>> {
        Ok(self
            .snapshot
            .borrow()
            .memberships
            .iter()
            .filter(|m| filter.matches(m.course_key))
            .cloned()
            .collect())
    }
}

impl TargetReader for SnapshotStore {
    fn course_exists(&self, course_id: CourseId) -> Result<bool> {
        Ok(self.snapshot.borrow().courses.iter().any(|c| c.id == course_id))
    }

    fn enrol_instances(&self) -> Result<Vec<EnrolInstance>> {
        Ok(self.snapshot.borrow().instances.clone())
    }

    fn enrolments(&self, course_id: CourseId) -> Result<Vec<EnrolmentRecord>> {
        let snapshot = self.snapshot.borrow();
        let mut rows = Vec::new();

        for entry in snapshot.enrolments.iter().filter(|e| e.course_id == course_id) {
            let Some(username) = Self::username_of(&snapshot, entry.user_id) else {
                tracing::warn!(user_id = %entry.user_id, "Enrolment references a missing user");
                continue;
            };
            rows.push(EnrolmentRecord {
                course_id,
                user_id: entry.user_id,
                username,
                instance_id: entry.instance_id,
                method: entry.method,
            });
        }

        Ok(rows)
    }

    fn role_assignments(&self, course_id: CourseId) -> Result<Vec<RoleRecord>> {
        let snapshot = self.snapshot.borrow();
        let mut rows = Vec::new();

        for entry in snapshot
            .role_assignments
            .iter()
            .filter(|r| r.course_id == course_id)
        {
            let Some(username) = Self::username_of(&snapshot, entry.user_id) else {
                tracing::warn!(user_id = %entry.user_id, "Role assignment references a missing user");
                continue;
            };
            rows.push(RoleRecord {
                course_id,
                user_id: entry.user_id,
                username,
                role_id: entry.role_id,
                component: entry.component.clone(),
            });
        }

        Ok(rows)
    }

    fn find_user(&self, username: &Username) -> Result<Option<UserId>> {
        Ok(self
            .snapshot
            .borrow()
            .users
            .iter()
            .find(|u| &u.username == username)
            .map(|u| u.id))
    }
}

impl TargetWriter for SnapshotStore {
    fn enrol_user(&self, instance_id: InstanceId, user_id: UserId, role_id: RoleId) -> Result<()> {
        let mut snapshot = self.snapshot.borrow_mut();
        let instance = Self::require_instance(&snapshot, instance_id)?;
        Self::require_user(&snapshot, user_id)?;
        let course_id = instance.course_id;

        let enrolled = snapshot
            .enrolments
            .iter()
            .any(|e| e.instance_id == instance_id && e.user_id == user_id);
        if !enrolled {
            snapshot.enrolments.push(EnrolmentEntry {
                course_id,
                instance_id,
                user_id,
                method: EnrolMethod::External,
            });
        }

        let has_role = snapshot
            .role_assignments
            .iter()
            .any(|r| r.course_id == course_id && r.user_id == user_id && r.role_id == role_id);
        if !has_role {
            snapshot.role_assignments.push(RoleEntry {
                course_id,
                user_id,
                role_id,
                component: Component::Sync,
            });
        }

        Ok(())
    }

    fn unenrol_user(&self, instance_id: InstanceId, user_id: UserId) -> Result<()> {
        let mut snapshot = self.snapshot.borrow_mut();
        let course_id = Self::require_instance(&snapshot, instance_id)?.course_id;

        snapshot
            .enrolments
            .retain(|e| !(e.instance_id == instance_id && e.user_id == user_id));

        if !snapshot.has_external_enrolment(course_id, user_id) {
            snapshot.role_assignments.retain(|r| {
                !(r.course_id == course_id && r.user_id == user_id && r.component.is_sync())
            });
        }

        Ok(())
    }

    fn assign_role(
        &self,
        role_id: RoleId,
        user_id: UserId,
        course_id: CourseId,
        component: &Component,
    ) -> Result<()> {
        let mut snapshot = self.snapshot.borrow_mut();
        Self::require_user(&snapshot, user_id)?;
        if !snapshot.courses.iter().any(|c| c.id == course_id) {
            return Err(Error::CourseNotFound { course_id });
        }

        let held = snapshot
            .role_assignments
            .iter()
            .any(|r| r.course_id == course_id && r.user_id == user_id && r.role_id == role_id);
        if !held {
            snapshot.role_assignments.push(RoleEntry {
                course_id,
                user_id,
                role_id,
                component: component.clone(),
            });
        }

        Ok(())
    }

    fn unassign_role(
        &self,
        role_id: RoleId,
        user_id: UserId,
        course_id: CourseId,
        component: &Component,
    ) -> Result<()> {
        self.snapshot.borrow_mut().role_assignments.retain(|r| {
            !(r.course_id == course_id
                && r.user_id == user_id
                && r.role_id == role_id
                && &r.component == component)
        });
        Ok(())
    }
}

impl UserProvisioner for SnapshotStore {
    fn ensure_user_exists(&self, external_user_id: ExternalUserId) -> Result<UserId> {
        let mut snapshot = self.snapshot.borrow_mut();

        let username = snapshot
            .external_users
            .iter()
            .find(|u| u.external_user_id == external_user_id)
            .map(|u| u.username.clone())
            .ok_or_else(|| Error::Provisioning {
                external_user_id,
                reason: "not found in the Connect user directory".to_string(),
            })?;

        if username.is_empty() {
            return Err(Error::Provisioning {
                external_user_id,
                reason: "Connect user has no username".to_string(),
            });
        }

        if let Some(existing) = snapshot.users.iter().find(|u| u.username == username) {
            return Ok(existing.id);
        }

        let id = snapshot.next_user_id();
        tracing::info!(user_id = %id, username = %username, "Created user from Connect");
        snapshot.users.push(UserEntry { id, username });
        Ok(id)
    }
}

//! Collaborator interfaces
//!
//! The core never talks to a database directly. Connect rows arrive through an
//! [`ExternalSource`], target rows through a [`TargetReader`], mutations leave
//! through a [`TargetWriter`], and missing accounts are created by a
//! [`UserProvisioner`].
//!
//! All methods take `&self`: one backend commonly implements every trait and
//! is shared by the loader, reconciler and applier within a single run.

use crate::ids::{CourseId, CourseKey, ExternalUserId, InstanceId, RoleId, UserId};
use crate::model::{Component, EnrolInstance, EnrolmentRecord, MembershipRecord, RoleRecord, Username};
use crate::Result;

/// Which Connect courses to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseFilter {
    /// One Connect course
    Key(CourseKey),
    /// Every Connect course
    All,
}

impl CourseFilter {
    pub fn matches(&self, key: CourseKey) -> bool {
        match self {
            CourseFilter::Key(wanted) => *wanted == key,
            CourseFilter::All => true,
        }
    }
}

/// Read access to Connect enrolments
pub trait ExternalSource {
    /// Rows for the selected courses, in a stable order
    fn memberships(&self, filter: CourseFilter) -> Result<Vec<MembershipRecord>>;
}

/// Read access to the target system
pub trait TargetReader {
    fn course_exists(&self, course_id: CourseId) -> Result<bool>;

    /// Every configured Connect enrol instance, enabled or not
    fn enrol_instances(&self) -> Result<Vec<EnrolInstance>>;

    /// Manual and external enrolments on a course
    fn enrolments(&self, course_id: CourseId) -> Result<Vec<EnrolmentRecord>>;

    /// Role assignments in a course context
    fn role_assignments(&self, course_id: CourseId) -> Result<Vec<RoleRecord>>;

    fn find_user(&self, username: &Username) -> Result<Option<UserId>>;
}

/// Mutation API of the target system
///
/// Implementations must tolerate repeated calls: enrolling an enrolled user or
/// unassigning a missing role is a no-op.
pub trait TargetWriter {
    /// Enrol a user through an instance, assigning `role_id` as a sync role
    fn enrol_user(&self, instance_id: InstanceId, user_id: UserId, role_id: RoleId) -> Result<()>;

    fn unenrol_user(&self, instance_id: InstanceId, user_id: UserId) -> Result<()>;

    fn assign_role(
        &self,
        role_id: RoleId,
        user_id: UserId,
        course_id: CourseId,
        component: &Component,
    ) -> Result<()>;

    fn unassign_role(
        &self,
        role_id: RoleId,
        user_id: UserId,
        course_id: CourseId,
        component: &Component,
    ) -> Result<()>;
}

/// Creates target accounts for Connect users on demand
pub trait UserProvisioner {
    fn ensure_user_exists(&self, external_user_id: ExternalUserId) -> Result<UserId>;
}

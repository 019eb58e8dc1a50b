//! Record types shared by the loader, reconciler and collaborators
//!
//! Rows coming out of Connect and the target system are fixed-field value
//! types. Indices built from them use ordered maps so that iteration order,
//! and therefore command order, is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::ids::{CourseId, CourseKey, ExternalUserId, InstanceId, RoleId, UserId};

/// Case-insensitive username, the join key between Connect and the target
///
/// The stored form is trimmed and lower-cased, so `Alice ` and `alice`
/// compare (and sort) equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Username {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for Username {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<Username> for String {
    fn from(name: Username) -> Self {
        name.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a user came to be enrolled on a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrolMethod {
    /// Added by hand; never removed by the sync
    Manual,
    /// Owned by the Connect sync
    #[serde(alias = "connect")]
    External,
}

impl fmt::Display for EnrolMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrolMethod::Manual => f.write_str("manual"),
            EnrolMethod::External => f.write_str("external"),
        }
    }
}

/// Owner of a role assignment
///
/// Only assignments owned by [`Component::Sync`] may be removed by the sync.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Component {
    Sync,
    Manual,
    Other(String),
}

impl Component {
    pub fn is_sync(&self) -> bool {
        matches!(self, Component::Sync)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Component::Sync => "sync",
            Component::Manual => "manual",
            Component::Other(name) => name,
        }
    }
}

impl From<String> for Component {
    fn from(raw: String) -> Self {
        match raw.trim() {
            "sync" | "enrol_connect" => Component::Sync,
            "" | "manual" => Component::Manual,
            other => Component::Other(other.to_string()),
        }
    }
}

impl From<&str> for Component {
    fn from(raw: &str) -> Self {
        Component::from(raw.to_string())
    }
}

impl From<Component> for String {
    fn from(component: Component) -> Self {
        component.as_str().to_string()
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One enrolment row as Connect reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    /// Connect course the row belongs to
    pub course_key: CourseKey,
    /// Target course the Connect course is attached to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_course: Option<CourseId>,
    pub external_user_id: ExternalUserId,
    pub username: Username,
    /// Student status code (`R`, `P`, ...)
    #[serde(default)]
    pub status_code: String,
    /// Connect role name, e.g. `sds_student`
    pub role_name: String,
}

/// One user enrolment row in the target system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolmentRecord {
    pub course_id: CourseId,
    pub user_id: UserId,
    pub username: Username,
    pub instance_id: InstanceId,
    pub method: EnrolMethod,
}

/// One role assignment row in the target system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub course_id: CourseId,
    pub user_id: UserId,
    pub username: Username,
    pub role_id: RoleId,
    pub component: Component,
}

/// A configured sync target on one course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolInstance {
    pub id: InstanceId,
    pub course_id: CourseId,
    #[serde(default = "default_instance_method")]
    pub method: EnrolMethod,
    /// Connect course this instance pulls from; 0 selects every linked course
    #[serde(default = "default_course_key")]
    pub course_key: CourseKey,
    /// `*`, a comma-separated list of status codes, or empty for the default
    #[serde(default)]
    pub allowed_statuses: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_instance_method() -> EnrolMethod {
    EnrolMethod::External
}

fn default_course_key() -> CourseKey {
    CourseKey::DEFAULT
}

fn default_enabled() -> bool {
    true
}

/// What Connect says a user's membership of a course should be
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    pub external_user_id: ExternalUserId,
    /// `None` until the user has been provisioned in the target system
    pub target_user_id: Option<UserId>,
    pub instance_id: InstanceId,
    pub role_id: RoleId,
}

/// What the target system currently holds for a user on a course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentState {
    pub user_id: UserId,
    #[serde(default)]
    pub enrols: BTreeMap<InstanceId, EnrolMethod>,
    #[serde(default)]
    pub roles: BTreeMap<RoleId, Component>,
}

impl CurrentState {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            enrols: BTreeMap::new(),
            roles: BTreeMap::new(),
        }
    }

    /// Instances holding an enrolment owned by the sync
    pub fn external_instances(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.enrols
            .iter()
            .filter(|(_, method)| **method == EnrolMethod::External)
            .map(|(id, _)| *id)
    }

    /// Roles whose assignment is owned by the sync
    pub fn sync_roles(&self) -> impl Iterator<Item = RoleId> + '_ {
        self.roles
            .iter()
            .filter(|(_, component)| component.is_sync())
            .map(|(id, _)| *id)
    }
}

/// Current and latest state for one course, built and consumed per pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseInfo {
    pub course_id: CourseId,
    pub current: BTreeMap<Username, CurrentState>,
    pub latest: BTreeMap<Username, DesiredState>,
}

impl CourseInfo {
    pub fn new(course_id: CourseId) -> Self {
        Self {
            course_id,
            current: BTreeMap::new(),
            latest: BTreeMap::new(),
        }
    }
}

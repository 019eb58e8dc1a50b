//! On-disk snapshot document

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::Path;

use crate::ids::{CourseId, ExternalUserId, InstanceId, RoleId, UserId};
use crate::model::{Component, EnrolInstance, EnrolMethod, MembershipRecord, Username};
use crate::Result;

/// A course in the target system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseEntry {
    pub id: CourseId,
    #[serde(default)]
    pub shortname: String,
}

/// A user account in the target system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub id: UserId,
    pub username: Username,
}

/// A user known to Connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalUserEntry {
    pub external_user_id: ExternalUserId,
    pub username: Username,
}

/// A user enrolment through one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolmentEntry {
    pub course_id: CourseId,
    pub instance_id: InstanceId,
    pub user_id: UserId,
    pub method: EnrolMethod,
}

/// A role assignment in a course context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub course_id: CourseId,
    pub user_id: UserId,
    pub role_id: RoleId,
    #[serde(default = "default_component")]
    pub component: Component,
}

fn default_component() -> Component {
    Component::Manual
}

/// Both sides of a sync in one JSON document
///
/// `instances` lists the Connect enrol instances. Manual enrolments reference
/// instances of their own that need not appear there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub courses: Vec<CourseEntry>,
    #[serde(default)]
    pub instances: Vec<EnrolInstance>,
    #[serde(default)]
    pub external_users: Vec<ExternalUserEntry>,
    #[serde(default)]
    pub memberships: Vec<MembershipRecord>,
    #[serde(default)]
    pub users: Vec<UserEntry>,
    #[serde(default)]
    pub enrolments: Vec<EnrolmentEntry>,
    #[serde(default)]
    pub role_assignments: Vec<RoleEntry>,
}

impl Snapshot {
    /// Load a snapshot from a JSON file with shared lock
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, locked, or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        file.lock_shared()?;

        let mut content = String::new();
        (&file).read_to_string(&mut content)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the snapshot atomically with exclusive lock
    ///
    /// Writes to a temporary sibling and renames it over `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or locked.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        lock_file.lock_exclusive()?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    pub fn user(&self, user_id: UserId) -> Option<&UserEntry> {
        self.users.iter().find(|u| u.id == user_id)
    }

    pub fn instance(&self, instance_id: InstanceId) -> Option<&EnrolInstance> {
        self.instances.iter().find(|i| i.id == instance_id)
    }

    /// Whether the user still holds a sync-owned enrolment in the course
    pub fn has_external_enrolment(&self, course_id: CourseId, user_id: UserId) -> bool {
        self.enrolments.iter().any(|e| {
            e.course_id == course_id && e.user_id == user_id && e.method == EnrolMethod::External
        })
    }

    pub(crate) fn next_user_id(&self) -> UserId {
        UserId(self.users.iter().map(|u| u.id.get()).max().unwrap_or(0) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_sections_default_to_empty() {
        let snapshot: Snapshot = serde_json::from_str(r#"{"courses": [{"id": 3}]}"#).unwrap();
        assert_eq!(snapshot.courses[0].id, CourseId(3));
        assert!(snapshot.instances.is_empty());
        assert!(snapshot.users.is_empty());
    }

    #[test]
    fn save_replaces_file_and_leaves_no_temp() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("snapshot.json");

        let mut snapshot = Snapshot::default();
        snapshot.users.push(UserEntry {
            id: UserId(1),
            username: Username::new("alice"),
        });
        snapshot.save(&path).unwrap();

        snapshot.users.push(UserEntry {
            id: UserId(2),
            username: Username::new("bob"),
        });
        snapshot.save(&path).unwrap();

        let loaded = Snapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn next_user_id_follows_highest() {
        let mut snapshot = Snapshot::default();
        assert_eq!(snapshot.next_user_id(), UserId(1));

        snapshot.users.push(UserEntry {
            id: UserId(41),
            username: Username::new("alice"),
        });
        assert_eq!(snapshot.next_user_id(), UserId(42));
    }
}

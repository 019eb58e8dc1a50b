//! [`SnapshotFixture`] builder for sync test scenarios.

use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File name the fixture writes the snapshot to.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// File name the fixture writes the configuration to.
pub const CONFIG_FILE: &str = "enrol-sync.toml";

/// A temporary directory holding a snapshot document under construction.
///
/// # Example
///
/// ```rust
/// use enrol_test_utils::SnapshotFixture;
///
/// let mut fixture = SnapshotFixture::new();
/// fixture
///     .course(1)
///     .instance(7, 1, 100, "")
///     .user(10, "alice")
///     .membership(100, None, 900, "alice", "R", "sds_student");
/// let path = fixture.write();
/// assert!(path.exists());
/// ```
pub struct SnapshotFixture {
    temp_dir: TempDir,
    courses: Vec<Value>,
    instances: Vec<Value>,
    external_users: Vec<Value>,
    memberships: Vec<Value>,
    users: Vec<Value>,
    enrolments: Vec<Value>,
    role_assignments: Vec<Value>,
}

impl Default for SnapshotFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotFixture {
    /// Create an empty fixture in a fresh temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
            courses: Vec::new(),
            instances: Vec::new(),
            external_users: Vec::new(),
            memberships: Vec::new(),
            users: Vec::new(),
            enrolments: Vec::new(),
            role_assignments: Vec::new(),
        }
    }

    /// The canonical single-course scenario.
    ///
    /// Course 1 has one Connect instance (7, course key 100, default
    /// statuses). A sync is expected to produce exactly five changes, in this
    /// order:
    ///
    /// 1. enrol `carol` (provisioned from external user 902)
    /// 2. unenrol `dave`, who left Connect
    /// 3. unassign role 5 from `gina`, an orphaned sync role
    /// 4. assign role 4 to `bob`, promoted to teacher
    /// 5. unassign role 5 from `bob`
    ///
    /// `alice` is already correct, `erin` is manually enrolled and is kept,
    /// and `frank` is dropped by his deletion status.
    pub fn canonical() -> Self {
        let mut fixture = Self::new();
        fixture
            .course(1)
            .instance(7, 1, 100, "")
            .user(10, "alice")
            .user(11, "bob")
            .user(13, "dave")
            .user(14, "erin")
            .user(15, "gina")
            .external_user(900, "alice")
            .external_user(901, "bob")
            .external_user(902, "carol")
            .external_user(903, "dave")
            .external_user(905, "frank")
            .membership(100, Some(1), 900, "alice", "R", "sds_student")
            .membership(100, Some(1), 901, "bob", "R", "sds_teacher")
            .membership(100, Some(1), 902, "carol", "P", "sds_student")
            .membership(100, Some(1), 905, "frank", "D", "sds_student")
            .enrolment(1, 7, 10, "external")
            .role(1, 10, 5, "sync")
            .enrolment(1, 7, 11, "external")
            .role(1, 11, 5, "sync")
            .enrolment(1, 7, 13, "external")
            .role(1, 13, 5, "sync")
            .enrolment(1, 2, 14, "manual")
            .role(1, 14, 5, "manual")
            .role(1, 15, 5, "sync");
        fixture
    }

    /// Return the root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path the snapshot is written to.
    pub fn snapshot_path(&self) -> PathBuf {
        self.root().join(SNAPSHOT_FILE)
    }

    /// Path the configuration is written to.
    pub fn config_path(&self) -> PathBuf {
        self.root().join(CONFIG_FILE)
    }

    pub fn course(&mut self, id: u64) -> &mut Self {
        self.courses
            .push(json!({ "id": id, "shortname": format!("C{id}") }));
        self
    }

    /// Add an enabled Connect instance.
    pub fn instance(&mut self, id: u64, course: u64, key: u64, statuses: &str) -> &mut Self {
        self.instances.push(json!({
            "id": id,
            "course_id": course,
            "method": "external",
            "course_key": key,
            "allowed_statuses": statuses,
            "enabled": true,
        }));
        self
    }

    /// Add an instance from raw JSON, for disabled or malformed cases.
    pub fn raw_instance(&mut self, instance: Value) -> &mut Self {
        self.instances.push(instance);
        self
    }

    pub fn external_user(&mut self, id: u64, username: &str) -> &mut Self {
        self.external_users
            .push(json!({ "external_user_id": id, "username": username }));
        self
    }

    pub fn membership(
        &mut self,
        key: u64,
        linked_course: Option<u64>,
        external_user: u64,
        username: &str,
        status: &str,
        role: &str,
    ) -> &mut Self {
        let mut row = json!({
            "course_key": key,
            "external_user_id": external_user,
            "username": username,
            "status_code": status,
            "role_name": role,
        });
        if let Some(course) = linked_course {
            row["linked_course"] = json!(course);
        }
        self.memberships.push(row);
        self
    }

    pub fn user(&mut self, id: u64, username: &str) -> &mut Self {
        self.users.push(json!({ "id": id, "username": username }));
        self
    }

    pub fn enrolment(&mut self, course: u64, instance: u64, user: u64, method: &str) -> &mut Self {
        self.enrolments.push(json!({
            "course_id": course,
            "instance_id": instance,
            "user_id": user,
            "method": method,
        }));
        self
    }

    pub fn role(&mut self, course: u64, user: u64, role: u64, component: &str) -> &mut Self {
        self.role_assignments.push(json!({
            "course_id": course,
            "user_id": user,
            "role_id": role,
            "component": component,
        }));
        self
    }

    /// The snapshot document as currently built.
    pub fn document(&self) -> Value {
        json!({
            "courses": self.courses,
            "instances": self.instances,
            "external_users": self.external_users,
            "memberships": self.memberships,
            "users": self.users,
            "enrolments": self.enrolments,
            "role_assignments": self.role_assignments,
        })
    }

    /// Write the snapshot file and return its path.
    pub fn write(&self) -> PathBuf {
        let path = self.snapshot_path();
        let content = serde_json::to_string_pretty(&self.document()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    /// Write `content` as the configuration file and return its path.
    pub fn write_config(&self, content: &str) -> PathBuf {
        let path = self.config_path();
        fs::write(&path, content).unwrap();
        path
    }

    /// Read the snapshot file back as raw JSON.
    ///
    /// # Panics
    /// Panics if the file is missing or not valid JSON.
    pub fn read_snapshot(&self) -> Value {
        let path = self.snapshot_path();
        let content = fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("Could not read snapshot: {}", path.display()));
        serde_json::from_str(&content).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_produces_every_section() {
        let fixture = SnapshotFixture::canonical();
        fixture.write();

        let doc = fixture.read_snapshot();
        for key in [
            "courses",
            "instances",
            "external_users",
            "memberships",
            "users",
            "enrolments",
            "role_assignments",
        ] {
            assert!(doc[key].is_array(), "missing section {key}");
        }
        assert_eq!(doc["memberships"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn membership_without_link_omits_field() {
        let mut fixture = SnapshotFixture::new();
        fixture.membership(5, None, 1, "alice", "R", "sds_student");

        let doc = fixture.document();
        assert!(doc["memberships"][0].get("linked_course").is_none());
    }
}

//! Command execution
//!
//! Commands run one at a time against the [`TargetWriter`]. There is no batch
//! transaction: a failed command is recorded and the rest still run.
//!
//! An enrol for a user the target system does not know yet first goes through
//! the [`UserProvisioner`]. If that fails the user is skipped rather than
//! counted as a failed command. Dry runs never provision.

use serde::{Deserialize, Serialize};

use crate::directory::{TargetWriter, UserProvisioner};
use crate::ids::{ExternalUserId, UserId};
use crate::model::Username;
use crate::reconcile::Command;
use crate::{Error, Result};

/// A desired user that could not be added this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedUser {
    pub username: Username,
    pub external_user_id: ExternalUserId,
    pub reason: String,
}

/// A command that the target system rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFailure {
    pub command: Command,
    pub error: String,
}

/// Outcome of applying a command list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Commands applied (or that would be applied in dry-run)
    pub applied: usize,
    /// Human-readable description of each applied command
    pub actions: Vec<String>,
    pub failures: Vec<CommandFailure>,
    /// Users whose account could not be provisioned
    pub skipped: Vec<SkippedUser>,
}

impl ApplyReport {
    pub fn change_count(&self) -> usize {
        self.applied
    }
}

/// Executes reconciler output against the target system
pub struct Applier<'a> {
    writer: &'a dyn TargetWriter,
    provisioner: &'a dyn UserProvisioner,
}

impl<'a> Applier<'a> {
    pub fn new(writer: &'a dyn TargetWriter, provisioner: &'a dyn UserProvisioner) -> Self {
        Self {
            writer,
            provisioner,
        }
    }

    /// Apply `commands` in order
    ///
    /// With `dry_run` set nothing reaches the writer or the provisioner; every
    /// command is counted as if it had succeeded.
    pub fn apply(&self, commands: &[Command], dry_run: bool) -> ApplyReport {
        let mut report = ApplyReport::default();

        for command in commands {
            if dry_run {
                tracing::info!(
                    course_id = %command.course(),
                    action = command.kind(),
                    "[dry-run] Would {}",
                    command
                );
                report.applied += 1;
                report.actions.push(format!("[dry-run] Would {}", command));
                continue;
            }

            match self.execute(command) {
                Ok(()) => {
                    tracing::info!(
                        course_id = %command.course(),
                        action = command.kind(),
                        "{}",
                        command
                    );
                    report.applied += 1;
                    report.actions.push(capitalize(&command.to_string()));
                }
                Err(Error::Provisioning {
                    external_user_id,
                    reason,
                }) if matches!(command, Command::Enrol { user: None, .. }) => {
                    tracing::warn!(
                        course_id = %command.course(),
                        username = %command.username(),
                        external_user_id = %external_user_id,
                        reason = %reason,
                        "Skipping user that could not be provisioned"
                    );
                    report.skipped.push(SkippedUser {
                        username: command.username().clone(),
                        external_user_id,
                        reason,
                    });
                }
                Err(e) => {
                    let e = Error::mutation(command.to_string(), e.to_string());
                    tracing::warn!(
                        course_id = %command.course(),
                        action = command.kind(),
                        error = %e,
                        "Command failed, continuing"
                    );
                    report.failures.push(CommandFailure {
                        command: command.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    fn execute(&self, command: &Command) -> Result<()> {
        match command {
            Command::Enrol {
                instance,
                user,
                external_user,
                username,
                role,
                ..
            } => {
                let user = self.resolve_user(*user, *external_user, username)?;
                self.writer.enrol_user(*instance, user, *role)
            }
            Command::Unenrol { instance, user, .. } => self.writer.unenrol_user(*instance, *user),
            Command::AssignRole {
                course,
                role,
                user,
                component,
                ..
            } => self.writer.assign_role(*role, *user, *course, component),
            Command::UnassignRole {
                course,
                role,
                user,
                component,
                ..
            } => self.writer.unassign_role(*role, *user, *course, component),
        }
    }

    fn resolve_user(
        &self,
        user: Option<UserId>,
        external_user: ExternalUserId,
        username: &Username,
    ) -> Result<UserId> {
        match user {
            Some(user) => Ok(user),
            None => {
                tracing::debug!(username = %username, "Provisioning Connect user");
                self.provisioner.ensure_user_exists(external_user)
            }
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{CourseId, InstanceId, RoleId};
    use crate::model::Component;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingWriter {
        calls: RefCell<Vec<String>>,
        fail_user: Option<UserId>,
        directory_offline: bool,
    }

    impl RecordingWriter {
        fn record(&self, call: String, user: UserId) -> Result<()> {
            if self.fail_user == Some(user) {
                return Err(Error::UnknownUser { user_id: user });
            }
            self.calls.borrow_mut().push(call);
            Ok(())
        }
    }

    impl TargetWriter for RecordingWriter {
        fn enrol_user(
            &self,
            instance_id: InstanceId,
            user_id: UserId,
            role_id: RoleId,
        ) -> Result<()> {
            self.record(format!("enrol {instance_id} {user_id} {role_id}"), user_id)
        }

        fn unenrol_user(&self, instance_id: InstanceId, user_id: UserId) -> Result<()> {
            self.record(format!("unenrol {instance_id} {user_id}"), user_id)
        }

        fn assign_role(
            &self,
            role_id: RoleId,
            user_id: UserId,
            course_id: CourseId,
            _component: &Component,
        ) -> Result<()> {
            self.record(format!("assign {role_id} {user_id} {course_id}"), user_id)
        }

        fn unassign_role(
            &self,
            role_id: RoleId,
            user_id: UserId,
            course_id: CourseId,
            _component: &Component,
        ) -> Result<()> {
            self.record(format!("unassign {role_id} {user_id} {course_id}"), user_id)
        }
    }

    impl UserProvisioner for RecordingWriter {
        fn ensure_user_exists(&self, external_user_id: ExternalUserId) -> Result<UserId> {
            if self.directory_offline {
                return Err(Error::Provisioning {
                    external_user_id,
                    reason: "directory offline".to_string(),
                });
            }
            self.calls.borrow_mut().push(format!("provision {external_user_id}"));
            Ok(UserId(external_user_id.get() + 1000))
        }
    }

    fn enrol(user: u64) -> Command {
        Command::Enrol {
            course: CourseId(1),
            instance: InstanceId(7),
            user: Some(UserId(user)),
            external_user: ExternalUserId(900 + user),
            username: Username::new(format!("user{user}")),
            role: RoleId(5),
        }
    }

    fn enrol_unprovisioned(external: u64) -> Command {
        Command::Enrol {
            course: CourseId(1),
            instance: InstanceId(7),
            user: None,
            external_user: ExternalUserId(external),
            username: Username::new(format!("new{external}")),
            role: RoleId(5),
        }
    }

    #[test]
    fn failed_command_does_not_stop_the_batch() {
        let writer = RecordingWriter {
            fail_user: Some(UserId(2)),
            ..Default::default()
        };
        let report =
            Applier::new(&writer, &writer).apply(&[enrol(1), enrol(2), enrol(3)], false);

        assert_eq!(report.change_count(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].command, enrol(2));
        assert_eq!(
            report.failures[0].error,
            "Failed to enrol user2 on course 1 via instance 7 as role 5: Unknown user: 2"
        );
        assert_eq!(*writer.calls.borrow(), vec!["enrol 7 1 5", "enrol 7 3 5"]);
    }

    #[test]
    fn live_actions_are_described() {
        let writer = RecordingWriter::default();
        let report = Applier::new(&writer, &writer).apply(&[enrol(1)], false);

        assert_eq!(
            report.actions,
            vec!["Enrol user1 on course 1 via instance 7 as role 5".to_string()]
        );
    }

    #[test]
    fn dry_run_touches_nothing() {
        let writer = RecordingWriter::default();
        let report =
            Applier::new(&writer, &writer).apply(&[enrol(1), enrol_unprovisioned(902)], true);

        assert_eq!(report.change_count(), 2);
        assert!(writer.calls.borrow().is_empty());
        assert!(report.actions[0].starts_with("[dry-run] Would enrol user1"));
        assert!(report.actions[1].starts_with("[dry-run] Would enrol new902"));
    }

    #[test]
    fn live_enrol_provisions_missing_user_first() {
        let writer = RecordingWriter::default();
        let report = Applier::new(&writer, &writer).apply(&[enrol_unprovisioned(902)], false);

        assert_eq!(report.change_count(), 1);
        assert_eq!(*writer.calls.borrow(), vec!["provision 902", "enrol 7 1902 5"]);
    }

    #[test]
    fn provisioning_failure_skips_only_that_user() {
        let writer = RecordingWriter {
            directory_offline: true,
            ..Default::default()
        };
        let report =
            Applier::new(&writer, &writer).apply(&[enrol_unprovisioned(902), enrol(1)], false);

        assert_eq!(report.change_count(), 1);
        assert!(report.failures.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].username, Username::new("new902"));
        assert_eq!(report.skipped[0].external_user_id, ExternalUserId(902));
        assert!(report.skipped[0].reason.contains("directory offline"));
        assert_eq!(*writer.calls.borrow(), vec!["enrol 7 1 5"]);
    }
}

//! Reconciliation of current against latest state
//!
//! The reconciler turns one [`CourseInfo`] into an ordered list of
//! [`Command`]s in three passes:
//!
//! 1. **additions**: desired users missing the desired enrolment are enrolled
//! 2. **removals**: users no longer desired lose their external enrolments
//! 3. **roles**: users on both sides get their sync-owned roles corrected
//!
//! Within each pass users are visited in ascending username order. Roles owned
//! by anything other than the sync are never touched.

mod command;

pub use command::Command;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{Component, CourseInfo, Username};

/// Output of a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePlan {
    pub commands: Vec<Command>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Computes the commands that bring a course to its latest state
///
/// Planning has no side effects. Users missing from the target system get an
/// [`Command::Enrol`] without a user id; the applier provisions them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler;

impl Reconciler {
    pub fn new() -> Self {
        Self
    }

    pub fn reconcile(&self, info: &CourseInfo) -> ReconcilePlan {
        let mut plan = ReconcilePlan::default();
        let mut enrolled = BTreeSet::new();

        Self::additions(info, &mut plan, &mut enrolled);
        Self::removals(info, &mut plan);
        Self::roles(info, &mut plan, &enrolled);

        tracing::debug!(
            course_id = %info.course_id,
            commands = plan.commands.len(),
            "Reconciled course"
        );
        plan
    }

    fn additions(info: &CourseInfo, plan: &mut ReconcilePlan, enrolled: &mut BTreeSet<Username>) {
        for (username, desired) in &info.latest {
            let current = info.current.get(username);
            if current.is_some_and(|c| c.enrols.contains_key(&desired.instance_id)) {
                continue;
            }

            enrolled.insert(username.clone());
            plan.commands.push(Command::Enrol {
                course: info.course_id,
                instance: desired.instance_id,
                user: current.map(|c| c.user_id).or(desired.target_user_id),
                external_user: desired.external_user_id,
                username: username.clone(),
                role: desired.role_id,
            });
        }
    }

    fn removals(info: &CourseInfo, plan: &mut ReconcilePlan) {
        for (username, current) in &info.current {
            if info.latest.contains_key(username) {
                continue;
            }

            let mut unenrolled = false;
            for instance in current.external_instances() {
                unenrolled = true;
                plan.commands.push(Command::Unenrol {
                    course: info.course_id,
                    instance,
                    user: current.user_id,
                    username: username.clone(),
                });
            }

            // Unenrolling takes the sync roles with it; only orphaned roles
            // need an explicit unassign.
            if !unenrolled {
                for role in current.sync_roles() {
                    plan.commands.push(Command::UnassignRole {
                        course: info.course_id,
                        role,
                        user: current.user_id,
                        username: username.clone(),
                        component: Component::Sync,
                    });
                }
            }
        }
    }

    fn roles(info: &CourseInfo, plan: &mut ReconcilePlan, enrolled: &BTreeSet<Username>) {
        for (username, desired) in &info.latest {
            let Some(current) = info.current.get(username) else {
                continue;
            };

            if !current.roles.contains_key(&desired.role_id) && !enrolled.contains(username) {
                plan.commands.push(Command::AssignRole {
                    course: info.course_id,
                    role: desired.role_id,
                    user: current.user_id,
                    username: username.clone(),
                    component: Component::Sync,
                });
            }

            for role in current.sync_roles().filter(|r| *r != desired.role_id) {
                plan.commands.push(Command::UnassignRole {
                    course: info.course_id,
                    role,
                    user: current.user_id,
                    username: username.clone(),
                    component: Component::Sync,
                });
            }

            for instance in current
                .external_instances()
                .filter(|i| *i != desired.instance_id)
            {
                plan.commands.push(Command::Unenrol {
                    course: info.course_id,
                    instance,
                    user: current.user_id,
                    username: username.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{CourseId, ExternalUserId, InstanceId, RoleId, UserId};
    use crate::model::{CurrentState, DesiredState, EnrolMethod};
    use pretty_assertions::assert_eq;

    fn desired(user: Option<u64>, instance: u64, role: u64) -> DesiredState {
        DesiredState {
            external_user_id: ExternalUserId(900),
            target_user_id: user.map(UserId),
            instance_id: InstanceId(instance),
            role_id: RoleId(role),
        }
    }

    #[test]
    fn manual_enrolment_is_kept_when_not_desired() {
        let mut info = CourseInfo::new(CourseId(1));
        let mut current = CurrentState::new(UserId(10));
        current.enrols.insert(InstanceId(2), EnrolMethod::Manual);
        current.roles.insert(RoleId(5), Component::Manual);
        info.current.insert(Username::new("alice"), current);

        let plan = Reconciler::new().reconcile(&info);
        assert!(plan.is_empty());
    }

    #[test]
    fn manually_enrolled_user_gets_external_enrolment_without_extra_assign() {
        let mut info = CourseInfo::new(CourseId(1));
        let mut current = CurrentState::new(UserId(10));
        current.enrols.insert(InstanceId(2), EnrolMethod::Manual);
        info.current.insert(Username::new("alice"), current);
        info.latest.insert(Username::new("alice"), desired(Some(10), 7, 5));

        let plan = Reconciler::new().reconcile(&info);

        assert_eq!(
            plan.commands,
            vec![Command::Enrol {
                course: CourseId(1),
                instance: InstanceId(7),
                user: Some(UserId(10)),
                external_user: ExternalUserId(900),
                username: Username::new("alice"),
                role: RoleId(5),
            }]
        );
    }

    #[test]
    fn unknown_user_is_planned_without_an_id() {
        let mut info = CourseInfo::new(CourseId(1));
        info.latest.insert(Username::new("alice"), desired(None, 7, 5));
        info.latest.insert(Username::new("bob"), desired(Some(11), 7, 5));

        let plan = Reconciler::new().reconcile(&info);

        let users: Vec<_> = plan
            .commands
            .iter()
            .map(|c| match c {
                Command::Enrol { user, .. } => *user,
                other => panic!("unexpected command: {other}"),
            })
            .collect();
        assert_eq!(users, vec![None, Some(UserId(11))]);
    }

    #[test]
    fn moving_between_instances_unenrols_the_old_one() {
        let mut info = CourseInfo::new(CourseId(1));
        let mut current = CurrentState::new(UserId(10));
        current.enrols.insert(InstanceId(3), EnrolMethod::External);
        current.roles.insert(RoleId(5), Component::Sync);
        info.current.insert(Username::new("alice"), current);
        info.latest.insert(Username::new("alice"), desired(Some(10), 7, 5));

        let plan = Reconciler::new().reconcile(&info);

        let kinds: Vec<_> = plan.commands.iter().map(Command::kind).collect();
        assert_eq!(kinds, vec!["enrol", "unenrol"]);
    }

    #[test]
    fn orphaned_sync_roles_are_unassigned() {
        let mut info = CourseInfo::new(CourseId(1));
        let mut current = CurrentState::new(UserId(10));
        current.roles.insert(RoleId(5), Component::Sync);
        current.roles.insert(RoleId(3), Component::Manual);
        info.current.insert(Username::new("alice"), current);

        let plan = Reconciler::new().reconcile(&info);

        assert_eq!(
            plan.commands,
            vec![Command::UnassignRole {
                course: CourseId(1),
                role: RoleId(5),
                user: UserId(10),
                username: Username::new("alice"),
                component: Component::Sync,
            }]
        );
    }
}

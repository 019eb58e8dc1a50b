//! Mutation commands emitted by the reconciler

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{CourseId, ExternalUserId, InstanceId, RoleId, UserId};
use crate::model::{Component, Username};

/// One change to apply to the target system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Enrol through an instance; the target assigns `role` as a sync role
    ///
    /// `user` is `None` when the account does not exist yet. It is
    /// provisioned from `external_user` when the command is applied.
    Enrol {
        course: CourseId,
        instance: InstanceId,
        user: Option<UserId>,
        external_user: ExternalUserId,
        username: Username,
        role: RoleId,
    },
    Unenrol {
        course: CourseId,
        instance: InstanceId,
        user: UserId,
        username: Username,
    },
    AssignRole {
        course: CourseId,
        role: RoleId,
        user: UserId,
        username: Username,
        component: Component,
    },
    UnassignRole {
        course: CourseId,
        role: RoleId,
        user: UserId,
        username: Username,
        component: Component,
    },
}

impl Command {
    pub fn course(&self) -> CourseId {
        match self {
            Command::Enrol { course, .. }
            | Command::Unenrol { course, .. }
            | Command::AssignRole { course, .. }
            | Command::UnassignRole { course, .. } => *course,
        }
    }

    pub fn username(&self) -> &Username {
        match self {
            Command::Enrol { username, .. }
            | Command::Unenrol { username, .. }
            | Command::AssignRole { username, .. }
            | Command::UnassignRole { username, .. } => username,
        }
    }

    /// Short verb for logs and statistics
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Enrol { .. } => "enrol",
            Command::Unenrol { .. } => "unenrol",
            Command::AssignRole { .. } => "assign_role",
            Command::UnassignRole { .. } => "unassign_role",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Enrol {
                course,
                instance,
                username,
                role,
                ..
            } => write!(
                f,
                "enrol {} on course {} via instance {} as role {}",
                username, course, instance, role
            ),
            Command::Unenrol {
                course,
                instance,
                username,
                ..
            } => write!(
                f,
                "unenrol {} from course {} (instance {})",
                username, course, instance
            ),
            Command::AssignRole {
                course,
                role,
                username,
                component,
                ..
            } => write!(
                f,
                "assign role {} to {} on course {} ({})",
                role, username, course, component
            ),
            Command::UnassignRole {
                course,
                role,
                username,
                component,
                ..
            } => write!(
                f,
                "unassign role {} from {} on course {} ({})",
                role, username, course, component
            ),
        }
    }
}

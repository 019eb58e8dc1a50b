//! Error types for enrol-core

use std::path::PathBuf;

use crate::ids::{CourseId, ExternalUserId, InstanceId, UserId};

/// Result type for enrol-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in enrol-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The sync is switched off in configuration
    #[error("Connect enrolment sync is disabled")]
    PluginDisabled,

    /// A Connect user could not be materialised in the target system
    #[error("Could not provision Connect user {external_user_id}: {reason}")]
    Provisioning {
        external_user_id: ExternalUserId,
        reason: String,
    },

    /// A single enrol/unenrol/role command failed
    #[error("Failed to {command}: {reason}")]
    Mutation { command: String, reason: String },

    /// Course (or its context) is missing from the target system
    #[error("Course not found: {course_id}")]
    CourseNotFound { course_id: CourseId },

    /// Enrol instance failed its precondition checks
    #[error("Invalid enrol instance {instance_id}: {reason}")]
    InvalidInstance {
        instance_id: InstanceId,
        reason: String,
    },

    /// User id not present in the target system
    #[error("Unknown user: {user_id}")]
    UnknownUser { user_id: UserId },

    /// Enrol instance id not present in the target system
    #[error("Unknown enrol instance: {instance_id}")]
    UnknownInstance { instance_id: InstanceId },

    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parsed but holds unusable values
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}

impl Error {
    /// Build a mutation failure for the given command description
    pub fn mutation(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Mutation {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

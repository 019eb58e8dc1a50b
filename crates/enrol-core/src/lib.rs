//! Reconciliation core for Connect course enrolments
//!
//! This crate keeps course enrolments and role assignments in a target system
//! in line with the memberships published by Connect:
//!
//! - **Status filtering**: per-instance lists of student status codes
//! - **State loading**: latest (Connect) and current (target) state per course
//! - **Reconciliation**: a deterministic, ordered command list per course
//! - **Application**: commands run one by one, or are described in dry-run
//! - **SyncEngine**: per-course and whole-site runs with failure isolation
//!
//! # Architecture
//!
//! ```text
//!                  enrol-cli
//!                      |
//!                  SyncEngine
//!                      |
//!      +---------------+---------------+
//!      |               |               |
//! StateLoader      Reconciler       Applier
//!      |                               |
//! ExternalSource                  TargetWriter
//! TargetReader                    UserProvisioner
//! ```
//!
//! [`store::SnapshotStore`] implements every collaborator trait over a JSON
//! document.
//!
//! # Example
//!
//! ```
//! use enrol_core::store::{Snapshot, SnapshotStore};
//! use enrol_core::{SyncConfig, SyncEngine, SyncOptions};
//!
//! let config = SyncConfig::default();
//! let store = SnapshotStore::new(Snapshot::default());
//! let engine = SyncEngine::new(&config, &store, &store, &store, &store);
//!
//! let report = engine.sync_all(&SyncOptions::dry_run()).unwrap();
//! assert_eq!(report.change_count(), 0);
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod ids;
pub mod loader;
pub mod model;
pub mod reconcile;
pub mod status;
pub mod store;
pub mod sync;

pub use config::{SyncConfig, CONFIG_FILE_NAME};
pub use directory::{CourseFilter, ExternalSource, TargetReader, TargetWriter, UserProvisioner};
pub use error::{Error, Result};
pub use ids::{CourseId, CourseKey, ExternalUserId, InstanceId, RoleId, UserId};
pub use loader::StateLoader;
pub use model::{
    Component, CourseInfo, CurrentState, DesiredState, EnrolInstance, EnrolMethod,
    EnrolmentRecord, MembershipRecord, RoleRecord, Username,
};
pub use reconcile::{Command, ReconcilePlan, Reconciler};
pub use status::AllowedStatuses;
pub use sync::{
    Applier, ApplyReport, CourseReport, Interrupt, SkippedUser, SyncEngine, SyncOptions,
    SyncOutcome, SyncReport,
};

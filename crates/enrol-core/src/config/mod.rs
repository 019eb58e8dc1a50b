//! Sync configuration
//!
//! Configuration is a single TOML file, `enrol-sync.toml`:
//!
//! ```toml
//! [sync]
//! enabled = true
//! default_statuses = "A,J,P,R,T,W,Y,H"
//!
//! [roles]
//! sds_student = 5
//! sds_teacher = 4
//! sds_convenor = 3
//! ```
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration.

mod settings;

pub use settings::{SyncConfig, SyncSection, CONFIG_FILE_NAME};

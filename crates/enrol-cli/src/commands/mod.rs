//! Command implementations for enrol-cli

pub mod sync;

pub use sync::{ExitStatus, RunArgs, run_sync, run_task};

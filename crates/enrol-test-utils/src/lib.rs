//! Shared test fixtures for the connect-enrol-sync workspace.
//!
//! This crate is a dev-dependency only and is never published. It builds
//! snapshot and configuration files as plain JSON/TOML so that it does not
//! depend on `enrol-core` itself.
//!
//! # Modules
//!
//! - [`snapshot`]: [`SnapshotFixture`] builder plus the canonical course

pub mod snapshot;

pub use snapshot::SnapshotFixture;

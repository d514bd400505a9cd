//! Core orchestration layer for the directory mirror syncer
//!
//! This crate decides what happens to the destination directory on every
//! cycle:
//!
//! - **Configuration**: the immutable [`SyncConfiguration`] built and
//!   validated once at startup
//! - **ReconciliationEngine**: classifies the destination and clones,
//!   fast-forwards, resets or self-heals it
//! - **Source drivers**: a [`DriverRegistry`] mapping each [`SourceKind`] to
//!   the driver that knows how to mirror it
//! - **Scheduler**: runs one tick at a time on a fixed interval and owns the
//!   fatal-vs-retry policy
//!
//! # Architecture
//!
//! ```text
//!            mirror-cli (binary, health endpoint)
//!                        |
//!                   mirror-core
//!                        |
//!              +---------+---------+
//!              |                   |
//!          mirror-git          mirror-fs
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod source;

pub use config::{KeySettings, SourceKind, SyncConfiguration, SyncConfigurationBuilder};
pub use engine::{MirrorState, ReconciliationEngine, TickOutcome};
pub use error::{Error, Result};
pub use scheduler::{Phase, Scheduler};
pub use source::{DriverFactory, DriverRegistry, SourceDriver};

//! Shared test utilities for the mirror-sync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`upstream`]: [`Upstream`] bare repository fixture acting as the remote
//! - [`snapshot`]: byte-for-byte directory snapshots

pub mod snapshot;
pub mod upstream;

pub use snapshot::{Snapshot, snapshot, snapshot_worktree};
pub use upstream::Upstream;

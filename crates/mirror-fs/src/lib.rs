//! Filesystem helpers for the directory mirror syncer
//!
//! Provides normalized paths, destination bootstrapping and the
//! read-only directory probes the reconciliation engine relies on.

pub mod dir;
pub mod error;
pub mod home;
pub mod path;

pub use dir::{clear_dir, ensure_dir, is_empty};
pub use error::{Error, Result};
pub use home::expand_home;
pub use path::NormalizedPath;

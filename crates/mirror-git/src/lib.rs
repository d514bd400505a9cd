//! Git abstraction for the directory mirror syncer
//!
//! Everything the reconciliation engine needs from git lives here:
//! reference resolution, credential resolution, read-only inspection of a
//! destination directory, and the clone / fetch / fast-forward / reset
//! operations that mutate it.

pub mod credentials;
pub mod error;
pub mod inspect;
pub mod mirror;
pub mod reference;

pub use credentials::Credential;
pub use git2::Oid;
pub use error::{Error, Result};
pub use inspect::RepositoryState;
pub use mirror::{FastForward, RemoteAccess, WorkingTree, clone_into};
pub use reference::ReferenceSpec;

/// Name of the metadata directory inside a working tree.
pub const METADATA_DIR: &str = ".git";

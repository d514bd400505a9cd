//! Error types for mirror-git

use std::path::PathBuf;
use std::time::Duration;

/// Result type for mirror-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mirror-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Filesystem error: {0}")]
    Fs(#[from] mirror_fs::Error),

    #[error("Not a git clone: {path}")]
    NotAClone { path: PathBuf },

    #[error("Git metadata missing at {path}")]
    MetadataMissing { path: PathBuf },

    #[error("Git metadata at {path} is unreadable: {message}")]
    MetadataCorrupt { path: PathBuf, message: String },

    #[error("Cannot expand home directory in SSH key path: {path}")]
    KeyExpansion { path: String },

    #[error("SSH key file does not exist: {path}")]
    KeyNotFound { path: PathBuf },

    #[error("Remote '{name}' not found")]
    RemoteNotFound { name: String },

    #[error("Reference '{reference}' not found on remote")]
    ReferenceNotFound { reference: String },

    #[error("Fetch failed: {message}")]
    FetchFailed { message: String },

    #[error("Cannot fast-forward: {message}")]
    CannotFastForward { message: String },

    #[error("{operation} exceeded the {timeout:?} operation timeout")]
    DeadlineExceeded {
        operation: &'static str,
        timeout: Duration,
    },
}

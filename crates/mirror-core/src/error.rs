//! Error types for mirror-core

use std::path::PathBuf;
use std::time::Duration;

/// Result type for mirror-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or reconciling a mirror.
///
/// Every variant except [`Error::Drift`] is fatal: the scheduler stops and
/// the process exits so a supervisor can restart it from a clean slate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required setting is missing or malformed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The SSH key could not be resolved
    #[error("Credential error: {0}")]
    Credential(#[source] mirror_git::Error),

    /// No driver handles the kind of source configured
    #[error("Unsupported source: {url}")]
    UnsupportedSource { url: String },

    /// Destination holds something other than a clone of the source
    #[error(
        "Destination {dest} is not a clone of {expected} (found {})",
        .found.as_deref().unwrap_or("no git clone")
    )]
    ConfigMismatch {
        dest: PathBuf,
        expected: String,
        found: Option<String>,
    },

    /// Uncommitted local changes and resetting is disabled
    #[error("There are uncommitted changes in {dest}, cannot update")]
    Drift { dest: PathBuf },

    /// Fetch or fast-forward of an existing mirror failed
    #[error("Update failed: {0}")]
    Update(#[source] mirror_git::Error),

    /// Initial or self-healing clone failed
    #[error("Clone failed: {0}")]
    Clone(#[source] mirror_git::Error),

    /// Reading the destination failed
    #[error("Inspection of destination failed: {0}")]
    Inspect(#[source] mirror_git::Error),

    /// A whole tick ran past its time bound
    #[error("Tick did not finish within {timeout:?}")]
    Stalled { timeout: Duration },

    /// The blocking task running a tick panicked or was cancelled
    #[error("Tick task failed: {message}")]
    TaskFailed { message: String },

    /// Filesystem error from mirror-fs
    #[error(transparent)]
    Fs(#[from] mirror_fs::Error),
}

impl Error {
    /// Create a configuration error with the given message
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the process should stop on this error.
    ///
    /// Drift is an expected operational condition and is retried on the
    /// next tick; everything else calls for a restart.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Drift { .. })
    }
}

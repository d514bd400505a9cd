//! ReconciliationEngine implementation
//!
//! The engine looks at the destination directory fresh on every tick,
//! classifies it into a [`MirrorState`], and takes the matching action:
//!
//! | State            | Action                                           |
//! |------------------|--------------------------------------------------|
//! | Uninitialized    | clone the configured reference                   |
//! | ValidMirror      | fetch and fast-forward                           |
//! | Drifted          | hard reset then update, or fail with `Drift`     |
//! | ConfigMismatch   | fail, never touch the destination                |
//! | MissingMetadata  | fail on initialize, self-heal on update          |

use std::fmt;

use mirror_git::Oid;
use mirror_git::inspect::{self, RepositoryState};
use mirror_git::{Credential, FastForward, RemoteAccess, WorkingTree};

use crate::config::{SourceKind, SyncConfiguration};
use crate::source::SourceDriver;
use crate::{Error, Result};

/// Logical state of the destination, derived from inspection each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorState {
    /// Destination is empty
    Uninitialized,
    /// Clean clone of the configured source
    ValidMirror,
    /// Clone of the configured source with uncommitted changes
    Drifted,
    /// Clone of some other source
    ConfigMismatch,
    /// Non-empty but without usable git metadata
    MissingMetadata,
}

impl MirrorState {
    pub fn classify(state: &RepositoryState) -> Self {
        if !state.exists {
            Self::Uninitialized
        } else if state.recorded_origin.is_none() {
            Self::MissingMetadata
        } else if !state.is_valid_clone {
            Self::ConfigMismatch
        } else if !state.is_clean {
            Self::Drifted
        } else {
            Self::ValidMirror
        }
    }
}

/// What a successful tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Empty destination was cloned
    Cloned { head: Oid },
    /// Missing or corrupt metadata was replaced by a fresh clone
    Healed { head: Oid },
    /// Nothing new upstream
    UpToDate { head: Oid, reset: bool },
    /// Fast-forwarded to a newer commit
    Updated { from: Oid, to: Oid, reset: bool },
}

impl TickOutcome {
    /// Commit checked out after the tick.
    pub fn head(&self) -> Oid {
        match self {
            Self::Cloned { head } | Self::Healed { head } | Self::UpToDate { head, .. } => *head,
            Self::Updated { to, .. } => *to,
        }
    }

    /// Whether local modifications were discarded during the tick.
    pub fn discarded_drift(&self) -> bool {
        matches!(
            self,
            Self::UpToDate { reset: true, .. } | Self::Updated { reset: true, .. }
        )
    }
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloned { head } => write!(f, "cloned at {head}"),
            Self::Healed { head } => write!(f, "re-cloned at {head}"),
            Self::UpToDate { head, .. } => write!(f, "already up to date at {head}"),
            Self::Updated { from, to, .. } => write!(f, "fast-forwarded {from}..{to}"),
        }
    }
}

/// Decides and executes the corrective action for a git mirror.
///
/// Holds only the credential resolved at configure time; all other
/// settings arrive with each call.
#[derive(Debug)]
pub struct ReconciliationEngine {
    credential: Option<Credential>,
}

impl ReconciliationEngine {
    pub fn new(credential: Option<Credential>) -> Self {
        Self { credential }
    }

    /// Driver factory for git sources: resolves the SSH key once.
    ///
    /// # Errors
    ///
    /// [`Error::Credential`] if the key path cannot be expanded or does not
    /// exist.
    pub fn configure(config: &SyncConfiguration) -> Result<Box<dyn SourceDriver>> {
        let credential = match config.key() {
            Some(key) => Credential::resolve(&key.key_path, &key.passphrase)
                .map_err(Error::Credential)?,
            None => None,
        };
        match &credential {
            Some(credential) => tracing::info!(
                key = %credential.key_path().display(),
                passphrase = credential.has_passphrase(),
                "Using SSH key for remote operations"
            ),
            None => tracing::debug!("No SSH key configured, using agent or anonymous access"),
        }
        Ok(Box::new(Self::new(credential)))
    }

    fn access<'a>(&'a self, config: &'a SyncConfiguration) -> RemoteAccess<'a> {
        RemoteAccess {
            remote: config.upstream_remote(),
            reference: config.reference(),
            credential: self.credential.as_ref(),
            timeout: config.operation_timeout(),
        }
    }

    /// Bring an arbitrary destination under management.
    ///
    /// Clones into an empty destination and delegates to [`update`] when a
    /// matching clone already exists. Anything else is a configuration
    /// mismatch and the destination is left untouched.
    ///
    /// [`update`]: ReconciliationEngine::update
    pub fn initialize(&self, config: &SyncConfiguration) -> Result<TickOutcome> {
        let dest = config.destination();
        let state = inspect::inspect(dest, config.source(), config.upstream_remote())
            .map_err(Error::Inspect)?;

        match MirrorState::classify(&state) {
            MirrorState::Uninitialized => {
                tracing::info!(dest = %dest, reference = %config.reference(), "Performing initial clone");
                let head = self.clone_fresh(config)?;
                Ok(TickOutcome::Cloned { head })
            }
            MirrorState::ConfigMismatch | MirrorState::MissingMetadata => {
                Err(Error::ConfigMismatch {
                    dest: dest.to_native(),
                    expected: config.source().to_string(),
                    found: state.recorded_origin,
                })
            }
            MirrorState::ValidMirror | MirrorState::Drifted => {
                tracing::info!(dest = %dest, "Clone already exists in destination, performing update instead");
                self.update(config)
            }
        }
    }

    /// Update a destination this process already manages.
    ///
    /// Missing or corrupt metadata, including a git config without the
    /// configured remote, is self-healed by clearing the destination and
    /// cloning again.
    pub fn update(&self, config: &SyncConfiguration) -> Result<TickOutcome> {
        let dest = config.destination();
        let tree = match WorkingTree::open(dest.clone()) {
            Ok(tree) => tree,
            Err(e @ (mirror_git::Error::MetadataMissing { .. }
            | mirror_git::Error::MetadataCorrupt { .. })) => {
                tracing::warn!(dest = %dest, error = %e, "Repository unusable, attempting reinitialisation");
                return self.heal(config);
            }
            Err(e) => return Err(Error::Update(e)),
        };

        match inspect::recorded_origin(dest, config.upstream_remote()) {
            Ok(url) if url == config.source() => {}
            Ok(url) => {
                return Err(Error::ConfigMismatch {
                    dest: dest.to_native(),
                    expected: config.source().to_string(),
                    found: Some(url),
                });
            }
            Err(e @ mirror_git::Error::NotAClone { .. }) => {
                // Repository opened but its config has no remote: corrupt metadata
                tracing::warn!(dest = %dest, error = %e, "Remote missing from git config, attempting reinitialisation");
                drop(tree);
                return self.heal(config);
            }
            Err(e) => return Err(Error::Inspect(e)),
        }

        let mut reset = false;
        if !tree.is_clean().map_err(Error::Inspect)? {
            if !config.reset_on_drift() {
                return Err(Error::Drift {
                    dest: dest.to_native(),
                });
            }
            let head = tree.hard_reset().map_err(Error::Update)?;
            tracing::warn!(dest = %dest, %head, "Discarded uncommitted changes with a hard reset");
            reset = true;
        }

        let target = tree.fetch(&self.access(config)).map_err(Error::Update)?;
        let outcome = match tree
            .fast_forward(config.reference(), target)
            .map_err(Error::Update)?
        {
            FastForward::UpToDate(head) => TickOutcome::UpToDate { head, reset },
            FastForward::Advanced { from, to } => TickOutcome::Updated { from, to, reset },
        };
        Ok(outcome)
    }

    fn heal(&self, config: &SyncConfiguration) -> Result<TickOutcome> {
        mirror_fs::clear_dir(config.destination())?;
        let head = self.clone_fresh(config)?;
        Ok(TickOutcome::Healed { head })
    }

    fn clone_fresh(&self, config: &SyncConfiguration) -> Result<Oid> {
        mirror_git::clone_into(config.destination(), config.source(), &self.access(config))
            .map_err(Error::Clone)
    }
}

impl SourceDriver for ReconciliationEngine {
    fn kind(&self) -> SourceKind {
        SourceKind::Git
    }

    fn initialize(&self, config: &SyncConfiguration) -> Result<TickOutcome> {
        ReconciliationEngine::initialize(self, config)
    }

    fn update(&self, config: &SyncConfiguration) -> Result<TickOutcome> {
        ReconciliationEngine::update(self, config)
    }
}

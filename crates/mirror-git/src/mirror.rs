//! Mutating git operations on a mirror destination
//!
//! Clone, fetch, fast-forward and hard reset. Every network operation is
//! bounded by a deadline: the transfer callbacks abort the transfer once
//! the configured timeout has elapsed.

use std::cell::Cell;
use std::time::{Duration, Instant};

use git2::build::CheckoutBuilder;
use git2::{AutotagOption, BranchType, FetchOptions, Oid, RemoteCallbacks, Repository, ResetType};
use mirror_fs::NormalizedPath;

use crate::credentials::{self, Credential};
use crate::{Error, METADATA_DIR, ReferenceSpec, Result, inspect};

/// libgit2 re-asks for credentials after a rejected attempt; give up after this many.
const MAX_AUTH_ATTEMPTS: u32 = 4;

/// How to reach the remote for clone and fetch.
#[derive(Debug, Clone, Copy)]
pub struct RemoteAccess<'a> {
    /// Remote name recorded in the destination's config
    pub remote: &'a str,
    /// The single reference to transfer
    pub reference: &'a ReferenceSpec,
    /// Optional SSH key; `None` falls back to agent/anonymous access
    pub credential: Option<&'a Credential>,
    /// Upper bound for one network operation
    pub timeout: Duration,
}

/// Result of a fast-forward attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastForward {
    /// HEAD already contains the fetched commit.
    UpToDate(Oid),
    /// HEAD and the working tree moved forward.
    Advanced { from: Oid, to: Oid },
}

struct Deadline {
    started: Instant,
    timeout: Duration,
}

impl Deadline {
    fn start(timeout: Duration) -> Self {
        Self {
            started: Instant::now(),
            timeout,
        }
    }

    fn expired(&self) -> bool {
        self.started.elapsed() >= self.timeout
    }
}

fn fetch_options<'cb>(
    credential: Option<&'cb Credential>,
    deadline: &'cb Deadline,
    attempts: &'cb Cell<u32>,
) -> FetchOptions<'cb> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, allowed| {
        if deadline.expired() {
            return Err(git2::Error::from_str("operation timed out"));
        }
        attempts.set(attempts.get() + 1);
        if attempts.get() > MAX_AUTH_ATTEMPTS {
            return Err(git2::Error::from_str("authentication failed"));
        }
        credentials::answer(credential, username_from_url, allowed)
    });
    callbacks.transfer_progress(move |_| !deadline.expired());
    callbacks.sideband_progress(move |_| !deadline.expired());

    let mut opts = FetchOptions::new();
    opts.remote_callbacks(callbacks);
    opts.download_tags(AutotagOption::None);
    opts
}

/// Fetch the configured reference and return the commit it points at.
fn fetch(repo: &Repository, access: &RemoteAccess<'_>) -> Result<Oid> {
    let mut remote = repo
        .find_remote(access.remote)
        .map_err(|_| Error::RemoteNotFound {
            name: access.remote.to_string(),
        })?;

    let refspec = access.reference.fetch_refspec(access.remote);
    let deadline = Deadline::start(access.timeout);
    let attempts = Cell::new(0);

    {
        let mut opts = fetch_options(access.credential, &deadline, &attempts);
        if let Err(e) = remote.fetch(&[refspec.as_str()], Some(&mut opts), None) {
            if deadline.expired() {
                return Err(Error::DeadlineExceeded {
                    operation: "fetch",
                    timeout: access.timeout,
                });
            }
            return Err(Error::FetchFailed {
                message: e.message().to_string(),
            });
        }
    }

    let target_ref = access.reference.target_ref(access.remote);
    let reference = repo
        .find_reference(&target_ref)
        .map_err(|_| Error::ReferenceNotFound {
            reference: access.reference.refname(),
        })?;
    Ok(reference.peel_to_commit()?.id())
}

/// Clone `source` into the empty directory `dest`, checking out only the
/// configured reference.
///
/// The remote is recorded under `access.remote`. A branch is checked out
/// as a local branch tracking the remote one; a tag is checked out as a
/// detached HEAD. If anything fails, whatever was written is removed so
/// `dest` is empty again.
pub fn clone_into(dest: &NormalizedPath, source: &str, access: &RemoteAccess<'_>) -> Result<Oid> {
    match try_clone(dest, source, access) {
        Ok(oid) => Ok(oid),
        Err(e) => {
            if let Err(cleanup) = mirror_fs::clear_dir(dest) {
                tracing::warn!(
                    dest = %dest,
                    error = %cleanup,
                    "Failed to clean up after unsuccessful clone"
                );
            }
            Err(e)
        }
    }
}

fn try_clone(dest: &NormalizedPath, source: &str, access: &RemoteAccess<'_>) -> Result<Oid> {
    let repo = Repository::init(dest.to_native())?;
    repo.remote_with_fetch(
        access.remote,
        source,
        &access.reference.fetch_refspec(access.remote),
    )?;

    let target = fetch(&repo, access)?;

    match access.reference {
        ReferenceSpec::Branch(name) => {
            let refname = access.reference.refname();
            repo.reference(&refname, target, true, "mirror: initial clone")?;
            repo.set_head(&refname)?;
            let mut branch = repo.find_branch(name, BranchType::Local)?;
            branch.set_upstream(Some(&format!("{}/{}", access.remote, name)))?;
        }
        ReferenceSpec::Tag(_) => repo.set_head_detached(target)?,
    }

    repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
    Ok(target)
}

/// An opened mirror working tree.
pub struct WorkingTree {
    root: NormalizedPath,
    repo: Repository,
}

impl WorkingTree {
    /// Open the working tree at `root`.
    ///
    /// # Errors
    ///
    /// - [`Error::MetadataMissing`] if `root/.git` does not exist
    /// - [`Error::MetadataCorrupt`] if it exists but cannot be opened or
    ///   HEAD does not resolve to a commit
    pub fn open(root: NormalizedPath) -> Result<Self> {
        let git_dir = root.join(METADATA_DIR);
        if !git_dir.exists() {
            return Err(Error::MetadataMissing {
                path: git_dir.to_native(),
            });
        }

        let corrupt = |e: git2::Error| Error::MetadataCorrupt {
            path: git_dir.to_native(),
            message: e.message().to_string(),
        };

        let repo = Repository::open(root.to_native()).map_err(corrupt)?;
        repo.head()
            .and_then(|head| head.peel_to_commit())
            .map_err(corrupt)?;

        Ok(Self { root, repo })
    }

    /// Commit HEAD currently points at.
    pub fn head(&self) -> Result<Oid> {
        Ok(self.repo.head()?.peel_to_commit()?.id())
    }

    pub fn is_clean(&self) -> Result<bool> {
        inspect::is_clean(&self.repo)
    }

    /// Discard every uncommitted modification, including untracked files.
    ///
    /// Returns the commit the tree was reset to.
    pub fn hard_reset(&self) -> Result<Oid> {
        let head = self.head()?;
        self.reset_to(head)?;
        Ok(head)
    }

    fn reset_to(&self, oid: Oid) -> Result<()> {
        let commit = self.repo.find_commit(oid)?;
        self.repo.reset(
            commit.as_object(),
            ResetType::Hard,
            Some(CheckoutBuilder::new().force().remove_untracked(true)),
        )?;
        // Hard reset leaves untracked files behind; a forced checkout sweeps them.
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force().remove_untracked(true)))?;
        self.repo.cleanup_state()?;
        Ok(())
    }

    /// Fetch the configured reference; returns the fetched commit.
    pub fn fetch(&self, access: &RemoteAccess<'_>) -> Result<Oid> {
        fetch(&self.repo, access)
    }

    /// Advance HEAD and the working tree to `target` if that is a
    /// fast-forward.
    ///
    /// A target equal to HEAD is up to date. A target that is an ancestor
    /// of HEAD, or unrelated to it, is [`Error::CannotFastForward`].
    ///
    /// The tree is checked out before any reference moves. If either step
    /// fails the tree is reset back to the pre-call HEAD, so no partial
    /// update is left on disk.
    pub fn fast_forward(&self, reference: &ReferenceSpec, target: Oid) -> Result<FastForward> {
        let head = self.head()?;
        if target == head {
            return Ok(FastForward::UpToDate(head));
        }

        let annotated = self.repo.find_annotated_commit(target)?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;

        // merge_analysis also reports up-to-date when target is an ancestor of HEAD
        if analysis.is_up_to_date() {
            return Err(Error::CannotFastForward {
                message: format!("{reference} moved back from {head} to its ancestor {target}"),
            });
        }
        if !analysis.is_fast_forward() {
            return Err(Error::CannotFastForward {
                message: format!("{reference} moved from {head} to {target}, which does not descend from it"),
            });
        }

        let commit = self.repo.find_commit(target)?;
        let applied = self
            .repo
            .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))
            .and_then(|()| self.move_head(reference, target));

        if let Err(e) = applied {
            if let Err(rollback) = self.reset_to(head) {
                tracing::error!(
                    root = %self.root,
                    error = %rollback,
                    "Rollback after failed fast-forward did not complete"
                );
            }
            return Err(e.into());
        }

        Ok(FastForward::Advanced {
            from: head,
            to: target,
        })
    }

    fn move_head(&self, reference: &ReferenceSpec, target: Oid) -> std::result::Result<(), git2::Error> {
        match reference {
            ReferenceSpec::Branch(_) => {
                let refname = reference.refname();
                self.repo.reference(
                    &refname,
                    target,
                    true,
                    &format!("mirror: fast-forward to {target}"),
                )?;
                self.repo.set_head(&refname)
            }
            ReferenceSpec::Tag(_) => self.repo.set_head_detached(target),
        }
    }
}

//! A bare git repository standing in for the remote.
//!
//! Commits are written straight into the bare object store with `git2`, so
//! no `git` binary or user configuration is needed.

use std::path::{Path, PathBuf};

use git2::{Oid, Repository, Signature};
use tempfile::TempDir;

/// A temporary bare repository with a `main` branch holding one commit
/// (`README.md`).
///
/// # Example
///
/// ```rust,no_run
/// use mirror_test_utils::Upstream;
///
/// let upstream = Upstream::new();
/// let tip = upstream.commit_file("main", "config.yaml", "replicas: 2\n", "Scale up");
/// upstream.tag("v1.0.0", tip);
/// ```
pub struct Upstream {
    _temp_dir: TempDir,
    path: PathBuf,
    repo: Repository,
}

impl Default for Upstream {
    fn default() -> Self {
        Self::new()
    }
}

impl Upstream {
    /// Create the bare repository with an initial commit on `main`.
    ///
    /// # Panics
    /// Panics if the repository cannot be created.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Upstream::new: failed to create temp dir");
        let path = temp_dir.path().join("upstream.git");
        let repo = Repository::init_bare(&path)
            .unwrap_or_else(|e| panic!("Upstream::new: failed to init bare repo: {e}"));
        repo.set_head("refs/heads/main")
            .unwrap_or_else(|e| panic!("Upstream::new: failed to point HEAD at main: {e}"));

        let upstream = Self {
            _temp_dir: temp_dir,
            path,
            repo,
        };
        upstream.commit_file("main", "README.md", "# Upstream\n", "Initial commit");
        upstream
    }

    /// Filesystem path of the bare repository.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The URL a mirror uses as its source.
    pub fn url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Commit `content` as top-level file `name` on `branch`.
    ///
    /// Creates the branch if it does not exist yet; otherwise the new
    /// commit's parent is the current tip.
    ///
    /// # Panics
    /// Panics if any git operation fails.
    pub fn commit_file(&self, branch: &str, name: &str, content: &str, message: &str) -> Oid {
        let refname = format!("refs/heads/{branch}");
        let parent = self
            .repo
            .find_reference(&refname)
            .ok()
            .and_then(|r| r.peel_to_commit().ok());

        let blob = self.repo.blob(content.as_bytes()).unwrap();
        let base_tree = parent.as_ref().map(|c| c.tree().unwrap());
        let mut builder = self.repo.treebuilder(base_tree.as_ref()).unwrap();
        builder.insert(name, blob, 0o100644).unwrap();
        let tree = self.repo.find_tree(builder.write().unwrap()).unwrap();

        let sig = signature();
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        self.repo
            .commit(Some(&refname), &sig, &sig, message, &tree, &parents)
            .unwrap_or_else(|e| panic!("Upstream::commit_file: commit failed: {e}"))
    }

    /// Remove top-level file `name` on `branch`.
    ///
    /// # Panics
    /// Panics if the branch or file does not exist.
    pub fn remove_file(&self, branch: &str, name: &str, message: &str) -> Oid {
        let refname = format!("refs/heads/{branch}");
        let parent = self.repo.find_reference(&refname).unwrap().peel_to_commit().unwrap();
        let base_tree = parent.tree().unwrap();
        let mut builder = self.repo.treebuilder(Some(&base_tree)).unwrap();
        builder.remove(name).unwrap();
        let tree = self.repo.find_tree(builder.write().unwrap()).unwrap();

        let sig = signature();
        self.repo
            .commit(Some(&refname), &sig, &sig, message, &tree, &[&parent])
            .unwrap()
    }

    /// Create a lightweight tag `name` at `target`, moving it if it exists.
    pub fn tag(&self, name: &str, target: Oid) {
        let object = self.repo.find_object(target, None).unwrap();
        self.repo.tag_lightweight(name, &object, true).unwrap();
    }

    /// Current tip of `branch`.
    pub fn tip(&self, branch: &str) -> Oid {
        self.repo
            .find_reference(&format!("refs/heads/{branch}"))
            .unwrap()
            .peel_to_commit()
            .unwrap()
            .id()
    }

    /// Replace the history of `branch` with a single unrelated commit.
    ///
    /// Simulates a force-push that a fast-forward cannot follow.
    pub fn rewrite_history(&self, branch: &str, name: &str, content: &str) -> Oid {
        let blob = self.repo.blob(content.as_bytes()).unwrap();
        let mut builder = self.repo.treebuilder(None).unwrap();
        builder.insert(name, blob, 0o100644).unwrap();
        let tree = self.repo.find_tree(builder.write().unwrap()).unwrap();

        let sig = signature();
        let oid = self
            .repo
            .commit(None, &sig, &sig, "Rewritten history", &tree, &[])
            .unwrap();
        self.repo
            .reference(&format!("refs/heads/{branch}"), oid, true, "force push")
            .unwrap();
        oid
    }

    /// Force `branch` back to `target`, as a force-push to an older commit would.
    pub fn rewind(&self, branch: &str, target: Oid) {
        self.repo
            .reference(&format!("refs/heads/{branch}"), target, true, "rewind")
            .unwrap_or_else(|e| panic!("Upstream::rewind: failed to move {branch}: {e}"));
    }

    /// Clone this upstream into `dest` the ordinary way (remote `origin`,
    /// default branch checked out).
    pub fn plain_clone(&self, dest: &Path) -> Repository {
        Repository::clone(&self.url(), dest)
            .unwrap_or_else(|e| panic!("Upstream::plain_clone: clone failed: {e}"))
    }
}

fn signature() -> Signature<'static> {
    Signature::now("Test User", "test@test.com").unwrap()
}

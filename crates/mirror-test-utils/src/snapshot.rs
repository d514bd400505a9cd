//! Byte-for-byte directory snapshots for before/after comparisons.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Relative path → file contents for every regular file under a root.
pub type Snapshot = BTreeMap<PathBuf, Vec<u8>>;

/// Snapshot every file under `root`, including git metadata.
///
/// # Panics
/// Panics if the tree cannot be read.
pub fn snapshot(root: &Path) -> Snapshot {
    let mut files = Snapshot::new();
    collect(root, root, false, &mut files);
    files
}

/// Snapshot the working tree under `root`, skipping the `.git` directory.
///
/// # Panics
/// Panics if the tree cannot be read.
pub fn snapshot_worktree(root: &Path) -> Snapshot {
    let mut files = Snapshot::new();
    collect(root, root, true, &mut files);
    files
}

fn collect(root: &Path, dir: &Path, skip_git: bool, files: &mut Snapshot) {
    let entries = fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("snapshot: cannot read {}: {e}", dir.display()));

    for entry in entries {
        let entry = entry.unwrap();
        let path = entry.path();
        if skip_git && dir == root && entry.file_name() == ".git" {
            continue;
        }

        let file_type = entry.file_type().unwrap();
        if file_type.is_dir() {
            collect(root, &path, skip_git, files);
        } else if file_type.is_file() {
            let relative = path.strip_prefix(root).unwrap().to_path_buf();
            files.insert(relative, fs::read(&path).unwrap());
        }
    }
}

//! Read-only probes against a destination directory
//!
//! None of these functions mutate the destination.

use std::fs::File;
use std::io::{BufRead, BufReader};

use git2::{Repository, Status, StatusOptions};
use mirror_fs::NormalizedPath;

use crate::{Error, METADATA_DIR, Result};

const URL_PREFIX: &str = "url = ";

/// What inspection found in a destination directory on this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryState {
    /// The destination is a non-empty directory.
    pub exists: bool,
    /// URL recorded for the configured remote, if any.
    pub recorded_origin: Option<String>,
    /// Metadata is present and the recorded origin equals the source.
    pub is_valid_clone: bool,
    /// The working tree has no uncommitted modifications.
    ///
    /// Only meaningful for a valid clone; false otherwise.
    pub is_clean: bool,
}

/// Run every probe against `path` for a mirror of `source` via `remote`.
pub fn inspect(path: &NormalizedPath, source: &str, remote: &str) -> Result<RepositoryState> {
    if mirror_fs::is_empty(path)? {
        return Ok(RepositoryState {
            exists: false,
            recorded_origin: None,
            is_valid_clone: false,
            is_clean: true,
        });
    }

    let recorded_origin = match recorded_origin(path, remote) {
        Ok(url) => Some(url),
        Err(Error::NotAClone { .. }) => None,
        Err(e) => return Err(e),
    };
    let is_valid_clone = recorded_origin.as_deref() == Some(source);
    let is_clean = is_valid_clone && is_working_tree_clean(path)?;

    Ok(RepositoryState {
        exists: true,
        recorded_origin,
        is_valid_clone,
        is_clean,
    })
}

/// Extract the URL recorded for `remote` in the destination's git config.
///
/// The config is scanned line by line: the first `[remote "<remote>"]`
/// header opens the section and the first `url = ` line after it wins.
///
/// # Errors
///
/// [`Error::NotAClone`] when the config file is missing or has no url for
/// the remote.
pub fn recorded_origin(path: &NormalizedPath, remote: &str) -> Result<String> {
    let config_path = path.join(METADATA_DIR).join("config").to_native();
    if !config_path.is_file() {
        return Err(Error::NotAClone {
            path: path.to_native(),
        });
    }

    let file = File::open(&config_path).map_err(|e| mirror_fs::Error::io(&config_path, e))?;
    let header = format!("[remote \"{remote}\"]");
    let mut in_section = false;

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| mirror_fs::Error::io(&config_path, e))?;
        let line = line.trim_start_matches([' ', '\t']);

        if !in_section {
            in_section = line.starts_with(&header);
        } else if let Some(url) = line.strip_prefix(URL_PREFIX) {
            return Ok(url.trim_end_matches(['\r', '\n', ' ', '\t']).to_string());
        }
    }

    Err(Error::NotAClone {
        path: path.to_native(),
    })
}

/// True iff nothing in the working tree differs from the last commit.
///
/// New (untracked) files count as modifications; ignored files do not.
pub fn is_working_tree_clean(path: &NormalizedPath) -> Result<bool> {
    let repo = Repository::open(path.to_native())?;
    is_clean(&repo)
}

pub(crate) fn is_clean(repo: &Repository) -> Result<bool> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false)
        .exclude_submodules(true);

    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(statuses
        .iter()
        .all(|entry| entry.status() == Status::CURRENT || entry.status() == Status::IGNORED))
}

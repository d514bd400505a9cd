//! Home directory expansion for configured paths

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Expand a leading `~` in `path` to the current user's home directory.
///
/// Only `~` and `~/...` are supported; `~user/...` forms are rejected with
/// [`Error::HomeExpansion`]. Paths without a leading `~` are returned as-is.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    expand_home_with(path, dirs::home_dir().as_deref())
}

pub(crate) fn expand_home_with(path: &str, home: Option<&Path>) -> Result<PathBuf> {
    let Some(rest) = path.strip_prefix('~') else {
        return Ok(PathBuf::from(path));
    };

    if !rest.is_empty() && !rest.starts_with('/') && !rest.starts_with('\\') {
        return Err(Error::HomeExpansion {
            path: path.to_string(),
        });
    }

    let home = home.ok_or(Error::HomeNotFound)?;
    let rest = rest.trim_start_matches(['/', '\\']);
    if rest.is_empty() {
        Ok(home.to_path_buf())
    } else {
        Ok(home.join(rest))
    }
}

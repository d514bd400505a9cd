//! SSH key credential resolution

use std::fmt;
use std::path::{Path, PathBuf};

use git2::{Cred, CredentialType};

use crate::{Error, Result};

/// Username used for SSH transports when the URL does not carry one.
pub const DEFAULT_SSH_USER: &str = "git";

/// A private-key credential resolved once at startup.
///
/// Only the key path is checked; the key bytes are read by libgit2 when a
/// transport asks for them.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    key_path: PathBuf,
    passphrase: Option<String>,
}

impl Credential {
    /// Resolve the configured key path and passphrase.
    ///
    /// Returns `Ok(None)` when no key path is configured, meaning remote
    /// operations run without an explicit key.
    ///
    /// # Errors
    ///
    /// - [`Error::KeyExpansion`] if the path uses an unsupported `~` form
    /// - [`Error::KeyNotFound`] if the expanded path does not exist
    pub fn resolve(key_path: &str, passphrase: &str) -> Result<Option<Self>> {
        let key_path = key_path.trim();
        if key_path.is_empty() {
            return Ok(None);
        }

        let expanded = mirror_fs::expand_home(key_path).map_err(|_| Error::KeyExpansion {
            path: key_path.to_string(),
        })?;

        if !expanded.exists() {
            return Err(Error::KeyNotFound { path: expanded });
        }

        Ok(Some(Self {
            key_path: expanded,
            passphrase: Some(passphrase).filter(|p| !p.is_empty()).map(String::from),
        }))
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn has_passphrase(&self) -> bool {
        self.passphrase.is_some()
    }

    fn to_cred(&self, username: &str) -> std::result::Result<Cred, git2::Error> {
        Cred::ssh_key(username, None, &self.key_path, self.passphrase.as_deref())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key_path", &self.key_path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Produce a credential for a libgit2 authentication request.
///
/// With a configured key the key is always offered. Without one, SSH
/// transports fall back to the agent and everything else to the default
/// (anonymous or helper-provided) credential.
pub(crate) fn answer(
    credential: Option<&Credential>,
    username_from_url: Option<&str>,
    allowed: CredentialType,
) -> std::result::Result<Cred, git2::Error> {
    let username = username_from_url.unwrap_or(DEFAULT_SSH_USER);

    if allowed.contains(CredentialType::USERNAME) {
        return Cred::username(username);
    }

    match credential {
        Some(credential) if allowed.contains(CredentialType::SSH_KEY) => {
            credential.to_cred(username)
        }
        None if allowed.contains(CredentialType::SSH_KEY) => Cred::ssh_key_from_agent(username),
        _ => Cred::default(),
    }
}

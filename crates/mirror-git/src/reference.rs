//! Resolution of the configured branch or tag

use std::fmt;

/// Branch used when neither a branch nor a tag is configured.
pub const DEFAULT_BRANCH: &str = "main";

/// The single remote reference a mirror tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceSpec {
    Branch(String),
    Tag(String),
}

impl ReferenceSpec {
    /// Pick the reference to mirror from the configured branch and tag.
    ///
    /// Empty strings count as unset. A tag wins over a branch, and with
    /// neither set the mirror follows [`DEFAULT_BRANCH`].
    pub fn resolve(branch: Option<&str>, tag: Option<&str>) -> Self {
        let branch = branch.map(str::trim).filter(|b| !b.is_empty());
        let tag = tag.map(str::trim).filter(|t| !t.is_empty());

        match (branch, tag) {
            (_, Some(tag)) => Self::Tag(tag.to_string()),
            (Some(branch), None) => Self::Branch(branch.to_string()),
            (None, None) => Self::Branch(DEFAULT_BRANCH.to_string()),
        }
    }

    /// Full reference name on the remote side.
    pub fn refname(&self) -> String {
        match self {
            Self::Branch(name) => format!("refs/heads/{name}"),
            Self::Tag(name) => format!("refs/tags/{name}"),
        }
    }

    /// Refspec that fetches only this reference from `remote`.
    pub fn fetch_refspec(&self, remote: &str) -> String {
        format!("+{}:{}", self.refname(), self.target_ref(remote))
    }

    /// Local reference that holds the fetched tip.
    pub fn target_ref(&self, remote: &str) -> String {
        match self {
            Self::Branch(name) => format!("refs/remotes/{remote}/{name}"),
            Self::Tag(name) => format!("refs/tags/{name}"),
        }
    }
}

impl fmt::Display for ReferenceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch(name) => write!(f, "branch {name}"),
            Self::Tag(name) => write!(f, "tag {name}"),
        }
    }
}

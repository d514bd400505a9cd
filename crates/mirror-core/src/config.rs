//! Sync configuration
//!
//! [`SyncConfiguration`] is built once at startup through
//! [`SyncConfiguration::builder`], validated, and then shared read-only for
//! the lifetime of the process. Every engine operation receives it
//! explicitly.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use mirror_fs::NormalizedPath;
use mirror_git::ReferenceSpec;

use crate::{Error, Result};

/// Default cadence between reconciliation ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default bound for a single clone or fetch.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default name of the remote the mirror fetches from.
pub const DEFAULT_REMOTE: &str = "origin";

/// The kind of repository a source URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Git,
    Unsupported,
}

impl SourceKind {
    /// Work out the source kind from its URL.
    pub fn detect(source: &str) -> Self {
        let source = source.trim();
        let is_git = source.starts_with("git@")
            || source.starts_with("ssh://")
            || source.starts_with("git://")
            || source.starts_with("file://")
            || ((source.starts_with("https://") || source.starts_with("http://"))
                && source.ends_with(".git"))
            || (Path::new(source).is_absolute() && source.ends_with(".git"));

        if is_git { Self::Git } else { Self::Unsupported }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Raw SSH key settings, resolved into a credential by the git driver.
#[derive(Clone, PartialEq, Eq)]
pub struct KeySettings {
    pub key_path: String,
    pub passphrase: String,
}

impl fmt::Debug for KeySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySettings")
            .field("key_path", &self.key_path)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// Immutable settings for one mirror.
#[derive(Debug, Clone)]
pub struct SyncConfiguration {
    kind: SourceKind,
    source: String,
    destination: NormalizedPath,
    poll_interval: Duration,
    reference: ReferenceSpec,
    upstream_remote: String,
    reset_on_drift: bool,
    key: Option<KeySettings>,
    operation_timeout: Duration,
}

impl SyncConfiguration {
    pub fn builder() -> SyncConfigurationBuilder {
        SyncConfigurationBuilder::default()
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &NormalizedPath {
        &self.destination
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn reference(&self) -> &ReferenceSpec {
        &self.reference
    }

    pub fn upstream_remote(&self) -> &str {
        &self.upstream_remote
    }

    pub fn reset_on_drift(&self) -> bool {
        self.reset_on_drift
    }

    pub fn key(&self) -> Option<&KeySettings> {
        self.key.as_ref()
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }
}

/// Builder collecting raw settings before validation.
#[derive(Debug, Clone, Default)]
pub struct SyncConfigurationBuilder {
    source: Option<String>,
    destination: Option<String>,
    poll_interval: Option<Duration>,
    branch: Option<String>,
    tag: Option<String>,
    upstream_remote: Option<String>,
    reset_on_drift: Option<bool>,
    key: Option<KeySettings>,
    operation_timeout: Option<Duration>,
}

impl SyncConfigurationBuilder {
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    pub fn tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    pub fn upstream_remote(mut self, remote: impl Into<String>) -> Self {
        self.upstream_remote = Some(remote.into());
        self
    }

    pub fn reset_on_drift(mut self, reset: bool) -> Self {
        self.reset_on_drift = Some(reset);
        self
    }

    /// Configure an SSH key. An empty path means no key.
    pub fn ssh_key(mut self, key_path: impl Into<String>, passphrase: impl Into<String>) -> Self {
        let key_path = key_path.into();
        self.key = if key_path.trim().is_empty() {
            None
        } else {
            Some(KeySettings {
                key_path,
                passphrase: passphrase.into(),
            })
        };
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Validate the collected settings.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when source or destination is empty, a
    /// duration is zero, the remote name is empty, or the destination
    /// cannot be made absolute.
    pub fn build(self) -> Result<SyncConfiguration> {
        let source = self
            .source
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::configuration("A source is required"))?;

        let destination = self
            .destination
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| Error::configuration("A destination is required"))?;
        let destination = std::path::absolute(&destination).map_err(|e| {
            Error::configuration(format!("Cannot resolve destination {destination}: {e}"))
        })?;

        let poll_interval = self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval.is_zero() {
            return Err(Error::configuration("The update interval must be positive"));
        }

        let operation_timeout = self.operation_timeout.unwrap_or(DEFAULT_OPERATION_TIMEOUT);
        if operation_timeout.is_zero() {
            return Err(Error::configuration("The operation timeout must be positive"));
        }

        let upstream_remote = self
            .upstream_remote
            .map(|r| r.trim().to_string())
            .unwrap_or_else(|| DEFAULT_REMOTE.to_string());
        if upstream_remote.is_empty() {
            return Err(Error::configuration("The upstream remote name cannot be empty"));
        }

        let branch = self.branch.as_deref().filter(|b| !b.trim().is_empty());
        let tag = self.tag.as_deref().filter(|t| !t.trim().is_empty());
        if let (Some(branch), Some(tag)) = (branch, tag) {
            tracing::warn!(branch, tag, "Both a branch and a tag are configured; using the tag");
        }
        let reference = ReferenceSpec::resolve(branch, tag);

        Ok(SyncConfiguration {
            kind: SourceKind::detect(&source),
            source,
            destination: NormalizedPath::new(destination),
            poll_interval,
            reference,
            upstream_remote,
            reset_on_drift: self.reset_on_drift.unwrap_or(true),
            key: self.key,
            operation_timeout,
        })
    }
}

/// Parse a duration such as `1h`, `30s`, `1h30m` or `1.5h`.
///
/// Accepts a sequence of decimal numbers, each followed by one of the units
/// `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`. A bare `0` is allowed.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || Error::configuration(format!("Invalid duration: {input:?}"));
    let mut rest = input.trim();
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total_nanos += value * scale;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Parse a boolean flag; `true`, `yes`, `on` and `1` (any case) are true,
/// anything else is false.
pub fn parse_flag(input: &str) -> bool {
    matches!(
        input.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("git@github.com:org/repo.git", SourceKind::Git)]
    #[case("https://github.com/org/repo.git", SourceKind::Git)]
    #[case("ssh://git@host:2222/org/repo.git", SourceKind::Git)]
    #[case("file:///srv/git/repo.git", SourceKind::Git)]
    #[case("/srv/git/repo.git", SourceKind::Git)]
    #[case("https://github.com/org/repo", SourceKind::Unsupported)]
    #[case("s3://bucket/prefix", SourceKind::Unsupported)]
    #[case("relative/repo.git", SourceKind::Unsupported)]
    fn test_detect_source_kind(#[case] source: &str, #[case] expected: SourceKind) {
        assert_eq!(SourceKind::detect(source), expected);
    }

    #[rstest]
    #[case("1h", Duration::from_secs(3600))]
    #[case("30s", Duration::from_secs(30))]
    #[case("1h30m", Duration::from_secs(5400))]
    #[case("1.5h", Duration::from_secs(5400))]
    #[case("250ms", Duration::from_millis(250))]
    #[case("2m10s", Duration::from_secs(130))]
    #[case("10us", Duration::from_micros(10))]
    #[case("0", Duration::ZERO)]
    fn test_parse_duration(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("10")]
    #[case("h")]
    #[case("5d")]
    #[case("-1s")]
    #[case("1h foo")]
    fn test_parse_duration_rejects(#[case] input: &str) {
        assert!(matches!(
            parse_duration(input),
            Err(Error::Configuration { .. })
        ));
    }

    #[rstest]
    #[case("true", true)]
    #[case("YES", true)]
    #[case("On", true)]
    #[case("1", true)]
    #[case("false", false)]
    #[case("0", false)]
    #[case("nope", false)]
    fn test_parse_flag(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(parse_flag(input), expected);
    }

    fn minimal() -> SyncConfigurationBuilder {
        SyncConfiguration::builder()
            .source("git@host:org/repo.git")
            .destination("/data/repo")
    }

    #[test]
    fn test_defaults() {
        let config = minimal().build().unwrap();
        assert_eq!(config.kind(), SourceKind::Git);
        assert_eq!(config.destination().as_str(), "/data/repo");
        assert_eq!(config.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(config.reference(), &ReferenceSpec::Branch("main".into()));
        assert_eq!(config.upstream_remote(), "origin");
        assert!(config.reset_on_drift());
        assert!(config.key().is_none());
        assert_eq!(config.operation_timeout(), DEFAULT_OPERATION_TIMEOUT);
    }

    #[test]
    fn test_missing_source() {
        let result = SyncConfiguration::builder().destination("/data/repo").build();
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_blank_destination() {
        let result = SyncConfiguration::builder()
            .source("git@host:org/repo.git")
            .destination("   ")
            .build();
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = minimal().poll_interval(Duration::ZERO).build();
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = minimal().operation_timeout(Duration::ZERO).build();
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_tag_wins_over_branch() {
        let config = minimal()
            .branch(Some("develop".into()))
            .tag(Some("v1.0.0".into()))
            .build()
            .unwrap();
        assert_eq!(config.reference(), &ReferenceSpec::Tag("v1.0.0".into()));
    }

    #[test]
    fn test_relative_destination_made_absolute() {
        let config = minimal().destination("mirror/repo").build().unwrap();
        assert!(config.destination().to_native().is_absolute());
        assert!(config.destination().as_str().ends_with("mirror/repo"));
    }

    #[test]
    fn test_empty_key_path_means_no_key() {
        let config = minimal().ssh_key("", "secret").build().unwrap();
        assert!(config.key().is_none());
    }

    #[test]
    fn test_key_settings_debug_redacted() {
        let config = minimal().ssh_key("~/.ssh/id_rsa", "secret").build().unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("id_rsa"));
        assert!(!debug.contains("secret"));
    }
}

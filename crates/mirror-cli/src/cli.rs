//! CLI argument parsing using clap derive
//!
//! Every setting can come from a flag or from its environment variable, so
//! the binary runs the same way under a scheduler that only sets env vars.

use std::time::Duration;

use clap::{ArgAction, Parser};
use mirror_core::SyncConfiguration;
use mirror_core::config::{parse_duration, parse_flag};

/// Keep a directory mirrored to a remote git branch or tag
#[derive(Parser, Debug)]
#[command(name = "mirror-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Remote repository URL
    #[arg(long, env = "SYNCER_SOURCE")]
    pub source: String,

    /// Local directory holding the mirror
    #[arg(long, env = "SYNCER_DEST")]
    pub dest: String,

    /// Time between update ticks (e.g. 1h, 15m, 30s)
    #[arg(long, env = "SYNCER_UPDATE_INTERVAL", default_value = "1h", value_parser = duration_arg)]
    pub interval: Duration,

    /// Branch to mirror
    #[arg(long, env = "SYNCER_GIT_BRANCH", default_value = "main")]
    pub branch: String,

    /// Tag to mirror; takes precedence over --branch
    #[arg(long, env = "SYNCER_GIT_TAG")]
    pub tag: Option<String>,

    /// Name of the remote to fetch from
    #[arg(long, env = "SYNCER_GIT_UPSTREAM", default_value = "origin")]
    pub upstream: String,

    /// Discard local changes instead of skipping the update
    #[arg(
        long,
        env = "SYNCER_GIT_RESET_ON_CHANGES",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = reset_arg
    )]
    pub reset_on_drift: bool,

    /// Private SSH key used for authentication (~ is expanded)
    #[arg(long, env = "SYNCER_SSH_KEY_FILENAME")]
    pub ssh_key: Option<String>,

    /// Passphrase for the SSH key
    #[arg(long, env = "SYNCER_SSH_KEY_PASSWORD", hide_env_values = true)]
    pub ssh_key_passphrase: Option<String>,

    /// Upper bound for a single clone or fetch
    #[arg(long, env = "SYNCER_OPERATION_TIMEOUT", default_value = "10m", value_parser = duration_arg)]
    pub operation_timeout: Duration,

    /// Port of the health endpoint
    #[arg(long, env = "NOMAD_PORT_http", default_value_t = 3000)]
    pub port: u16,

    /// Run initialization only and exit
    #[arg(long)]
    pub once: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Validate the arguments into a [`SyncConfiguration`].
    pub fn to_config(&self) -> mirror_core::Result<SyncConfiguration> {
        let mut builder = SyncConfiguration::builder()
            .source(self.source.as_str())
            .destination(self.dest.as_str())
            .poll_interval(self.interval)
            .branch(Some(self.branch.clone()))
            .tag(self.tag.clone())
            .upstream_remote(self.upstream.as_str())
            .reset_on_drift(self.reset_on_drift)
            .operation_timeout(self.operation_timeout);

        if let Some(key) = &self.ssh_key {
            builder = builder.ssh_key(
                key.as_str(),
                self.ssh_key_passphrase.as_deref().unwrap_or_default(),
            );
        }

        builder.build()
    }
}

fn duration_arg(value: &str) -> Result<Duration, String> {
    parse_duration(value).map_err(|e| e.to_string())
}

fn reset_arg(value: &str) -> Result<bool, String> {
    if value.trim().is_empty() {
        return Ok(true);
    }
    Ok(parse_flag(value))
}

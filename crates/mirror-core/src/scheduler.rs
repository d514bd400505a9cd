//! Periodic tick scheduler
//!
//! Runs one reconciliation tick at a time on the blocking pool, bounded by
//! the operation timeout plus a grace period. Owns the retry policy: drift
//! is logged and retried on the next tick, anything else ends the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::config::SyncConfiguration;
use crate::engine::TickOutcome;
use crate::source::SourceDriver;
use crate::{Error, Result};

/// Extra time a whole tick gets on top of the per-operation timeout.
pub const TICK_GRACE: Duration = Duration::from_secs(30);

/// Which driver operation a tick performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// First tick after startup
    Initialize,
    /// Every following tick
    Update,
}

/// Drives a [`SourceDriver`] on the configured poll interval.
pub struct Scheduler {
    driver: Arc<dyn SourceDriver>,
    config: Arc<SyncConfiguration>,
    grace: Duration,
}

impl Scheduler {
    pub fn new(driver: Box<dyn SourceDriver>, config: SyncConfiguration) -> Self {
        Self {
            driver: Arc::from(driver),
            config: Arc::new(config),
            grace: TICK_GRACE,
        }
    }

    /// Override the grace period added to the operation timeout.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn config(&self) -> &SyncConfiguration {
        &self.config
    }

    /// Upper bound for a single tick.
    pub fn tick_timeout(&self) -> Duration {
        self.config.operation_timeout().saturating_add(self.grace)
    }

    /// Run one tick of `phase` and report its raw result.
    ///
    /// # Errors
    ///
    /// Whatever the driver reports, [`Error::Stalled`] if the tick outlives
    /// [`tick_timeout`](Self::tick_timeout), or [`Error::TaskFailed`] if the
    /// blocking task panicked.
    pub async fn tick(&self, phase: Phase) -> Result<TickOutcome> {
        let driver = Arc::clone(&self.driver);
        let config = Arc::clone(&self.config);
        let task = tokio::task::spawn_blocking(move || match phase {
            Phase::Initialize => driver.initialize(&config),
            Phase::Update => driver.update(&config),
        });

        let limit = self.tick_timeout();
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(Error::TaskFailed {
                message: join_error.to_string(),
            }),
            Err(_) => Err(Error::Stalled { timeout: limit }),
        }
    }

    /// Run one tick and apply the retry policy.
    ///
    /// Returns `Ok(None)` when the tick hit recoverable drift.
    pub async fn step(&self, phase: Phase) -> Result<Option<TickOutcome>> {
        let dest = self.config.destination();
        match self.tick(phase).await {
            Ok(outcome) => {
                tracing::info!(dest = %dest, ?phase, head = %outcome.head(), "{outcome}");
                Ok(Some(outcome))
            }
            Err(e) if !e.is_fatal() => {
                tracing::warn!(dest = %dest, ?phase, error = %e, "Skipping tick, will retry");
                Ok(None)
            }
            Err(e) => {
                tracing::error!(dest = %dest, ?phase, error = %e, "Tick failed");
                Err(e)
            }
        }
    }

    /// Tick on the poll interval until a fatal error occurs.
    ///
    /// The first tick fires one interval from now; initialization is expected
    /// to have run already. A tick that overruns the interval delays the next
    /// one instead of causing a burst.
    pub async fn run(&self) -> Result<()> {
        let period = self.config.poll_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?period, "Starting update loop");
        loop {
            ticker.tick().await;
            self.step(Phase::Update).await?;
        }
    }
}

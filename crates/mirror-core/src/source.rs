//! Source driver abstraction
//!
//! Each kind of source is mirrored by a [`SourceDriver`]. Drivers are built
//! once at startup by the factory registered for their [`SourceKind`] in a
//! [`DriverRegistry`]; the factory is where per-kind configuration (such as
//! credential resolution) happens.

use std::collections::HashMap;

use crate::config::{SourceKind, SyncConfiguration};
use crate::engine::{ReconciliationEngine, TickOutcome};
use crate::{Error, Result};

/// Trait for kind-specific mirroring operations.
pub trait SourceDriver: Send + Sync {
    /// The source kind this driver mirrors.
    fn kind(&self) -> SourceKind;

    /// Bring the destination under management at startup.
    ///
    /// Must never clone over an existing clone; a matching clone is
    /// updated instead.
    fn initialize(&self, config: &SyncConfiguration) -> Result<TickOutcome>;

    /// Bring an already-managed destination up to date.
    fn update(&self, config: &SyncConfiguration) -> Result<TickOutcome>;
}

/// Builds a driver from the startup configuration.
pub type DriverFactory = fn(&SyncConfiguration) -> Result<Box<dyn SourceDriver>>;

/// Dispatch table from source kind to driver factory.
pub struct DriverRegistry {
    factories: HashMap<SourceKind, DriverFactory>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(SourceKind::Git, ReconciliationEngine::configure);
        registry
    }
}

impl DriverRegistry {
    /// Registry without any drivers.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register(&mut self, kind: SourceKind, factory: DriverFactory) {
        self.factories.insert(kind, factory);
    }

    /// Build the driver for the configured source.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedSource`] if no factory is registered for the
    /// configuration's kind; otherwise whatever the factory reports.
    pub fn configure(&self, config: &SyncConfiguration) -> Result<Box<dyn SourceDriver>> {
        let factory = self
            .factories
            .get(&config.kind())
            .ok_or_else(|| Error::UnsupportedSource {
                url: config.source().to_string(),
            })?;
        factory(config)
    }
}

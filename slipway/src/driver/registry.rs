//! Driver registry mapping `uses` identifiers to driver instances.

use super::Driver;
use crate::errors::LifecycleError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry for driver instances.
///
/// New drivers are added by registering additional implementations under a
/// namespaced identifier (e.g. `"arm/deploy"`, `"app/create"`); the
/// executor is never modified to learn about them. Registration replaces
/// any previous driver under the same identifier.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
}

impl DriverRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a driver under a `uses` identifier.
    pub fn register(&self, uses: impl Into<String>, driver: Arc<dyn Driver>) {
        self.drivers.write().insert(uses.into(), driver);
    }

    /// Resolves a `uses` identifier to its driver.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::DriverResolution`] if no driver is
    /// registered under the identifier.
    pub fn resolve(&self, uses: &str) -> Result<Arc<dyn Driver>, LifecycleError> {
        self.drivers
            .read()
            .get(uses)
            .cloned()
            .ok_or_else(|| LifecycleError::DriverResolution {
                uses: uses.to_string(),
            })
    }

    /// Checks whether a driver is registered under an identifier.
    #[must_use]
    pub fn has(&self, uses: &str) -> bool {
        self.drivers.read().contains_key(uses)
    }

    /// Lists registered identifiers in sorted order.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.drivers.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Removes all registered drivers.
    pub fn clear(&self) {
        self.drivers.write().clear();
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("driver_count", &self.drivers.read().len())
            .finish()
    }
}

//! Adapter detection, layered on top of explicit [Harness] construction.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::*;

static INSTALLED: Lazy<RwLock<AdapterRegistry>> = Lazy::new(RwLock::default);

/// Known adapters, probed in registration order
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    dependencies: Vec<(String, Arc<dyn DependencyAdapter>)>,
    doubles: Vec<(String, Arc<dyn DoublesAdapter>)>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_dependencies(
        &mut self,
        name: impl Into<String>,
        adapter: impl DependencyAdapter + 'static,
    ) -> &mut Self {
        self.dependencies.push((name.into(), Arc::new(adapter)));
        self
    }

    pub fn register_doubles(
        &mut self,
        name: impl Into<String>,
        adapter: impl DoublesAdapter + 'static,
    ) -> &mut Self {
        self.doubles.push((name.into(), Arc::new(adapter)));
        self
    }

    /// Pick the first adapter of each kind
    pub fn detect(&self) -> Result<Harness, WiringError> {
        let (di_name, dependencies) = self
            .dependencies
            .first()
            .ok_or(WiringError::AdapterNotFound {
                kind: "dependency injection",
            })?;
        let (doubles_name, doubles) = self
            .doubles
            .first()
            .ok_or(WiringError::AdapterNotFound { kind: "doubles" })?;
        debug!(dependencies = %di_name, doubles = %doubles_name, "detected adapters");
        Ok(Harness::from_shared(dependencies.clone(), doubles.clone()))
    }

    /// Solitary builder; a detection failure is reported by `compile`
    pub fn solitary<T: Injectable>(&self) -> SolitaryBuilder<T> {
        SolitaryBuilder::new(self.detect())
    }

    pub fn sociable<T: Injectable>(&self) -> SociableBuilder<T> {
        SociableBuilder::new(self.detect())
    }
}

/// Make a dependency-injection adapter available to [solitary] and [sociable]
pub fn install_dependency_adapter(name: impl Into<String>, adapter: impl DependencyAdapter + 'static) {
    INSTALLED.write().register_dependencies(name, adapter);
}

/// Make a doubles adapter available to [solitary] and [sociable]
pub fn install_doubles_adapter(name: impl Into<String>, adapter: impl DoublesAdapter + 'static) {
    INSTALLED.write().register_doubles(name, adapter);
}

/// Solitary builder using the installed adapters
pub fn solitary<T: Injectable>() -> SolitaryBuilder<T> {
    INSTALLED.read().solitary()
}

/// Sociable builder using the installed adapters
pub fn sociable<T: Injectable>() -> SociableBuilder<T> {
    INSTALLED.read().sociable()
}

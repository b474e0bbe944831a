//! Test-execution context.
//!
//! `TsmContext` is the explicit owner of everything one test execution shares: the
//! loaded pin map, the active sites and the diagnostics sink deprecated entry points
//! report to. Session registries and pin resolvers are created from it instead of living
//! in process-wide state, so two contexts never see each other's sessions.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tsm_sessions::{DcPowerSession, DriverOptions, InstrumentType, TsmContext};
//!
//! let context = TsmContext::load("tests/pin_maps/nidcpower.toml")?;
//! let mut registry = context.registry::<DcPowerSession>(InstrumentType::NiDcPower);
//! for resource in registry.resource_strings() {
//!     let session = DcPowerSession::open_resource(&resource, &DriverOptions::simulated())?;
//!     registry.register_resource(&resource, Arc::new(session))?;
//! }
//!
//! let (query, session, channels) = context.resolver(&registry).resolve_one("SystemPin1")?;
//! let volts = session.measure_voltage(&channels)?;
//! ```

use crate::channel::InstrumentType;
use crate::config::TsmConfig;
use crate::diagnostics::{DiagnosticsSink, TracingSink};
use crate::error::{TsmError, TsmResult};
use crate::pin_map::PinMap;
use crate::registry::SessionRegistry;
use crate::resolver::PinResolver;
use std::path::Path;
use std::sync::Arc;

/// Shared state of one test execution.
#[derive(Clone)]
pub struct TsmContext {
    pin_map: Arc<PinMap>,
    sites: Vec<u32>,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl TsmContext {
    /// Create a context over a pin map with every site active, reporting deprecations
    /// through `tracing`.
    #[must_use]
    pub fn new(pin_map: PinMap) -> Self {
        let sites = (0..pin_map.site_count()).collect();
        Self {
            pin_map: Arc::new(pin_map),
            sites,
            diagnostics: Arc::new(TracingSink),
        }
    }

    /// Load the pin map at `path` and create a context over it.
    pub fn load<P: AsRef<Path>>(path: P) -> TsmResult<Self> {
        Ok(Self::new(PinMap::load(path)?))
    }

    /// Create a context from loaded configuration.
    pub fn from_config(config: &TsmConfig) -> TsmResult<Self> {
        let context = Self::load(&config.pin_map)?;
        match &config.sites {
            Some(sites) => context.with_sites(sites),
            None => Ok(context),
        }
    }

    /// Replace the diagnostics sink.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Restrict the context to a subset of sites.
    ///
    /// Sites are kept in ascending order, each once.
    ///
    /// # Errors
    /// - `InvalidSite` for a site the pin map does not declare
    /// - `Configuration` for an empty list
    pub fn with_sites(mut self, sites: &[u32]) -> TsmResult<Self> {
        if sites.is_empty() {
            return Err(TsmError::Configuration(
                "a context needs at least one active site".to_string(),
            ));
        }
        let site_count = self.pin_map.site_count();
        if let Some(&site) = sites.iter().find(|&&s| s >= site_count) {
            return Err(TsmError::InvalidSite { site, site_count });
        }
        let mut sites = sites.to_vec();
        sites.sort_unstable();
        sites.dedup();
        self.sites = sites;
        Ok(self)
    }

    /// Loaded pin map
    #[must_use]
    pub fn pin_map(&self) -> &Arc<PinMap> {
        &self.pin_map
    }

    /// Active sites in ascending order
    #[must_use]
    pub fn sites(&self) -> &[u32] {
        &self.sites
    }

    /// Diagnostics sink shared with the registries this context creates
    #[must_use]
    pub fn diagnostics(&self) -> &Arc<dyn DiagnosticsSink> {
        &self.diagnostics
    }

    /// Create an empty session registry for an instrument category.
    #[must_use]
    pub fn registry<S>(&self, instrument_type: InstrumentType) -> SessionRegistry<S> {
        SessionRegistry::new(
            instrument_type,
            Arc::clone(&self.pin_map),
            Arc::clone(&self.diagnostics),
        )
    }

    /// Create a pin resolver over a registry, scoped to this context's sites.
    ///
    /// The registry must come from [`registry`](Self::registry) on this context or a clone
    /// of it, so wiring and sites refer to the same pin map.
    #[must_use]
    pub fn resolver<'a, S>(&'a self, registry: &'a SessionRegistry<S>) -> PinResolver<'a, S> {
        debug_assert!(
            Arc::ptr_eq(registry.pin_map(), &self.pin_map),
            "registry was created from a different pin map"
        );
        PinResolver::new(self, registry)
    }
}

impl std::fmt::Debug for TsmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TsmContext")
            .field("site_count", &self.pin_map.site_count())
            .field("sites", &self.sites)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin_map() -> PinMap {
        PinMap::from_toml_str(
            r#"
                site_count = 4
                dut_pins = ["A"]
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_all_sites_active_by_default() {
        let context = TsmContext::new(pin_map());
        assert_eq!(context.sites(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_with_sites() {
        let context = TsmContext::new(pin_map()).with_sites(&[3, 1, 3]).unwrap();
        assert_eq!(context.sites(), &[1, 3]);

        let result = TsmContext::new(pin_map()).with_sites(&[4]);
        assert!(matches!(
            result,
            Err(TsmError::InvalidSite {
                site: 4,
                site_count: 4
            })
        ));
        assert!(TsmContext::new(pin_map()).with_sites(&[]).is_err());
    }

    #[test]
    fn test_registries_share_pin_map() {
        let context = TsmContext::new(pin_map());
        let registry = context.registry::<()>(InstrumentType::NiDmm);
        assert!(Arc::ptr_eq(registry.pin_map(), context.pin_map()));

        // Site-scoped clones keep the pin map, so their resolvers accept the registry
        let scoped = context.clone().with_sites(&[2]).unwrap();
        let _ = scoped.resolver(&registry);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "registry was created from a different pin map")]
    fn test_resolver_rejects_foreign_registry() {
        let first = TsmContext::new(pin_map());
        let second = TsmContext::new(pin_map());
        let registry = first.registry::<()>(InstrumentType::NiDmm);
        let _ = second.resolver(&registry);
    }
}

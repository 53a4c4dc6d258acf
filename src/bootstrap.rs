//! Registry bootstrap: configure first, then bind.
//!
//! Configurers change registry-wide settings such as common tags. Binders
//! register meters. Every configurer runs before the first binder so that
//! meters registered by binders pick up the configured defaults.
//!
//! ```ignore
//! use meterwire::bootstrap::{CommonTags, RegistryBootstrap};
//! use meterwire::binder::UptimeMetrics;
//!
//! RegistryBootstrap::new()
//!     .configurer(CommonTags::new(Tags::from([("env", "prod")])))
//!     .binder(UptimeMetrics::new())
//!     .bind_all(&registry)?;
//! ```

use crate::error::{BootstrapPhase, MetricsError, Result};
use crate::registry::{MeterRegistry, Tags};
use tracing::{debug, error};

/// Mutates registry-wide configuration before any meter is bound.
///
/// Implemented for closures taking the registry.
pub trait RegistryConfigurer: Send + Sync {
    fn configure_registry(&self, registry: &MeterRegistry) -> Result<()>;
}

/// Registers a set of meters against a registry.
///
/// Implemented for closures taking the registry.
pub trait MeterBinder: Send + Sync {
    fn bind_to(&self, registry: &MeterRegistry) -> Result<()>;
}

impl<F> RegistryConfigurer for F
where
    F: Fn(&MeterRegistry) -> Result<()> + Send + Sync,
{
    fn configure_registry(&self, registry: &MeterRegistry) -> Result<()> {
        self(registry)
    }
}

impl<F> MeterBinder for F
where
    F: Fn(&MeterRegistry) -> Result<()> + Send + Sync,
{
    fn bind_to(&self, registry: &MeterRegistry) -> Result<()> {
        self(registry)
    }
}

/// Configurer that adds common tags.
#[derive(Debug, Clone)]
pub struct CommonTags {
    tags: Tags,
}

impl CommonTags {
    pub fn new(tags: Tags) -> Self {
        Self { tags }
    }
}

impl RegistryConfigurer for CommonTags {
    fn configure_registry(&self, registry: &MeterRegistry) -> Result<()> {
        registry.add_common_tags(&self.tags);
        Ok(())
    }
}

/// One-shot startup sequence for a registry.
///
/// Either collection may be absent, in which case that phase is skipped.
/// [`RegistryBootstrap::bind_all`] consumes the bootstrap, so a sequence runs
/// at most once.
#[derive(Default)]
pub struct RegistryBootstrap {
    configurers: Option<Vec<Box<dyn RegistryConfigurer>>>,
    binders: Option<Vec<Box<dyn MeterBinder>>>,
}

impl RegistryBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a configurer.
    pub fn configurer(mut self, configurer: impl RegistryConfigurer + 'static) -> Self {
        self.configurers
            .get_or_insert_with(Vec::new)
            .push(Box::new(configurer));
        self
    }

    /// Append a binder.
    pub fn binder(mut self, binder: impl MeterBinder + 'static) -> Self {
        self.binders.get_or_insert_with(Vec::new).push(Box::new(binder));
        self
    }

    /// Replace the configurer collection.
    pub fn with_configurers(mut self, configurers: Option<Vec<Box<dyn RegistryConfigurer>>>) -> Self {
        self.configurers = configurers;
        self
    }

    /// Replace the binder collection.
    pub fn with_binders(mut self, binders: Option<Vec<Box<dyn MeterBinder>>>) -> Self {
        self.binders = binders;
        self
    }

    /// Run all configurers, then all binders, in insertion order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing configurer or binder and returns
    /// [`MetricsError::Bootstrap`]; nothing after it runs.
    pub fn bind_all(self, registry: &MeterRegistry) -> Result<()> {
        let configurers = self.configurers.unwrap_or_default();
        let binders = self.binders.unwrap_or_default();

        for (index, configurer) in configurers.iter().enumerate() {
            configurer
                .configure_registry(registry)
                .map_err(|e| abort(BootstrapPhase::Configure, index, e))?;
        }

        for (index, binder) in binders.iter().enumerate() {
            binder
                .bind_to(registry)
                .map_err(|e| abort(BootstrapPhase::Bind, index, e))?;
        }

        debug!(
            configurers = configurers.len(),
            binders = binders.len(),
            meters = registry.len(),
            "Meter registry bootstrapped"
        );
        Ok(())
    }
}

fn abort(phase: BootstrapPhase, index: usize, source: MetricsError) -> MetricsError {
    error!(%phase, index, error = %source, "Meter registry bootstrap aborted");
    MetricsError::Bootstrap {
        phase,
        index,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_configurer_effects_visible_to_binders() {
        let registry = MeterRegistry::new();

        RegistryBootstrap::new()
            .binder(|r: &MeterRegistry| {
                r.gauge("queue_size", &Tags::empty(), || 4.0).map(|_| ())
            })
            .configurer(CommonTags::new(Tags::from([("env", "test")])))
            .bind_all(&registry)
            .unwrap();

        let gauge = registry.find("queue_size").gauge().unwrap();
        assert_eq!(gauge.id().tag("env"), Some("test"));
    }

    #[test]
    fn test_runs_in_discovery_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = MeterRegistry::new();

        let log = |name: &'static str| {
            let calls = calls.clone();
            move |_: &MeterRegistry| -> Result<()> {
                calls.lock().push(name);
                Ok(())
            }
        };

        RegistryBootstrap::new()
            .binder(log("b1"))
            .configurer(log("c1"))
            .binder(log("b2"))
            .configurer(log("c2"))
            .bind_all(&registry)
            .unwrap();

        assert_eq!(*calls.lock(), vec!["c1", "c2", "b1", "b2"]);
    }

    #[test]
    fn test_absent_collections_are_skipped() {
        let registry = MeterRegistry::new();
        RegistryBootstrap::new()
            .with_configurers(None)
            .with_binders(None)
            .bind_all(&registry)
            .unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failing_configurer_aborts_before_binders() {
        let registry = MeterRegistry::new();

        let err = RegistryBootstrap::new()
            .configurer(|_: &MeterRegistry| -> Result<()> {
                Err(MetricsError::invalid("metrics.common-tags", "malformed"))
            })
            .binder(|r: &MeterRegistry| {
                r.counter("never", &Tags::empty()).map(|_| ())
            })
            .bind_all(&registry)
            .unwrap_err();

        assert!(matches!(
            err,
            MetricsError::Bootstrap {
                phase: BootstrapPhase::Configure,
                index: 0,
                ..
            }
        ));
        assert!(registry.find("never").counter().is_none());
    }

    #[test]
    fn test_failing_binder_stops_later_binders() {
        let registry = MeterRegistry::new();
        registry.counter("taken", &Tags::empty()).unwrap();

        let err = RegistryBootstrap::new()
            .binder(|r: &MeterRegistry| {
                r.timer("taken", &Tags::empty()).map(|_| ())
            })
            .binder(|r: &MeterRegistry| {
                r.counter("after", &Tags::empty()).map(|_| ())
            })
            .bind_all(&registry)
            .unwrap_err();

        assert!(matches!(
            err,
            MetricsError::Bootstrap {
                phase: BootstrapPhase::Bind,
                index: 0,
                ..
            }
        ));
        assert!(registry.find("after").counter().is_none());
    }
}

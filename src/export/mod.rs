//! Export backends and the backend selector.
//!
//! One backend is chosen per process. Candidates are tried in priority order
//! (Datadog, Graphite, Ganglia, Prometheus); a candidate qualifies when its
//! Cargo feature is compiled in and its `*.enabled` property is true. If none
//! qualifies the registry is kept in memory only.
//!
//! # Example
//!
//! ```ignore
//! use meterwire::export::BackendSelector;
//! use meterwire::MetricsConfig;
//!
//! let config = MetricsConfig::from_env()?;
//! let backend = BackendSelector::new().select(&config)?;
//!
//! // Push backends publish on a background task
//! let publishing = backend.start();
//! ```

#[cfg(feature = "datadog")]
pub mod datadog;
#[cfg(feature = "ganglia")]
pub mod ganglia;
#[cfg(feature = "graphite")]
pub mod graphite;
pub mod naming;
#[cfg(feature = "prometheus")]
pub mod prometheus;
pub mod push;

pub use naming::HierarchicalNameMapper;
#[cfg(feature = "prometheus")]
pub use prometheus::PrometheusScrape;
pub use push::{PushExporter, PushHandle, PushRegistry};

use crate::clock::{Clock, SystemClock};
use crate::config::MetricsConfig;
use crate::error::Result;
use crate::registry::MeterRegistry;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Supported export backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Datadog,
    Graphite,
    Ganglia,
    Prometheus,
    /// In-memory only, nothing exported
    Simple,
}

impl BackendKind {
    /// Default candidate order.
    pub const PRIORITY: [BackendKind; 4] = [
        BackendKind::Datadog,
        BackendKind::Graphite,
        BackendKind::Ganglia,
        BackendKind::Prometheus,
    ];

    /// True if support for this backend is compiled in.
    pub fn is_available(self) -> bool {
        match self {
            Self::Datadog => cfg!(feature = "datadog"),
            Self::Graphite => cfg!(feature = "graphite"),
            Self::Ganglia => cfg!(feature = "ganglia"),
            Self::Prometheus => cfg!(feature = "prometheus"),
            Self::Simple => true,
        }
    }

    fn is_enabled(self, config: &MetricsConfig) -> bool {
        match self {
            Self::Datadog => config.datadog.enabled,
            Self::Graphite => config.graphite.enabled,
            Self::Ganglia => config.ganglia.enabled,
            Self::Prometheus => config.prometheus.enabled,
            Self::Simple => true,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Datadog => f.write_str("datadog"),
            Self::Graphite => f.write_str("graphite"),
            Self::Ganglia => f.write_str("ganglia"),
            Self::Prometheus => f.write_str("prometheus"),
            Self::Simple => f.write_str("simple"),
        }
    }
}

/// How a backend gets data out of the registry.
#[derive(Debug, Clone)]
pub enum Exporter {
    /// Pulled over HTTP
    #[cfg(feature = "prometheus")]
    Scrape(PrometheusScrape),
    /// Pushed every step
    Push(PushRegistry),
    None,
}

/// The selected backend and its registry.
#[derive(Debug, Clone)]
pub struct MetricsBackend {
    kind: BackendKind,
    registry: Arc<MeterRegistry>,
    exporter: Exporter,
}

impl MetricsBackend {
    pub fn new(kind: BackendKind, registry: Arc<MeterRegistry>, exporter: Exporter) -> Self {
        Self {
            kind,
            registry,
            exporter,
        }
    }

    /// In-memory backend around an existing registry.
    pub fn simple(registry: Arc<MeterRegistry>) -> Self {
        Self::new(BackendKind::Simple, registry, Exporter::None)
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn registry(&self) -> &Arc<MeterRegistry> {
        &self.registry
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    /// The scrape endpoint, for the Prometheus backend.
    #[cfg(feature = "prometheus")]
    pub fn scrape(&self) -> Option<&PrometheusScrape> {
        match &self.exporter {
            Exporter::Scrape(scrape) => Some(scrape),
            _ => None,
        }
    }

    /// Start publishing, for push backends. Must be called within a tokio
    /// runtime.
    pub fn start(&self) -> Option<PushHandle> {
        match &self.exporter {
            Exporter::Push(push) => Some(push.clone().start()),
            _ => None,
        }
    }
}

/// Chooses and builds the process's export backend.
#[derive(Debug)]
pub struct BackendSelector {
    candidates: Vec<BackendKind>,
    clock: Option<Arc<dyn Clock>>,
    existing: Option<MetricsBackend>,
}

impl Default for BackendSelector {
    fn default() -> Self {
        Self {
            candidates: BackendKind::PRIORITY.to_vec(),
            clock: None,
            existing: None,
        }
    }
}

impl BackendSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the candidate order.
    pub fn candidates(mut self, candidates: impl IntoIterator<Item = BackendKind>) -> Self {
        self.candidates = candidates.into_iter().collect();
        self
    }

    /// Time source for the new registry (default: system clock).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use this backend instead of building one.
    pub fn with_existing(mut self, backend: MetricsBackend) -> Self {
        self.existing = Some(backend);
        self
    }

    /// Select and build the backend.
    ///
    /// # Errors
    ///
    /// Fails when the winning candidate is misconfigured, e.g. Datadog
    /// without `datadog.api-key`.
    pub fn select(self, config: &MetricsConfig) -> Result<MetricsBackend> {
        if let Some(existing) = self.existing {
            debug!(backend = %existing.kind(), "Using caller-supplied metrics backend");
            return Ok(existing);
        }

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock::new()),
        };
        let registry = Arc::new(
            MeterRegistry::builder()
                .clock(clock)
                .common_tags(config.common_tags.clone())
                .build(),
        );

        let kind = self
            .candidates
            .iter()
            .copied()
            .find(|kind| kind.is_available() && kind.is_enabled(config))
            .unwrap_or(BackendKind::Simple);

        let exporter = build_exporter(kind, &registry, config)?;
        info!(backend = %kind, "Metrics backend selected");
        Ok(MetricsBackend::new(kind, registry, exporter))
    }
}

fn build_exporter(
    kind: BackendKind,
    registry: &Arc<MeterRegistry>,
    config: &MetricsConfig,
) -> Result<Exporter> {
    match kind {
        #[cfg(feature = "datadog")]
        BackendKind::Datadog => {
            let exporter = datadog::DatadogExporter::new(&config.datadog)?;
            Ok(Exporter::Push(PushRegistry::new(
                registry.clone(),
                Arc::new(exporter),
                config.datadog.step,
            )?))
        }
        #[cfg(feature = "graphite")]
        BackendKind::Graphite => Ok(Exporter::Push(PushRegistry::new(
            registry.clone(),
            Arc::new(graphite::GraphiteExporter::new(&config.graphite)),
            config.graphite.step,
        )?)),
        #[cfg(feature = "ganglia")]
        BackendKind::Ganglia => Ok(Exporter::Push(PushRegistry::new(
            registry.clone(),
            Arc::new(ganglia::GangliaExporter::new(&config.ganglia)),
            config.ganglia.step,
        )?)),
        #[cfg(feature = "prometheus")]
        BackendKind::Prometheus => Ok(Exporter::Scrape(
            PrometheusScrape::new(registry.clone()).with_descriptions(config.prometheus.descriptions),
        )),
        _ => Ok(Exporter::None),
    }
}

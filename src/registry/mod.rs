//! MeterRegistry - process-wide meter storage
//!
//! A registry maps `(name, tags)` to exactly one meter. Applications register
//! meters lazily, at the point of use, and keep recording into the returned
//! handle; asking again for the same name and tags returns the same instance.
//!
//! # Example
//!
//! ```ignore
//! use meterwire::registry::{MeterRegistry, Tags};
//! use std::time::Duration;
//!
//! let registry = MeterRegistry::builder()
//!     .common_tags(Tags::from([("app", "orders")]))
//!     .build();
//!
//! registry.counter("jobs_total", &Tags::from([("status", "completed")]))?.increment();
//! registry.timer("job_duration", &Tags::empty())?.record(Duration::from_millis(120));
//!
//! let jobs = registry.find("jobs_total").tag("status", "completed").counter();
//! ```

mod search;
mod snapshot;
mod tags;
mod types;

pub use search::Search;
pub use snapshot::{Measurement, MeterSnapshot, MeterValue, Statistic};
pub use tags::{Tag, Tags};
pub use types::{
    Counter, Gauge, LongTaskSample, LongTaskTimer, Meter, MeterId, MeterKind, Timer,
    QUANTILE_WINDOW,
};

use crate::clock::{Clock, SystemClock};
use crate::error::{MetricsError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Central registry for application meters.
///
/// Safe to share across threads; meters record without caller-side locking.
pub struct MeterRegistry {
    clock: Arc<dyn Clock>,
    common_tags: RwLock<Tags>,
    meters: RwLock<HashMap<MeterId, Meter>>,
}

impl MeterRegistry {
    /// Create a registry on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create a registry on the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            common_tags: RwLock::new(Tags::empty()),
            meters: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new builder.
    pub fn builder() -> MeterRegistryBuilder {
        MeterRegistryBuilder::default()
    }

    /// The registry's time source.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Add tags to every meter registered from now on.
    ///
    /// Tags passed at registration win over common tags with the same key.
    pub fn add_common_tags(&self, tags: &Tags) {
        let mut common = self.common_tags.write();
        *common = std::mem::take(&mut *common).and_tags(tags);
    }

    /// Current common tags.
    pub fn common_tags(&self) -> Tags {
        self.common_tags.read().clone()
    }

    /// Get or register a counter.
    pub fn counter(&self, name: &str, tags: &Tags) -> Result<Arc<Counter>> {
        self.get_or_register(
            name,
            tags,
            MeterKind::Counter,
            |m| match m {
                Meter::Counter(c) => Some(c.clone()),
                _ => None,
            },
            |id| Meter::Counter(Arc::new(Counter::new(id))),
        )
    }

    /// Get or register a timer.
    pub fn timer(&self, name: &str, tags: &Tags) -> Result<Arc<Timer>> {
        self.timer_with_quantiles(name, tags, &[])
    }

    /// Get or register a timer that also tracks the given quantiles.
    ///
    /// Quantiles only take effect when the timer is first registered. Each
    /// one is also published as a `<name>.quantiles` gauge tagged
    /// `quantile=<q>`, in seconds.
    pub fn timer_with_quantiles(
        &self,
        name: &str,
        tags: &Tags,
        quantiles: &[f64],
    ) -> Result<Arc<Timer>> {
        let timer = self.get_or_register(
            name,
            tags,
            MeterKind::Timer,
            |m| match m {
                Meter::Timer(t) => Some(t.clone()),
                _ => None,
            },
            |id| Meter::Timer(Arc::new(Timer::new(id, quantiles))),
        )?;

        let gauge_name = format!("{name}.quantiles");
        for &q in timer.quantiles() {
            let source = timer.clone();
            let gauge_tags = tags.clone().and("quantile", q.to_string());
            let registered = self.gauge(&gauge_name, &gauge_tags, move || {
                source
                    .quantile_values()
                    .into_iter()
                    .find(|(p, _)| *p == q)
                    .map_or(0.0, |(_, value)| value.as_secs_f64())
            });
            if let Err(e) = registered {
                warn!(name = %gauge_name, quantile = q, error = %e, "Failed to register quantile gauge");
            }
        }
        Ok(timer)
    }

    /// Get or register a gauge backed by `supplier`.
    ///
    /// If the gauge already exists the new supplier is discarded.
    pub fn gauge<F>(&self, name: &str, tags: &Tags, supplier: F) -> Result<Arc<Gauge>>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        self.get_or_register(
            name,
            tags,
            MeterKind::Gauge,
            |m| match m {
                Meter::Gauge(g) => Some(g.clone()),
                _ => None,
            },
            |id| Meter::Gauge(Arc::new(Gauge::new(id, Box::new(supplier)))),
        )
    }

    /// Get or register a long task timer.
    pub fn long_task_timer(&self, name: &str, tags: &Tags) -> Result<Arc<LongTaskTimer>> {
        let clock = self.clock.clone();
        self.get_or_register(
            name,
            tags,
            MeterKind::LongTaskTimer,
            |m| match m {
                Meter::LongTaskTimer(t) => Some(t.clone()),
                _ => None,
            },
            |id| Meter::LongTaskTimer(Arc::new(LongTaskTimer::new(id, clock))),
        )
    }

    /// Start a search for meters with this name.
    pub fn find(&self, name: &str) -> Search<'_> {
        Search::new(self, name)
    }

    /// All registered meters, ordered by id.
    pub fn meters(&self) -> Vec<Meter> {
        let mut meters: Vec<Meter> = self.meters.read().values().cloned().collect();
        meters.sort_by(|a, b| a.id().cmp(b.id()));
        meters
    }

    /// Read every meter, ordered by id.
    pub fn snapshot(&self) -> Vec<MeterSnapshot> {
        self.meters().iter().map(MeterSnapshot::of).collect()
    }

    /// Number of registered meters.
    pub fn len(&self) -> usize {
        self.meters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.read().is_empty()
    }

    /// Remove every meter (primarily for testing).
    pub fn clear(&self) {
        self.meters.write().clear();
    }

    pub(crate) fn matching(&self, name: &str, filter: &Tags) -> Vec<Meter> {
        let mut found: Vec<Meter> = self
            .meters
            .read()
            .values()
            .filter(|m| m.id().name() == name && m.id().tags().contains_all(filter))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id().cmp(b.id()));
        found
    }

    fn get_or_register<T>(
        &self,
        name: &str,
        tags: &Tags,
        kind: MeterKind,
        extract: impl Fn(&Meter) -> Option<Arc<T>>,
        create: impl FnOnce(MeterId) -> Meter,
    ) -> Result<Arc<T>> {
        if name.trim().is_empty() {
            return Err(MetricsError::InvalidName {
                name: name.to_string(),
            });
        }
        let id = MeterId::new(name, self.common_tags().and_tags(tags));

        // Fast path: meter already registered
        {
            let meters = self.meters.read();
            if let Some(existing) = meters.get(&id) {
                return Self::expect_kind(existing, kind, &extract);
            }
        }

        // Slow path: register under the write lock
        let mut meters = self.meters.write();
        let meter = meters
            .entry(id.clone())
            .or_insert_with(|| create(id));
        Self::expect_kind(meter, kind, &extract)
    }

    fn expect_kind<T>(
        meter: &Meter,
        requested: MeterKind,
        extract: &impl Fn(&Meter) -> Option<Arc<T>>,
    ) -> Result<Arc<T>> {
        extract(meter).ok_or_else(|| MetricsError::MeterTypeConflict {
            name: meter.id().name().to_string(),
            existing: meter.kind(),
            requested,
        })
    }
}

impl Default for MeterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MeterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterRegistry")
            .field("common_tags", &*self.common_tags.read())
            .field("meters", &self.len())
            .finish()
    }
}

/// Builder for MeterRegistry.
#[derive(Default)]
pub struct MeterRegistryBuilder {
    clock: Option<Arc<dyn Clock>>,
    common_tags: Tags,
}

impl MeterRegistryBuilder {
    /// Use this clock instead of the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Tags added to every meter.
    pub fn common_tags(mut self, tags: Tags) -> Self {
        self.common_tags = self.common_tags.and_tags(&tags);
        self
    }

    /// Build the MeterRegistry.
    pub fn build(self) -> MeterRegistry {
        let registry = match self.clock {
            Some(clock) => MeterRegistry::with_clock(clock),
            None => MeterRegistry::new(),
        };
        registry.add_common_tags(&self.common_tags);
        registry
    }
}

//! Core meter types: Counter, Timer, Gauge, LongTaskTimer
//!
//! Thread-safe meter primitives. Every meter carries its own id so it can be
//! handed out by `Arc` and recorded into without going back to the registry.

use super::tags::Tags;
use crate::clock::{elapsed_since, Clock};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Identity of a meter: its name and full tag set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeterId {
    name: String,
    tags: Tags,
}

impl MeterId {
    pub fn new(name: impl Into<String>, tags: Tags) -> Self {
        Self {
            name: name.into(),
            tags,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Value of one tag.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key)
    }
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.tags)
    }
}

/// The kind of instrument behind a [`MeterId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeterKind {
    Counter,
    Gauge,
    Timer,
    LongTaskTimer,
}

impl fmt::Display for MeterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter => f.write_str("counter"),
            Self::Gauge => f.write_str("gauge"),
            Self::Timer => f.write_str("timer"),
            Self::LongTaskTimer => f.write_str("long task timer"),
        }
    }
}

/// Monotonically increasing count (e.g., total requests, errors).
#[derive(Debug)]
pub struct Counter {
    id: MeterId,
    value: AtomicU64,
}

impl Counter {
    pub(crate) fn new(id: MeterId) -> Self {
        Self {
            id,
            value: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &MeterId {
        &self.id
    }

    /// Increment by 1.
    pub fn increment(&self) {
        self.increment_by(1);
    }

    /// Increment by `amount`.
    pub fn increment_by(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    /// Current count.
    pub fn count(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Value read from a supplier each time the gauge is observed.
pub struct Gauge {
    id: MeterId,
    supplier: Box<dyn Fn() -> f64 + Send + Sync>,
}

impl Gauge {
    pub(crate) fn new(id: MeterId, supplier: Box<dyn Fn() -> f64 + Send + Sync>) -> Self {
        Self { id, supplier }
    }

    pub fn id(&self) -> &MeterId {
        &self.id
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        (self.supplier)()
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Number of recent samples kept for client-side quantiles.
pub const QUANTILE_WINDOW: usize = 1024;

/// Bounded window of recent samples used to estimate quantiles.
#[derive(Debug)]
struct QuantileWindow {
    quantiles: Vec<f64>,
    samples: Mutex<VecDeque<u64>>,
}

impl QuantileWindow {
    fn new(quantiles: &[f64]) -> Self {
        let mut quantiles: Vec<f64> = quantiles
            .iter()
            .copied()
            .filter(|q| (0.0..=1.0).contains(q))
            .collect();
        quantiles.sort_by(|a, b| a.total_cmp(b));
        quantiles.dedup();
        Self {
            quantiles,
            samples: Mutex::new(VecDeque::with_capacity(QUANTILE_WINDOW)),
        }
    }

    fn record(&self, nanos: u64) {
        let mut samples = self.samples.lock();
        if samples.len() == QUANTILE_WINDOW {
            samples.pop_front();
        }
        samples.push_back(nanos);
    }

    fn values(&self) -> Vec<(f64, Duration)> {
        let mut sorted: Vec<u64> = self.samples.lock().iter().copied().collect();
        sorted.sort_unstable();
        self.quantiles
            .iter()
            .map(|&q| (q, Duration::from_nanos(rank(&sorted, q))))
            .collect()
    }
}

/// Nearest-rank quantile of sorted samples.
fn rank(sorted: &[u64], q: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let position = (q * sorted.len() as f64).ceil() as usize;
    sorted[position.clamp(1, sorted.len()) - 1]
}

/// Records the count, total and maximum of short-lived operations.
#[derive(Debug)]
pub struct Timer {
    id: MeterId,
    count: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
    window: Option<QuantileWindow>,
}

impl Timer {
    pub(crate) fn new(id: MeterId, quantiles: &[f64]) -> Self {
        Self {
            id,
            count: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            max_nanos: AtomicU64::new(0),
            window: (!quantiles.is_empty()).then(|| QuantileWindow::new(quantiles)),
        }
    }

    pub fn id(&self) -> &MeterId {
        &self.id
    }

    /// Record one observation.
    pub fn record(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
        if let Some(window) = &self.window {
            window.record(nanos);
        }
    }

    /// Number of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of all observations.
    pub fn total_time(&self) -> Duration {
        Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed))
    }

    /// Largest single observation.
    pub fn max(&self) -> Duration {
        Duration::from_nanos(self.max_nanos.load(Ordering::Relaxed))
    }

    pub fn mean(&self) -> Duration {
        match self.count() {
            0 => Duration::ZERO,
            n => self.total_time() / u32::try_from(n).unwrap_or(u32::MAX),
        }
    }

    /// Configured quantiles, ascending.
    pub fn quantiles(&self) -> &[f64] {
        self.window.as_ref().map(|w| w.quantiles.as_slice()).unwrap_or(&[])
    }

    /// Quantile estimates over the recent-sample window.
    pub fn quantile_values(&self) -> Vec<(f64, Duration)> {
        self.window.as_ref().map(QuantileWindow::values).unwrap_or_default()
    }
}

/// Tracks operations that are still running.
#[derive(Debug)]
pub struct LongTaskTimer {
    id: MeterId,
    clock: Arc<dyn Clock>,
    next_task: AtomicU64,
    tasks: Mutex<HashMap<u64, u64>>,
}

impl LongTaskTimer {
    pub(crate) fn new(id: MeterId, clock: Arc<dyn Clock>) -> Self {
        Self {
            id,
            clock,
            next_task: AtomicU64::new(0),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &MeterId {
        &self.id
    }

    /// Mark a task as started.
    pub fn start(self: &Arc<Self>) -> LongTaskSample {
        let task = self.next_task.fetch_add(1, Ordering::Relaxed);
        self.tasks.lock().insert(task, self.clock.monotonic_nanos());
        LongTaskSample {
            timer: Arc::clone(self),
            task,
            stopped: false,
        }
    }

    /// Number of tasks started and not yet stopped.
    pub fn active_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Combined running time of all in-flight tasks.
    pub fn duration(&self) -> Duration {
        let now = self.clock.monotonic_nanos();
        let tasks = self.tasks.lock();
        tasks
            .values()
            .map(|&start| Duration::from_nanos(now.saturating_sub(start)))
            .sum()
    }

    fn stop(&self, task: u64) -> Duration {
        match self.tasks.lock().remove(&task) {
            Some(start) => elapsed_since(self.clock.as_ref(), start),
            None => Duration::ZERO,
        }
    }
}

/// Handle to one in-flight long task.
///
/// Dropping the handle without calling [`LongTaskSample::stop`] stops the
/// task, so the active count cannot leak on early returns or panics.
#[derive(Debug)]
pub struct LongTaskSample {
    timer: Arc<LongTaskTimer>,
    task: u64,
    stopped: bool,
}

impl LongTaskSample {
    /// Stop the task and return how long it ran.
    pub fn stop(mut self) -> Duration {
        self.stopped = true;
        self.timer.stop(self.task)
    }

    /// The timer this sample belongs to.
    pub fn timer(&self) -> &Arc<LongTaskTimer> {
        &self.timer
    }
}

impl Drop for LongTaskSample {
    fn drop(&mut self) {
        if !self.stopped {
            self.timer.stop(self.task);
        }
    }
}

/// A registered meter of any kind.
#[derive(Debug, Clone)]
pub enum Meter {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    Timer(Arc<Timer>),
    LongTaskTimer(Arc<LongTaskTimer>),
}

impl Meter {
    pub fn id(&self) -> &MeterId {
        match self {
            Self::Counter(m) => m.id(),
            Self::Gauge(m) => m.id(),
            Self::Timer(m) => m.id(),
            Self::LongTaskTimer(m) => m.id(),
        }
    }

    pub fn kind(&self) -> MeterKind {
        match self {
            Self::Counter(_) => MeterKind::Counter,
            Self::Gauge(_) => MeterKind::Gauge,
            Self::Timer(_) => MeterKind::Timer,
            Self::LongTaskTimer(_) => MeterKind::LongTaskTimer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn id(name: &str) -> MeterId {
        MeterId::new(name, Tags::empty())
    }

    #[test]
    fn test_counter_basic() {
        let counter = Counter::new(id("jobs"));
        counter.increment();
        counter.increment_by(4);
        assert_eq!(counter.count(), 5);
    }

    #[test]
    fn test_gauge_reads_supplier() {
        let source = Arc::new(AtomicU64::new(3));
        let reader = source.clone();
        let gauge = Gauge::new(
            id("queue"),
            Box::new(move || reader.load(Ordering::Relaxed) as f64),
        );
        assert_eq!(gauge.value(), 3.0);
        source.store(7, Ordering::Relaxed);
        assert_eq!(gauge.value(), 7.0);
    }

    #[test]
    fn test_timer_statistics() {
        let timer = Timer::new(id("t"), &[]);
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(30));

        assert_eq!(timer.count(), 2);
        assert_eq!(timer.total_time(), Duration::from_millis(40));
        assert_eq!(timer.max(), Duration::from_millis(30));
        assert_eq!(timer.mean(), Duration::from_millis(20));
        assert!(timer.quantile_values().is_empty());
    }

    #[test]
    fn test_timer_quantiles() {
        let timer = Timer::new(id("t"), &[0.95, 0.5, 2.0]);
        for ms in 1..=100 {
            timer.record(Duration::from_millis(ms));
        }

        assert_eq!(timer.quantiles(), &[0.5, 0.95]);
        let values = timer.quantile_values();
        assert_eq!(values[0], (0.5, Duration::from_millis(50)));
        assert_eq!(values[1], (0.95, Duration::from_millis(95)));
    }

    #[test]
    fn test_quantile_window_is_bounded() {
        let timer = Timer::new(id("t"), &[1.0]);
        for _ in 0..QUANTILE_WINDOW {
            timer.record(Duration::from_secs(10));
        }
        for _ in 0..QUANTILE_WINDOW {
            timer.record(Duration::from_millis(1));
        }
        assert_eq!(timer.quantile_values()[0].1, Duration::from_millis(1));
        assert_eq!(timer.max(), Duration::from_secs(10));
    }

    #[test]
    fn test_long_task_timer_active_count() {
        let clock = Arc::new(MockClock::new());
        let timer = Arc::new(LongTaskTimer::new(id("long"), clock.clone()));

        let first = timer.start();
        let second = timer.start();
        assert_eq!(timer.active_tasks(), 2);

        clock.add(Duration::from_secs(3));
        assert_eq!(timer.duration(), Duration::from_secs(6));

        assert_eq!(first.stop(), Duration::from_secs(3));
        assert_eq!(timer.active_tasks(), 1);

        drop(second);
        assert_eq!(timer.active_tasks(), 0);
        assert_eq!(timer.duration(), Duration::ZERO);
    }
}

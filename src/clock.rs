//! Time sources for meters and interceptors.
//!
//! Durations are always measured on the monotonic clock; the wall clock is
//! only used to stamp exported samples.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A pair of wall and monotonic time sources.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Milliseconds since the Unix epoch.
    fn wall_time_millis(&self) -> i64;

    /// Nanoseconds from an arbitrary, fixed origin. Never goes backwards.
    fn monotonic_nanos(&self) -> u64;
}

/// The process clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock anchored at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn wall_time_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn monotonic_nanos(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Manually advanced clock for tests.
///
/// Both the wall and the monotonic reading move together on [`MockClock::add`].
#[derive(Debug, Default)]
pub struct MockClock {
    wall_millis: AtomicI64,
    nanos: AtomicU64,
}

impl MockClock {
    /// Create a clock at wall time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at the given wall time.
    pub fn at_wall_millis(millis: i64) -> Self {
        Self {
            wall_millis: AtomicI64::new(millis),
            nanos: AtomicU64::new(0),
        }
    }

    /// Advance the clock.
    pub fn add(&self, amount: Duration) {
        let nanos = u64::try_from(amount.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
        let millis = i64::try_from(amount.as_millis()).unwrap_or(i64::MAX);
        self.wall_millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn wall_time_millis(&self) -> i64 {
        self.wall_millis.load(Ordering::SeqCst)
    }

    fn monotonic_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

/// Elapsed time between two monotonic readings, clamped at zero.
pub(crate) fn elapsed_since(clock: &dyn Clock, start_nanos: u64) -> Duration {
    Duration::from_nanos(clock.monotonic_nanos().saturating_sub(start_nanos))
}

//! Timing descriptors attached to routes and tasks.

use crate::registry::Tags;

/// How a [`Timed`] descriptor names its timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerName {
    /// An explicit metric name
    Declared(String),
    /// The configured server request timer name (`http_server_requests`)
    ServerRequests,
    /// No name: the descriptor does not instrument anything
    Missing,
}

/// Declares that a route or task is timed, and how.
///
/// A descriptor without a metric name is an explicit opt-out: declaring
/// `Timed::unnamed()` creates no meters.
///
/// ```ignore
/// // Request timer with an extra static tag
/// Timed::server_requests().extra_tag("public", "true");
///
/// // In-progress timer while the request runs
/// Timed::named("my_long_request").extra_tag("region", "test").long_task();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Timed {
    name: TimerName,
    extra_tags: Tags,
    long_task: bool,
    quantiles: Vec<f64>,
}

impl Timed {
    /// Timer with an explicit name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let name = if name.trim().is_empty() {
            TimerName::Missing
        } else {
            TimerName::Declared(name)
        };
        Self::with_name(name)
    }

    /// Timer under the configured server request name.
    pub fn server_requests() -> Self {
        Self::with_name(TimerName::ServerRequests)
    }

    /// Descriptor without a metric name; never instruments.
    pub fn unnamed() -> Self {
        Self::with_name(TimerName::Missing)
    }

    fn with_name(name: TimerName) -> Self {
        Self {
            name,
            extra_tags: Tags::empty(),
            long_task: false,
            quantiles: Vec::new(),
        }
    }

    /// Add a static tag to every observation.
    pub fn extra_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_tags = self.extra_tags.and(key, value);
        self
    }

    /// Add static tags to every observation.
    pub fn extra_tags(mut self, tags: &Tags) -> Self {
        self.extra_tags = self.extra_tags.and_tags(tags);
        self
    }

    /// Track the operation as a long task (active count while running)
    /// instead of recording a completed duration.
    pub fn long_task(mut self) -> Self {
        self.long_task = true;
        self
    }

    /// Quantiles to publish for the timer.
    pub fn quantiles(mut self, quantiles: &[f64]) -> Self {
        self.quantiles = quantiles.to_vec();
        self
    }

    pub fn name(&self) -> &TimerName {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.extra_tags
    }

    pub fn is_long_task(&self) -> bool {
        self.long_task
    }

    pub fn quantile_list(&self) -> &[f64] {
        &self.quantiles
    }

    /// False for descriptors that opt out.
    pub fn is_named(&self) -> bool {
        self.name != TimerName::Missing
    }

    /// Resolve the metric name. `server_requests` is the name used for
    /// [`TimerName::ServerRequests`]; pass `None` where no such default
    /// applies.
    pub fn resolve_name<'a>(&'a self, server_requests: Option<&'a str>) -> Option<&'a str> {
        match &self.name {
            TimerName::Declared(name) => Some(name.as_str()),
            TimerName::ServerRequests => server_requests,
            TimerName::Missing => None,
        }
    }
}

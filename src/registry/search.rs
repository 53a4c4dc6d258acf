//! Lookup of registered meters by name and a subset of tags.

use super::tags::Tags;
use super::types::{Counter, Gauge, LongTaskTimer, Meter, Timer};
use super::MeterRegistry;
use std::sync::Arc;

/// Query against a [`MeterRegistry`].
///
/// Matches meters with the given name whose tags include every filter tag.
///
/// ```ignore
/// let timer = registry
///     .find("http_server_requests")
///     .tag("uri", "/api/c1/{id}")
///     .timer();
/// ```
#[derive(Debug)]
pub struct Search<'a> {
    registry: &'a MeterRegistry,
    name: String,
    tags: Tags,
}

impl<'a> Search<'a> {
    pub(crate) fn new(registry: &'a MeterRegistry, name: &str) -> Self {
        Self {
            registry,
            name: name.to_string(),
            tags: Tags::empty(),
        }
    }

    /// Require a tag value.
    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.tags = self.tags.and(key, value);
        self
    }

    /// Require all of the given tags.
    pub fn tags(mut self, tags: &Tags) -> Self {
        self.tags = self.tags.and_tags(tags);
        self
    }

    /// All matching meters, ordered by id.
    pub fn meters(&self) -> Vec<Meter> {
        self.registry.matching(&self.name, &self.tags)
    }

    pub fn timer(&self) -> Option<Arc<Timer>> {
        self.meters().into_iter().find_map(|m| match m {
            Meter::Timer(t) => Some(t),
            _ => None,
        })
    }

    pub fn counter(&self) -> Option<Arc<Counter>> {
        self.meters().into_iter().find_map(|m| match m {
            Meter::Counter(c) => Some(c),
            _ => None,
        })
    }

    pub fn gauge(&self) -> Option<Arc<Gauge>> {
        self.meters().into_iter().find_map(|m| match m {
            Meter::Gauge(g) => Some(g),
            _ => None,
        })
    }

    pub fn long_task_timer(&self) -> Option<Arc<LongTaskTimer>> {
        self.meters().into_iter().find_map(|m| match m {
            Meter::LongTaskTimer(t) => Some(t),
            _ => None,
        })
    }
}

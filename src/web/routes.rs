//! Per-route timing table.
//!
//! Routes are registered with their URI template, e.g. `/api/c1/{id}`, and
//! the timing descriptors that apply to them. The server layer consults the
//! table on every request; routes that are not in the table cost nothing.
//!
//! Templates support literal segments, `{name}` captures, `{name:regex}`
//! captures and a trailing `{*rest}` catch-all.

use super::timed::Timed;
use crate::error::{MetricsError, Result};
use http::Method;
use regex::Regex;
use tracing::debug;

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Capture(Option<Regex>),
    CatchAll,
}

/// A parsed URI template.
#[derive(Debug, Clone)]
pub struct RouteTemplate {
    pattern: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    /// Parse a template such as `/api/c1/{id}` or `/regex/{id:\.[a-z]+}`.
    pub fn parse(pattern: &str) -> Result<Self> {
        if !pattern.starts_with('/') {
            return Err(MetricsError::invalid(
                format!("route {pattern}"),
                "template must start with '/'",
            ));
        }

        let parts: Vec<&str> = split_path(pattern).collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(inner) if inner.starts_with('*') => {
                    if i + 1 != parts.len() {
                        return Err(MetricsError::invalid(
                            format!("route {pattern}"),
                            "catch-all must be the last segment",
                        ));
                    }
                    Segment::CatchAll
                }
                Some(inner) => match inner.split_once(':') {
                    Some((_, expr)) => {
                        let regex = Regex::new(&format!("^(?:{expr})$")).map_err(|e| {
                            MetricsError::invalid(format!("route {pattern}"), e.to_string())
                        })?;
                        Segment::Capture(Some(regex))
                    }
                    None => Segment::Capture(None),
                },
                None => Segment::Literal((*part).to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    /// The template as registered.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// True if a concrete request path matches this template.
    pub fn matches(&self, path: &str) -> bool {
        let mut parts = split_path(path);
        for segment in &self.segments {
            match segment {
                Segment::CatchAll => return parts.next().is_some(),
                Segment::Literal(literal) => {
                    if parts.next() != Some(literal.as_str()) {
                        return false;
                    }
                }
                Segment::Capture(regex) => match parts.next() {
                    Some(value) if !value.is_empty() => {
                        if let Some(regex) = regex {
                            if !regex.is_match(value) {
                                return false;
                            }
                        }
                    }
                    _ => return false,
                },
            }
        }
        parts.next().is_none()
    }
}

/// Path segments without the leading slash; `/` and `` have none.
fn split_path(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.trim_start_matches('/');
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed.split('/').filter(move |_| !trimmed.is_empty())
}

#[derive(Debug, Clone)]
struct RouteEntry {
    method: Option<Method>,
    template: RouteTemplate,
    timings: Vec<Timed>,
}

/// Table of route templates and their timing descriptors.
///
/// ```ignore
/// let routes = RouteTimings::new()
///     .route("/api/c1/{id}", [Timed::server_requests().extra_tag("public", "true")])?
///     .route_method(Method::GET, "/api/c1/long/{id}", [
///         Timed::server_requests(),
///         Timed::named("my_long_request").extra_tag("region", "test").long_task(),
///     ])?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteTimings {
    entries: Vec<RouteEntry>,
}

impl RouteTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time every method on this route.
    pub fn route(self, pattern: &str, timings: impl IntoIterator<Item = Timed>) -> Result<Self> {
        self.insert(None, pattern, timings)
    }

    /// Time one method on this route.
    pub fn route_method(
        self,
        method: Method,
        pattern: &str,
        timings: impl IntoIterator<Item = Timed>,
    ) -> Result<Self> {
        self.insert(Some(method), pattern, timings)
    }

    fn insert(
        mut self,
        method: Option<Method>,
        pattern: &str,
        timings: impl IntoIterator<Item = Timed>,
    ) -> Result<Self> {
        let template = RouteTemplate::parse(pattern)?;
        let (named, unnamed): (Vec<Timed>, Vec<Timed>) =
            timings.into_iter().partition(Timed::is_named);

        if !unnamed.is_empty() {
            debug!(
                route = pattern,
                count = unnamed.len(),
                "Timing declared without a metric name; not instrumented"
            );
        }
        if !named.is_empty() {
            self.entries.push(RouteEntry {
                method,
                template,
                timings: named,
            });
        }
        Ok(self)
    }

    /// Timings for a route identified by its template (e.g. from the
    /// router's matched path).
    pub fn for_pattern(&self, method: &Method, pattern: &str) -> Option<&[Timed]> {
        self.lookup(method, |entry| entry.template.pattern() == pattern)
            .map(|entry| entry.timings.as_slice())
    }

    /// Template and timings of the first route matching a concrete path.
    pub fn for_path(&self, method: &Method, path: &str) -> Option<(&str, &[Timed])> {
        self.lookup(method, |entry| entry.template.matches(path))
            .map(|entry| (entry.template.pattern(), entry.timings.as_slice()))
    }

    /// Method-specific entries win over entries for any method.
    fn lookup(&self, method: &Method, pred: impl Fn(&RouteEntry) -> bool) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .filter(|e| e.method.as_ref() == Some(method))
            .find(|e| pred(e))
            .or_else(|| {
                self.entries
                    .iter()
                    .filter(|e| e.method.is_none())
                    .find(|e| pred(e))
            })
    }

    /// Number of timed routes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Prometheus text format export
//!
//! Renders a registry snapshot in the text exposition format (0.0.4) for
//! scraping.
//!
//! # Example Output
//!
//! ```text
//! # HELP http_server_requests http_server_requests
//! # TYPE http_server_requests summary
//! http_server_requests{exception="none",method="GET",status="200",uri="/api/c1/{id}",quantile="0.5"} 0.012
//! http_server_requests_sum{exception="none",method="GET",status="200",uri="/api/c1/{id}"} 0.034
//! http_server_requests_count{exception="none",method="GET",status="200",uri="/api/c1/{id}"} 3
//! # HELP http_server_requests_max http_server_requests
//! # TYPE http_server_requests_max gauge
//! http_server_requests_max{exception="none",method="GET",status="200",uri="/api/c1/{id}"} 0.015
//! ```

use crate::registry::{MeterRegistry, MeterSnapshot, MeterValue, Tags};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;
use std::sync::Arc;
use tracing::warn;

/// Content type of the scrape response.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Scrape side of the Prometheus backend.
#[derive(Debug, Clone)]
pub struct PrometheusScrape {
    registry: Arc<MeterRegistry>,
    descriptions: bool,
}

impl PrometheusScrape {
    pub fn new(registry: Arc<MeterRegistry>) -> Self {
        Self {
            registry,
            descriptions: true,
        }
    }

    /// Emit `# HELP` lines (on by default).
    pub fn with_descriptions(mut self, descriptions: bool) -> Self {
        self.descriptions = descriptions;
        self
    }

    pub fn registry(&self) -> &Arc<MeterRegistry> {
        &self.registry
    }

    /// Current registry contents in exposition format.
    pub fn scrape(&self) -> String {
        render(&self.registry.snapshot(), self.descriptions)
    }

    /// HTTP response for a scrape request.
    pub fn response(&self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, CONTENT_TYPE)],
            self.scrape(),
        )
            .into_response()
    }
}

struct Family {
    kind: &'static str,
    help: String,
    series: HashSet<String>,
    samples: Vec<String>,
}

/// One exposition line of a meter: family, family type, series key, value.
struct Sample {
    family: String,
    kind: &'static str,
    series: String,
    value: String,
}

impl Sample {
    fn new(family: &str, kind: &'static str, series: String, value: String) -> Self {
        Self {
            family: family.to_string(),
            kind,
            series,
            value,
        }
    }
}

#[derive(Default)]
struct Families(BTreeMap<String, Family>);

impl Families {
    /// Add every sample of one meter, or none of them when a family it needs
    /// already has another type or one of its series is already taken.
    fn add(&mut self, meter: &str, help: &str, samples: Vec<Sample>) {
        for sample in &samples {
            let Some(family) = self.0.get(&sample.family) else {
                continue;
            };
            if family.kind != sample.kind {
                warn!(
                    meter,
                    family = %sample.family,
                    existing = family.kind,
                    requested = sample.kind,
                    "Skipping meter whose Prometheus family has another type"
                );
                return;
            }
            if family.series.contains(&sample.series) {
                warn!(meter, series = %sample.series, "Skipping meter with a duplicate Prometheus series");
                return;
            }
        }

        for sample in samples {
            let family = self.0.entry(sample.family).or_insert_with(|| Family {
                kind: sample.kind,
                help: help.to_string(),
                series: HashSet::new(),
                samples: Vec::new(),
            });
            family.samples.push(format!("{} {}", sample.series, sample.value));
            family.series.insert(sample.series);
        }
    }

    /// Drop families whose names collide with the `_sum` and `_count` lines
    /// of a summary.
    fn remove_summary_clashes(&mut self) {
        let summaries: Vec<String> = self
            .0
            .iter()
            .filter(|(_, family)| family.kind == "summary")
            .map(|(name, _)| name.clone())
            .collect();

        for summary in summaries {
            for suffix in ["_sum", "_count"] {
                let clash = format!("{summary}{suffix}");
                if self.0.remove(&clash).is_some() {
                    warn!(family = %clash, summary = %summary, "Dropping family that clashes with a summary");
                }
            }
        }
    }
}

/// Render snapshots as exposition text, one family per metric name.
///
/// A meter that would mix types within a family, or repeat a series that
/// is already exposed, is left out and logged.
pub fn render(snapshot: &[MeterSnapshot], descriptions: bool) -> String {
    let mut families = Families::default();

    for meter in snapshot {
        let name = sanitize_name(meter.id.name());
        let labels = labels(meter.id.tags());

        let samples = match &meter.value {
            MeterValue::Counter { count } => {
                vec![Sample::new(&name, "counter", series(&name, &labels, None), count.to_string())]
            }
            MeterValue::Gauge { value } => {
                vec![Sample::new(&name, "gauge", series(&name, &labels, None), format_value(*value))]
            }
            MeterValue::Timer {
                count,
                total,
                max,
                quantiles,
            } => {
                let mut samples: Vec<Sample> = quantiles
                    .iter()
                    .map(|(q, value)| {
                        let quantile = format!("quantile=\"{}\"", format_value(*q));
                        Sample::new(
                            &name,
                            "summary",
                            series(&name, &labels, Some(&quantile)),
                            format_value(value.as_secs_f64()),
                        )
                    })
                    .collect();
                let sum = format!("{name}_sum");
                samples.push(Sample::new(
                    &name,
                    "summary",
                    series(&sum, &labels, None),
                    format_value(total.as_secs_f64()),
                ));
                let count_name = format!("{name}_count");
                samples.push(Sample::new(
                    &name,
                    "summary",
                    series(&count_name, &labels, None),
                    count.to_string(),
                ));
                let max_name = format!("{name}_max");
                samples.push(Sample::new(
                    &max_name,
                    "gauge",
                    series(&max_name, &labels, None),
                    format_value(max.as_secs_f64()),
                ));
                samples
            }
            MeterValue::LongTaskTimer {
                active_tasks,
                duration,
            } => {
                let active = format!("{name}_active_count");
                let duration_name = format!("{name}_duration_sum");
                vec![
                    Sample::new(
                        &active,
                        "gauge",
                        series(&active, &labels, None),
                        active_tasks.to_string(),
                    ),
                    Sample::new(
                        &duration_name,
                        "gauge",
                        series(&duration_name, &labels, None),
                        format_value(duration.as_secs_f64()),
                    ),
                ]
            }
        };
        families.add(meter.id.name(), meter.id.name(), samples);
    }
    families.remove_summary_clashes();

    let mut output = String::with_capacity(4096);
    for (name, family) in families.0 {
        if descriptions {
            let _ = writeln!(output, "# HELP {name} {}", escape_help(&family.help));
        }
        let _ = writeln!(output, "# TYPE {name} {}", family.kind);
        for sample in family.samples {
            output.push_str(&sample);
            output.push('\n');
        }
    }
    output
}

fn series(name: &str, labels: &str, extra: Option<&str>) -> String {
    match (labels.is_empty(), extra) {
        (true, None) => name.to_string(),
        (true, Some(extra)) => format!("{name}{{{extra}}}"),
        (false, None) => format!("{name}{{{labels}}}"),
        (false, Some(extra)) => format!("{name}{{{labels},{extra}}}"),
    }
}

fn labels(tags: &Tags) -> String {
    tags.iter()
        .map(|tag| {
            format!(
                "{}=\"{}\"",
                sanitize_label(tag.key()),
                escape_label_value(tag.value())
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Metric names may contain `[a-zA-Z0-9_:]` and must not start with a digit.
fn sanitize_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Label names may contain `[a-zA-Z0-9_]` and must not start with a digit.
fn sanitize_label(key: &str) -> String {
    sanitize_name(key).replace(':', "_")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(help: &str) -> String {
    help.replace('\\', r"\\").replace('\n', "\\n")
}

/// Format a sample value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{value}")
    }
}

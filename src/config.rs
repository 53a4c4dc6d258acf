//! Metrics configuration
//!
//! Configuration is read from a [`PropertySource`], a flat key/value view of
//! whatever the application uses for settings. Environment variables are the
//! default source; any map can stand in for tests.

use crate::error::{MetricsError, Result};
use crate::parse::{parse_bool, parse_duration, parse_tags};
use crate::registry::Tags;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;

/// Default name of the server request timer.
pub const DEFAULT_SERVER_REQUESTS_NAME: &str = "http_server_requests";

/// Default name of the client request timer.
pub const DEFAULT_CLIENT_REQUESTS_NAME: &str = "http_client_requests";

/// A flat key/value configuration source.
pub trait PropertySource {
    /// Value for `key` (e.g., `datadog.api-key`), if set.
    fn property(&self, key: &str) -> Option<String>;
}

/// Reads properties from environment variables.
///
/// `datadog.api-key` is looked up as `DATADOG_API_KEY`: letters are
/// upper-cased and `.` and `-` become `_`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvProperties;

impl EnvProperties {
    /// Environment variable name for a property key.
    pub fn variable_name(key: &str) -> String {
        key.chars()
            .map(|c| match c {
                '.' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect()
    }
}

impl PropertySource for EnvProperties {
    fn property(&self, key: &str) -> Option<String> {
        std::env::var(Self::variable_name(key)).ok()
    }
}

impl PropertySource for HashMap<String, String> {
    fn property(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl PropertySource for BTreeMap<String, String> {
    fn property(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Prometheus scrape endpoint settings.
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Offer Prometheus as a backend
    pub enabled: bool,
    /// Route of the scrape endpoint
    pub path: String,
    /// Emit `# HELP` lines
    pub descriptions: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/prometheus".to_string(),
            descriptions: true,
        }
    }
}

/// Datadog HTTP API export settings.
#[derive(Debug, Clone)]
pub struct DatadogConfig {
    pub enabled: bool,
    /// API key; required when the backend is selected
    pub api_key: Option<String>,
    /// Base URI of the Datadog API
    pub uri: String,
    /// Tag whose value is sent as the series `host`
    pub host_tag: String,
    /// Publishing interval
    pub step: Duration,
    /// Maximum series per request
    pub batch_size: usize,
}

impl Default for DatadogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            uri: "https://app.datadoghq.com".to_string(),
            host_tag: "instance".to_string(),
            step: Duration::from_secs(10),
            batch_size: 10_000,
        }
    }
}

/// Graphite plaintext protocol export settings.
#[derive(Debug, Clone)]
pub struct GraphiteConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub step: Duration,
}

impl Default for GraphiteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 2003,
            step: Duration::from_secs(10),
        }
    }
}

/// Ganglia gmetric export settings.
#[derive(Debug, Clone)]
pub struct GangliaConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub step: Duration,
    /// Multicast time-to-live
    pub ttl: u32,
    /// Maximum seconds between metric updates, advertised to gmond
    pub tmax: u32,
    /// Seconds after which gmond drops a silent metric (0 = never)
    pub dmax: u32,
}

impl Default for GangliaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 8649,
            step: Duration::from_secs(10),
            ttl: 1,
            tmax: 60,
            dmax: 0,
        }
    }
}

/// Complete metrics configuration.
///
/// # Example
///
/// ```ignore
/// use meterwire::MetricsConfig;
///
/// // Load from environment variables
/// let config = MetricsConfig::from_env()?;
///
/// // Or build programmatically
/// let config = MetricsConfig::builder()
///     .client_requests_name("outbound_requests")
///     .common_tags(Tags::from([("env", "prod")]))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Timer name used by `Timed::server_requests()`
    pub server_requests_name: String,
    /// Timer name of the outbound client interceptor
    pub client_requests_name: String,
    /// Tags added to every meter
    pub common_tags: Tags,
    pub prometheus: PrometheusConfig,
    pub datadog: DatadogConfig,
    pub graphite: GraphiteConfig,
    pub ganglia: GangliaConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            server_requests_name: DEFAULT_SERVER_REQUESTS_NAME.to_string(),
            client_requests_name: DEFAULT_CLIENT_REQUESTS_NAME.to_string(),
            common_tags: Tags::empty(),
            prometheus: PrometheusConfig::default(),
            datadog: DatadogConfig::default(),
            graphite: GraphiteConfig::default(),
            ganglia: GangliaConfig::default(),
        }
    }
}

impl MetricsConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `METRICS_WEB_SERVER_REQUESTS_NAME` (default: "http_server_requests")
    /// - `METRICS_WEB_CLIENT_REQUESTS_NAME` (default: "http_client_requests")
    /// - `METRICS_COMMON_TAGS`: comma-separated key=value pairs
    /// - `PROMETHEUS_ENABLED` (default: true), `PROMETHEUS_PATH`, `PROMETHEUS_DESCRIPTIONS`
    /// - `DATADOG_ENABLED`, `DATADOG_API_KEY`, `DATADOG_URI`, `DATADOG_HOST_TAG`,
    ///   `DATADOG_STEP`, `DATADOG_BATCH_SIZE`
    /// - `GRAPHITE_ENABLED`, `GRAPHITE_HOST`, `GRAPHITE_PORT`, `GRAPHITE_STEP`
    /// - `GANGLIA_ENABLED`, `GANGLIA_HOST`, `GANGLIA_PORT`, `GANGLIA_STEP`,
    ///   `GANGLIA_TTL`, `GANGLIA_TMAX`, `GANGLIA_DMAX`
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidConfig`] naming the first key whose value
    /// does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvProperties)
    }

    /// Create configuration from any property source.
    pub fn from_source(source: &dyn PropertySource) -> Result<Self> {
        let defaults = Self::default();
        let p = Props(source);

        let prometheus = PrometheusConfig {
            enabled: p.flag("prometheus.enabled", defaults.prometheus.enabled)?,
            path: p.string("prometheus.path", &defaults.prometheus.path),
            descriptions: p.flag("prometheus.descriptions", defaults.prometheus.descriptions)?,
        };
        if !prometheus.path.starts_with('/') {
            return Err(MetricsError::invalid("prometheus.path", "must start with '/'"));
        }

        let datadog = DatadogConfig {
            enabled: p.flag("datadog.enabled", defaults.datadog.enabled)?,
            api_key: source.property("datadog.api-key").filter(|k| !k.trim().is_empty()),
            uri: p.string("datadog.uri", &defaults.datadog.uri),
            host_tag: p.string("datadog.host-tag", &defaults.datadog.host_tag),
            step: p.step("datadog.step", defaults.datadog.step)?,
            batch_size: p.number("datadog.batch-size", defaults.datadog.batch_size)?,
        };
        if datadog.batch_size == 0 {
            return Err(MetricsError::invalid("datadog.batch-size", "must be at least 1"));
        }

        let graphite = GraphiteConfig {
            enabled: p.flag("graphite.enabled", defaults.graphite.enabled)?,
            host: p.string("graphite.host", &defaults.graphite.host),
            port: p.number("graphite.port", defaults.graphite.port)?,
            step: p.step("graphite.step", defaults.graphite.step)?,
        };

        let ganglia = GangliaConfig {
            enabled: p.flag("ganglia.enabled", defaults.ganglia.enabled)?,
            host: p.string("ganglia.host", &defaults.ganglia.host),
            port: p.number("ganglia.port", defaults.ganglia.port)?,
            step: p.step("ganglia.step", defaults.ganglia.step)?,
            ttl: p.number("ganglia.ttl", defaults.ganglia.ttl)?,
            tmax: p.number("ganglia.tmax", defaults.ganglia.tmax)?,
            dmax: p.number("ganglia.dmax", defaults.ganglia.dmax)?,
        };

        Ok(Self {
            server_requests_name: p.name(
                "metrics.web.server-requests.name",
                &defaults.server_requests_name,
            )?,
            client_requests_name: p.name(
                "metrics.web.client-requests.name",
                &defaults.client_requests_name,
            )?,
            common_tags: source
                .property("metrics.common-tags")
                .map(|s| parse_tags(&s))
                .unwrap_or_default(),
            prometheus,
            datadog,
            graphite,
            ganglia,
        })
    }

    /// Create a new configuration builder
    pub fn builder() -> MetricsConfigBuilder {
        MetricsConfigBuilder::default()
    }
}

/// Typed accessors over a property source.
struct Props<'a>(&'a dyn PropertySource);

impl Props<'_> {
    fn string(&self, key: &str, default: &str) -> String {
        self.0
            .property(key)
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| default.to_string())
    }

    fn name(&self, key: &str, default: &str) -> Result<String> {
        let name = self.string(key, default);
        if name.is_empty() {
            return Err(MetricsError::invalid(key, "metric name must not be empty"));
        }
        Ok(name)
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.0.property(key) {
            None => Ok(default),
            Some(v) => parse_bool(&v)
                .ok_or_else(|| MetricsError::invalid(key, format!("expected a boolean, got {v:?}"))),
        }
    }

    fn step(&self, key: &str, default: Duration) -> Result<Duration> {
        let step = match self.0.property(key) {
            None => default,
            Some(v) => parse_duration(&v)
                .ok_or_else(|| MetricsError::invalid(key, format!("expected a duration, got {v:?}")))?,
        };
        if step.is_zero() {
            return Err(MetricsError::invalid(key, "step must be greater than zero"));
        }
        Ok(step)
    }

    fn number<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.0.property(key) {
            None => Ok(default),
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| MetricsError::invalid(key, format!("expected a number, got {v:?}"))),
        }
    }
}

/// Builder for MetricsConfig
#[derive(Default)]
pub struct MetricsConfigBuilder {
    config: MetricsConfig,
}

impl MetricsConfigBuilder {
    /// Set the server request timer name
    pub fn server_requests_name(mut self, name: impl Into<String>) -> Self {
        self.config.server_requests_name = name.into();
        self
    }

    /// Set the client request timer name
    pub fn client_requests_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_requests_name = name.into();
        self
    }

    /// Add common tags
    pub fn common_tags(mut self, tags: Tags) -> Self {
        self.config.common_tags = self.config.common_tags.and_tags(&tags);
        self
    }

    pub fn prometheus(mut self, prometheus: PrometheusConfig) -> Self {
        self.config.prometheus = prometheus;
        self
    }

    pub fn datadog(mut self, datadog: DatadogConfig) -> Self {
        self.config.datadog = datadog;
        self
    }

    pub fn graphite(mut self, graphite: GraphiteConfig) -> Self {
        self.config.graphite = graphite;
        self
    }

    pub fn ganglia(mut self, ganglia: GangliaConfig) -> Self {
        self.config.ganglia = ganglia;
        self
    }

    /// Build the configuration
    pub fn build(self) -> MetricsConfig {
        self.config
    }
}

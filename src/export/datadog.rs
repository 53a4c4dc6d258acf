//! Datadog HTTP API export.
//!
//! Series are POSTed as JSON to `{uri}/api/v1/series?api_key=...`, split
//! into requests of at most `batch-size` series.

use super::push::PushExporter;
use super::BackendKind;
use crate::config::DatadogConfig;
use crate::error::{MetricsError, Result};
use crate::registry::MeterSnapshot;
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;
use url::Url;

/// One Datadog time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub metric: String,
    /// `[epoch_seconds, value]` pairs
    pub points: Vec<(i64, f64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Serialize)]
struct SeriesPayload<'a> {
    series: &'a [Series],
}

/// Build one gauge series per measurement.
///
/// The value of `host_tag` becomes the series `host` and is left out of the
/// tag list. Metric names are `name.statistic`.
pub fn build_series(snapshot: &[MeterSnapshot], host_tag: &str, wall_millis: i64) -> Vec<Series> {
    let timestamp = wall_millis.div_euclid(1000);
    let mut series = Vec::new();
    for meter in snapshot {
        let host = meter.id.tag(host_tag).map(str::to_string);
        let tags: Vec<String> = meter
            .id
            .tags()
            .iter()
            .filter(|tag| tag.key() != host_tag)
            .map(|tag| format!("{}:{}", tag.key(), tag.value()))
            .collect();

        for measurement in meter.measurements() {
            series.push(Series {
                metric: format!("{}.{}", meter.id.name(), measurement.statistic.suffix()),
                points: vec![(timestamp, measurement.value)],
                host: host.clone(),
                tags: tags.clone(),
                kind: "gauge",
            });
        }
    }
    series
}

/// JSON request body for a batch of series.
pub fn payload(series: &[Series]) -> Result<String> {
    Ok(serde_json::to_string(&SeriesPayload { series })?)
}

/// Publishes to the Datadog series API.
#[derive(Debug, Clone)]
pub struct DatadogExporter {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    host_tag: String,
    batch_size: usize,
}

impl DatadogExporter {
    /// # Errors
    ///
    /// [`MetricsError::MissingConfig`] without `datadog.api-key`;
    /// [`MetricsError::InvalidConfig`] if `datadog.uri` is not a URL.
    pub fn new(config: &DatadogConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| MetricsError::missing("datadog.api-key"))?;
        let endpoint = Url::parse(config.uri.trim_end_matches('/'))
            .and_then(|base| base.join("/api/v1/series"))
            .map_err(|e| MetricsError::invalid("datadog.uri", e.to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            host_tag: config.host_tag.clone(),
            batch_size: config.batch_size.max(1),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl PushExporter for DatadogExporter {
    fn kind(&self) -> BackendKind {
        BackendKind::Datadog
    }

    async fn publish(&self, snapshot: &[MeterSnapshot], wall_millis: i64) -> Result<()> {
        let series = build_series(snapshot, &self.host_tag, wall_millis);

        for batch in series.chunks(self.batch_size) {
            let body = payload(batch)?;
            let response = self
                .client
                .post(self.endpoint.clone())
                .query(&[("api_key", self.api_key.as_str())])
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
                .map_err(|e| MetricsError::export(BackendKind::Datadog, e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(MetricsError::export(
                    BackendKind::Datadog,
                    format!("HTTP {status}: {detail}"),
                ));
            }
            debug!(series = batch.len(), "Datadog batch accepted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MeterRegistry, Tags};
    use axum::extract::{Query, State};
    use axum::routing::post;
    use axum::Router;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn config(uri: &str, batch_size: usize) -> DatadogConfig {
        DatadogConfig {
            enabled: true,
            api_key: Some("secret".into()),
            uri: uri.into(),
            batch_size,
            ..Default::default()
        }
    }

    #[test]
    fn test_host_tag_is_promoted() {
        let registry = MeterRegistry::new();
        registry
            .counter("jobs", &Tags::from([("instance", "web1"), ("status", "ok")]))
            .unwrap()
            .increment();

        let series = build_series(&registry.snapshot(), "instance", 10_500);

        assert_eq!(
            series,
            vec![Series {
                metric: "jobs.count".into(),
                points: vec![(10, 1.0)],
                host: Some("web1".into()),
                tags: vec!["status:ok".into()],
                kind: "gauge",
            }]
        );
    }

    #[test]
    fn test_payload_shape() {
        let series = vec![Series {
            metric: "jobs.count".into(),
            points: vec![(10, 2.0)],
            host: None,
            tags: vec![],
            kind: "gauge",
        }];

        let json: serde_json::Value = serde_json::from_str(&payload(&series).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "series": [{
                    "metric": "jobs.count",
                    "points": [[10, 2.0]],
                    "tags": [],
                    "type": "gauge"
                }]
            })
        );
    }

    #[test]
    fn test_missing_api_key_fails_fast() {
        let err = DatadogExporter::new(&DatadogConfig::default()).unwrap_err();
        assert!(matches!(err, MetricsError::MissingConfig { ref key } if key == "datadog.api-key"));
    }

    #[test]
    fn test_endpoint() {
        let exporter = DatadogExporter::new(&config("https://app.datadoghq.com/", 10)).unwrap();
        assert_eq!(
            exporter.endpoint().as_str(),
            "https://app.datadoghq.com/api/v1/series"
        );
    }

    #[derive(Clone, Default)]
    struct Received {
        bodies: Arc<Mutex<Vec<serde_json::Value>>>,
        keys: Arc<Mutex<Vec<String>>>,
    }

    #[tokio::test]
    async fn test_publish_in_batches() {
        let received = Received::default();
        let app = Router::new()
            .route(
                "/api/v1/series",
                post(
                    |State(r): State<Received>,
                     Query(q): Query<HashMap<String, String>>,
                     body: String| async move {
                        r.keys.lock().push(q.get("api_key").cloned().unwrap_or_default());
                        r.bodies.lock().push(serde_json::from_str(&body).unwrap());
                        "{}"
                    },
                ),
            )
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let registry = MeterRegistry::new();
        registry.counter("a", &Tags::empty()).unwrap();
        registry.counter("b", &Tags::empty()).unwrap();
        registry.counter("c", &Tags::empty()).unwrap();

        let exporter = DatadogExporter::new(&config(&format!("http://{addr}"), 2)).unwrap();
        exporter.publish(&registry.snapshot(), 0).await.unwrap();

        let bodies = received.bodies.lock();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0]["series"].as_array().unwrap().len(), 2);
        assert_eq!(bodies[1]["series"].as_array().unwrap().len(), 1);
        assert_eq!(*received.keys.lock(), vec!["secret", "secret"]);
    }
}

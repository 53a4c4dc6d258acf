//! Graphite plaintext protocol over TCP.

use super::naming::HierarchicalNameMapper;
use super::push::PushExporter;
use super::BackendKind;
use crate::config::GraphiteConfig;
use crate::error::{MetricsError, Result};
use crate::registry::MeterSnapshot;
use async_trait::async_trait;
use std::fmt::Write as _;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Writes `path value timestamp` lines to a Graphite carbon listener.
#[derive(Debug, Clone)]
pub struct GraphiteExporter {
    host: String,
    port: u16,
    mapper: HierarchicalNameMapper,
}

impl GraphiteExporter {
    pub fn new(config: &GraphiteConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            mapper: HierarchicalNameMapper,
        }
    }
}

/// One plaintext line per measurement; timestamps in epoch seconds.
pub fn format_lines(
    snapshot: &[MeterSnapshot],
    mapper: &HierarchicalNameMapper,
    wall_millis: i64,
) -> String {
    let timestamp = wall_millis.div_euclid(1000);
    let mut out = String::new();
    for meter in snapshot {
        for measurement in meter.measurements() {
            let path = mapper.name(&meter.id, measurement.statistic);
            let _ = writeln!(out, "{path} {} {timestamp}", measurement.value);
        }
    }
    out
}

#[async_trait]
impl PushExporter for GraphiteExporter {
    fn kind(&self) -> BackendKind {
        BackendKind::Graphite
    }

    async fn publish(&self, snapshot: &[MeterSnapshot], wall_millis: i64) -> Result<()> {
        let payload = format_lines(snapshot, &self.mapper, wall_millis);
        if payload.is_empty() {
            return Ok(());
        }

        let failed = |e: std::io::Error| {
            MetricsError::export(
                BackendKind::Graphite,
                format!("{}:{}: {e}", self.host, self.port),
            )
        };
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(failed)?;
        stream.write_all(payload.as_bytes()).await.map_err(failed)?;
        stream.shutdown().await.map_err(failed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MeterRegistry, Tags};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_format_lines() {
        let registry = MeterRegistry::new();
        registry
            .counter("jobs", &Tags::from([("status", "ok")]))
            .unwrap()
            .increment_by(3);
        registry
            .timer("latency", &Tags::empty())
            .unwrap()
            .record(Duration::from_millis(250));

        let out = format_lines(&registry.snapshot(), &HierarchicalNameMapper, 1_500_000_000_999);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "jobs.status.ok.count 3 1500000000");
        assert_eq!(lines[1], "latency.count 1 1500000000");
        assert_eq!(lines[2], "latency.sum 0.25 1500000000");
        assert_eq!(lines.len(), 5);
    }

    #[tokio::test]
    async fn test_publish_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = String::new();
            socket.read_to_string(&mut received).await.unwrap();
            received
        });

        let exporter = GraphiteExporter::new(&GraphiteConfig {
            enabled: true,
            host: "127.0.0.1".into(),
            port,
            step: Duration::from_secs(10),
        });
        let registry = MeterRegistry::new();
        registry.gauge("queue", &Tags::empty(), || 7.0).unwrap();

        exporter.publish(&registry.snapshot(), 60_000).await.unwrap();
        assert_eq!(server.await.unwrap(), "queue.value 7 60\n");
    }

    #[tokio::test]
    async fn test_unreachable_carbon_is_an_export_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let exporter = GraphiteExporter::new(&GraphiteConfig {
            enabled: true,
            host: "127.0.0.1".into(),
            port,
            step: Duration::from_secs(10),
        });
        let registry = MeterRegistry::new();
        registry.counter("c", &Tags::empty()).unwrap();

        let err = exporter.publish(&registry.snapshot(), 0).await.unwrap_err();
        assert!(matches!(
            err,
            MetricsError::Export {
                backend: BackendKind::Graphite,
                ..
            }
        ));
    }
}

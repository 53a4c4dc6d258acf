//! Ganglia gmetric (3.1 wire format) over UDP.
//!
//! Each measurement is announced as two XDR-encoded datagrams: a metadata
//! packet describing the metric and a string value packet.

use super::naming::HierarchicalNameMapper;
use super::push::PushExporter;
use super::BackendKind;
use crate::config::GangliaConfig;
use crate::error::{MetricsError, Result};
use crate::registry::MeterSnapshot;
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

const METADATA_FULL: i32 = 128;
const VALUE_STRING: i32 = 133;
const SLOPE_BOTH: i32 = 3;

/// Announces metrics to a gmond listener.
#[derive(Debug, Clone)]
pub struct GangliaExporter {
    host: String,
    port: u16,
    ttl: u32,
    tmax: u32,
    dmax: u32,
    host_name: String,
    mapper: HierarchicalNameMapper,
}

impl GangliaExporter {
    pub fn new(config: &GangliaConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            ttl: config.ttl,
            tmax: config.tmax,
            dmax: config.dmax,
            host_name: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
            mapper: HierarchicalNameMapper,
        }
    }

    /// Host name reported in every packet.
    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    async fn socket(&self) -> std::io::Result<(UdpSocket, SocketAddr)> {
        let target = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "host did not resolve")
            })?;

        let bind: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        if target.ip().is_multicast() && target.is_ipv4() {
            socket.set_multicast_ttl_v4(self.ttl)?;
        }
        Ok((socket, target))
    }
}

#[async_trait]
impl PushExporter for GangliaExporter {
    fn kind(&self) -> BackendKind {
        BackendKind::Ganglia
    }

    async fn publish(&self, snapshot: &[MeterSnapshot], _wall_millis: i64) -> Result<()> {
        if snapshot.is_empty() {
            return Ok(());
        }
        let failed = |e: std::io::Error| {
            MetricsError::export(
                BackendKind::Ganglia,
                format!("{}:{}: {e}", self.host, self.port),
            )
        };

        let (socket, target) = self.socket().await.map_err(failed)?;
        for meter in snapshot {
            let group = meter.id.name();
            for measurement in meter.measurements() {
                let name = self.mapper.name(&meter.id, measurement.statistic);
                let metadata = metadata_packet(&self.host_name, &name, group, self.tmax, self.dmax);
                let value = value_packet(&self.host_name, &name, measurement.value);
                socket.send_to(&metadata, target).await.map_err(failed)?;
                socket.send_to(&value, target).await.map_err(failed)?;
            }
        }
        Ok(())
    }
}

/// XDR encoder (RFC 4506) for the few types gmetric needs.
#[derive(Default)]
struct Xdr(Vec<u8>);

impl Xdr {
    fn int(&mut self, value: i32) -> &mut Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn uint(&mut self, value: u32) -> &mut Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn string(&mut self, value: &str) -> &mut Self {
        let bytes = value.as_bytes();
        self.uint(u32::try_from(bytes.len()).unwrap_or(u32::MAX));
        self.0.extend_from_slice(bytes);
        let padding = (4 - bytes.len() % 4) % 4;
        self.0.extend(std::iter::repeat(0).take(padding));
        self
    }

    fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.0)
    }
}

/// Metadata packet declaring a `double` metric.
pub fn metadata_packet(host: &str, name: &str, group: &str, tmax: u32, dmax: u32) -> Vec<u8> {
    Xdr::default()
        .int(METADATA_FULL)
        .string(host)
        .string(name)
        .int(0)
        .string("double")
        .string(name)
        .string("")
        .int(SLOPE_BOTH)
        .uint(tmax)
        .uint(dmax)
        .uint(1)
        .string("GROUP")
        .string(group)
        .finish()
}

/// Value packet carrying the metric value as a string.
pub fn value_packet(host: &str, name: &str, value: f64) -> Vec<u8> {
    Xdr::default()
        .int(VALUE_STRING)
        .string(host)
        .string(name)
        .int(0)
        .string("%s")
        .string(&value.to_string())
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MeterRegistry, Tags};
    use std::time::Duration;

    fn read_int(buf: &[u8], at: usize) -> i32 {
        i32::from_be_bytes(buf[at..at + 4].try_into().unwrap())
    }

    fn read_string(buf: &[u8], at: usize) -> (String, usize) {
        let len = read_int(buf, at) as usize;
        let s = String::from_utf8(buf[at + 4..at + 4 + len].to_vec()).unwrap();
        let next = at + 4 + len + (4 - len % 4) % 4;
        (s, next)
    }

    #[test]
    fn test_xdr_string_padding() {
        assert_eq!(Xdr::default().string("ab").finish(), vec![0, 0, 0, 2, b'a', b'b', 0, 0]);
        assert_eq!(Xdr::default().string("abcd").finish().len(), 8);
        assert_eq!(Xdr::default().string("").finish(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_value_packet_layout() {
        let packet = value_packet("web1", "jobs.count", 3.0);

        assert_eq!(read_int(&packet, 0), 133);
        let (host, next) = read_string(&packet, 4);
        assert_eq!(host, "web1");
        let (name, next) = read_string(&packet, next);
        assert_eq!(name, "jobs.count");
        assert_eq!(read_int(&packet, next), 0);
        let (format, next) = read_string(&packet, next + 4);
        assert_eq!(format, "%s");
        let (value, end) = read_string(&packet, next);
        assert_eq!(value, "3");
        assert_eq!(end, packet.len());
    }

    #[test]
    fn test_metadata_packet_layout() {
        let packet = metadata_packet("web1", "jobs.count", "jobs", 60, 0);

        assert_eq!(read_int(&packet, 0), 128);
        let (_, next) = read_string(&packet, 4);
        let (_, next) = read_string(&packet, next);
        let (kind, next) = read_string(&packet, next + 4);
        assert_eq!(kind, "double");
        let (_, next) = read_string(&packet, next);
        let (_, next) = read_string(&packet, next);
        assert_eq!(read_int(&packet, next), 3);
        assert_eq!(read_int(&packet, next + 4), 60);
        assert_eq!(read_int(&packet, next + 8), 0);
        assert_eq!(read_int(&packet, next + 12), 1);
        let (key, next) = read_string(&packet, next + 16);
        assert_eq!(key, "GROUP");
        let (group, _) = read_string(&packet, next);
        assert_eq!(group, "jobs");
    }

    #[tokio::test]
    async fn test_publish_over_udp() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let exporter = GangliaExporter::new(&GangliaConfig {
            enabled: true,
            host: "127.0.0.1".into(),
            port,
            step: Duration::from_secs(10),
            ttl: 1,
            tmax: 60,
            dmax: 0,
        })
        .with_host_name("web1");

        let registry = MeterRegistry::new();
        registry
            .counter("jobs", &Tags::empty())
            .unwrap()
            .increment_by(2);
        exporter.publish(&registry.snapshot(), 0).await.unwrap();

        let mut buf = [0u8; 1024];
        let (n, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(read_int(&buf[..n], 0), 128);

        let (n, _) = receiver.recv_from(&mut buf).await.unwrap();
        let packet = &buf[..n];
        assert_eq!(read_int(packet, 0), 133);
        let (_, next) = read_string(packet, 4);
        let (name, _) = read_string(packet, next);
        assert_eq!(name, "jobs.count");
    }
}

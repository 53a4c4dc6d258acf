//! Periodic publishing for push-based backends.

use super::BackendKind;
use crate::error::{MetricsError, Result};
use crate::registry::{MeterRegistry, MeterSnapshot};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Sends a registry snapshot to a remote backend.
#[async_trait]
pub trait PushExporter: Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Publish one snapshot taken at `wall_millis` (Unix epoch milliseconds).
    async fn publish(&self, snapshot: &[MeterSnapshot], wall_millis: i64) -> Result<()>;
}

/// A registry paired with an exporter and a publishing step.
#[derive(Debug, Clone)]
pub struct PushRegistry {
    registry: Arc<MeterRegistry>,
    exporter: Arc<dyn PushExporter>,
    step: Duration,
}

impl PushRegistry {
    /// # Errors
    ///
    /// [`MetricsError::InvalidConfig`] for a zero `step`.
    pub fn new(
        registry: Arc<MeterRegistry>,
        exporter: Arc<dyn PushExporter>,
        step: Duration,
    ) -> Result<Self> {
        if step.is_zero() {
            return Err(MetricsError::invalid(
                format!("{}.step", exporter.kind()),
                "step must be greater than zero",
            ));
        }
        Ok(Self {
            registry,
            exporter,
            step,
        })
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn exporter(&self) -> &Arc<dyn PushExporter> {
        &self.exporter
    }

    /// Publish the current snapshot once.
    pub async fn publish(&self) -> Result<()> {
        let snapshot = self.registry.snapshot();
        let wall_millis = self.registry.clock().wall_time_millis();
        self.exporter.publish(&snapshot, wall_millis).await
    }

    /// Publish every `step` on a background task until stopped.
    ///
    /// Must be called within a tokio runtime. Failed publishes are logged
    /// and retried on the next step.
    pub fn start(self) -> PushHandle {
        let kind = self.exporter.kind();
        let step_ms = self.step_millis();
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + self.step, self.step);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => self.publish_logged().await,
                    _ = &mut shutdown_rx => break,
                }
            }
            self.publish_logged().await;
            debug!(backend = %kind, "Metrics publishing stopped");
        });

        debug!(backend = %kind, step_ms, "Metrics publishing started");
        PushHandle {
            kind,
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    async fn publish_logged(&self) {
        let kind = self.exporter.kind();
        match self.publish().await {
            Ok(()) => debug!(backend = %kind, meters = self.registry.len(), "Metrics published"),
            Err(e) => warn!(backend = %kind, error = %e, "Metrics publish failed"),
        }
    }

    fn step_millis(&self) -> u64 {
        u64::try_from(self.step.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Handle to a running publish loop.
///
/// Dropping the handle closes the shutdown channel, which also ends the loop
/// after one last publish.
#[derive(Debug)]
pub struct PushHandle {
    kind: BackendKind,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PushHandle {
    /// Stop publishing after one final publish, and wait for the loop to end.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| MetricsError::export(self.kind, e.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Tags;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingExporter {
        publishes: AtomicUsize,
        last_meters: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PushExporter for CountingExporter {
        fn kind(&self) -> BackendKind {
            BackendKind::Graphite
        }

        async fn publish(&self, snapshot: &[MeterSnapshot], _wall_millis: i64) -> Result<()> {
            self.publishes.fetch_add(1, Ordering::SeqCst);
            self.last_meters.store(snapshot.len(), Ordering::SeqCst);
            if self.fail {
                return Err(MetricsError::export(BackendKind::Graphite, "unreachable"));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_every_step_and_on_stop() {
        let registry = Arc::new(MeterRegistry::new());
        registry.counter("jobs", &Tags::empty()).unwrap();
        let exporter = Arc::new(CountingExporter::default());

        let handle = PushRegistry::new(registry, exporter.clone(), Duration::from_secs(10))
            .unwrap()
            .start();

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(exporter.publishes.load(Ordering::SeqCst), 2);
        assert_eq!(exporter.last_meters.load(Ordering::SeqCst), 1);

        handle.stop().await.unwrap();
        assert_eq!(exporter.publishes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_loop() {
        let registry = Arc::new(MeterRegistry::new());
        let exporter = Arc::new(CountingExporter {
            fail: true,
            ..Default::default()
        });

        let handle = PushRegistry::new(registry, exporter.clone(), Duration::from_secs(1))
            .unwrap()
            .start();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(exporter.publishes.load(Ordering::SeqCst), 3);
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_once() {
        let registry = Arc::new(MeterRegistry::new());
        let exporter = Arc::new(CountingExporter::default());
        let push = PushRegistry::new(registry, exporter.clone(), Duration::from_secs(60)).unwrap();

        push.publish().await.unwrap();
        assert_eq!(exporter.publishes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_step_is_rejected() {
        let registry = Arc::new(MeterRegistry::new());
        let exporter = Arc::new(CountingExporter::default());

        let err = PushRegistry::new(registry, exporter, Duration::ZERO).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidConfig { ref key, .. } if key == "graphite.step"));
    }
}

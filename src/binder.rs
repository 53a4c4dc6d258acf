//! Standard meter binders for process and runtime metrics.

use crate::bootstrap::MeterBinder;
use crate::error::Result;
use crate::registry::{Counter, MeterRegistry, Tags};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Process uptime and start time.
///
/// - `process_uptime` - seconds since the binder was created
/// - `process_start_time` - Unix epoch seconds of that moment
#[derive(Debug, Clone)]
pub struct UptimeMetrics {
    started: Instant,
    start_epoch_millis: i64,
    tags: Tags,
}

impl UptimeMetrics {
    pub fn new() -> Self {
        Self::with_tags(Tags::empty())
    }

    pub fn with_tags(tags: Tags) -> Self {
        Self {
            started: Instant::now(),
            start_epoch_millis: chrono::Utc::now().timestamp_millis(),
            tags,
        }
    }
}

impl Default for UptimeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterBinder for UptimeMetrics {
    fn bind_to(&self, registry: &MeterRegistry) -> Result<()> {
        let started = self.started;
        registry.gauge("process_uptime", &self.tags, move || {
            started.elapsed().as_secs_f64()
        })?;

        let start_secs = self.start_epoch_millis as f64 / 1000.0;
        registry.gauge("process_start_time", &self.tags, move || start_secs)?;
        Ok(())
    }
}

/// Number of processors available to the process.
///
/// - `system_cpu_count`
#[derive(Debug, Clone, Default)]
pub struct ProcessorMetrics {
    tags: Tags,
}

impl ProcessorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(tags: Tags) -> Self {
        Self { tags }
    }
}

impl MeterBinder for ProcessorMetrics {
    fn bind_to(&self, registry: &MeterRegistry) -> Result<()> {
        registry.gauge("system_cpu_count", &self.tags, || {
            std::thread::available_parallelism()
                .map(|n| n.get() as f64)
                .unwrap_or(1.0)
        })?;
        Ok(())
    }
}

/// Tokio runtime monitoring, the thread-pool binder.
///
/// - `<name>_pool_size` - worker threads
/// - `<name>_queue_size` - tasks waiting in the runtime's global queue
/// - `<name>_active_tasks` - tasks currently alive in the runtime
/// - `<name>_tasks` - tasks submitted through a [`MonitoredExecutor`]
///
/// ```ignore
/// let exec = ExecutorMetrics::new(Handle::current(), "exec").monitor(&registry)?;
/// exec.spawn(async { refresh_cache().await });
/// ```
#[derive(Debug, Clone)]
pub struct ExecutorMetrics {
    handle: Handle,
    name: String,
    tags: Tags,
}

impl ExecutorMetrics {
    pub fn new(handle: Handle, name: impl Into<String>) -> Self {
        Self {
            handle,
            name: name.into(),
            tags: Tags::empty(),
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Bind the runtime meters and return a spawner that counts tasks.
    pub fn monitor(self, registry: &MeterRegistry) -> Result<MonitoredExecutor> {
        self.bind_to(registry)?;
        Ok(MonitoredExecutor {
            tasks: self.tasks_counter(registry)?,
            handle: self.handle,
        })
    }

    fn tasks_counter(&self, registry: &MeterRegistry) -> Result<Arc<Counter>> {
        registry.counter(&format!("{}_tasks", self.name), &self.tags)
    }
}

impl MeterBinder for ExecutorMetrics {
    fn bind_to(&self, registry: &MeterRegistry) -> Result<()> {
        let handle = self.handle.clone();
        registry.gauge(&format!("{}_pool_size", self.name), &self.tags, move || {
            handle.metrics().num_workers() as f64
        })?;

        let handle = self.handle.clone();
        registry.gauge(&format!("{}_queue_size", self.name), &self.tags, move || {
            handle.metrics().global_queue_depth() as f64
        })?;

        let handle = self.handle.clone();
        registry.gauge(&format!("{}_active_tasks", self.name), &self.tags, move || {
            handle.metrics().num_alive_tasks() as f64
        })?;

        self.tasks_counter(registry)?;
        Ok(())
    }
}

/// Spawns onto a monitored runtime, counting every submitted task.
#[derive(Debug, Clone)]
pub struct MonitoredExecutor {
    handle: Handle,
    tasks: Arc<Counter>,
}

impl MonitoredExecutor {
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tasks.increment();
        self.handle.spawn(future)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Binders every application gets unless it opts out.
pub fn recommended_binders() -> Vec<Box<dyn MeterBinder>> {
    vec![
        Box::new(UptimeMetrics::new()),
        Box::new(ProcessorMetrics::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::RegistryBootstrap;

    #[test]
    fn test_uptime_metrics() {
        let registry = MeterRegistry::new();
        UptimeMetrics::new().bind_to(&registry).unwrap();

        let uptime = registry.find("process_uptime").gauge().unwrap();
        assert!(uptime.value() >= 0.0);
        let start = registry.find("process_start_time").gauge().unwrap();
        assert!(start.value() > 1_500_000_000.0);
    }

    #[test]
    fn test_processor_metrics() {
        let registry = MeterRegistry::new();
        ProcessorMetrics::new().bind_to(&registry).unwrap();

        let cpus = registry.find("system_cpu_count").gauge().unwrap();
        assert!(cpus.value() >= 1.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_executor_metrics() {
        let registry = MeterRegistry::new();
        ExecutorMetrics::new(Handle::current(), "exec")
            .bind_to(&registry)
            .unwrap();

        let pool = registry.find("exec_pool_size").gauge().unwrap();
        assert_eq!(pool.value(), 2.0);
        assert!(registry.find("exec_queue_size").gauge().is_some());
        assert!(registry.find("exec_active_tasks").gauge().is_some());
        assert_eq!(registry.find("exec_tasks").counter().unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_monitored_executor_counts_tasks() {
        let registry = MeterRegistry::new();
        let exec = ExecutorMetrics::new(Handle::current(), "sched")
            .with_tags(Tags::from([("pool", "background")]))
            .monitor(&registry)
            .unwrap();

        let handles: Vec<_> = (0..3).map(|i| exec.spawn(async move { i * 2 })).collect();
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results, vec![0, 2, 4]);
        let tasks = registry.find("sched_tasks").counter().unwrap();
        assert_eq!(tasks.count(), 3);
        assert_eq!(tasks.id().tag("pool"), Some("background"));
        assert_eq!(registry.find("sched_pool_size").gauge().unwrap().value(), 1.0);
    }

    #[test]
    fn test_recommended_binders_through_bootstrap() {
        let registry = MeterRegistry::new();
        RegistryBootstrap::new()
            .with_binders(Some(recommended_binders()))
            .bind_all(&registry)
            .unwrap();

        assert_eq!(registry.len(), 3);
    }
}

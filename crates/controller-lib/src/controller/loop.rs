//! Periodic control loop
//!
//! Assembles a snapshot, runs one controller tick and reports component
//! health, on a fixed poll interval until shutdown. A tick finishes,
//! applies included, before the next one can start.

use super::{Controller, TickReport};
use crate::health::{components, HealthRegistry};
use crate::models::ServiceId;
use crate::observability::ControllerMetrics;
use crate::source::SnapshotAssembler;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Default time between ticks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

pub struct ControlLoop {
    controller: Controller,
    assembler: SnapshotAssembler,
    health: HealthRegistry,
    metrics: ControllerMetrics,
    poll_interval: Duration,
    ticks: u64,
}

impl ControlLoop {
    pub fn new(
        controller: Controller,
        assembler: SnapshotAssembler,
        health: HealthRegistry,
        poll_interval: Duration,
    ) -> Self {
        Self {
            controller,
            assembler,
            health,
            metrics: ControllerMetrics::new(),
            poll_interval,
            ticks: 0,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Run until a shutdown signal arrives
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            services = self.controller.services().count(),
            strategy = self.controller.planner_name(),
            "Starting control loop"
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.run_once().await;
                    debug!(
                        tick = self.ticks,
                        applied = report.applied(),
                        failed = report.failed(),
                        elapsed_ms = report.duration.as_millis(),
                        "Control tick complete"
                    );
                }
                _ = shutdown.recv() => {
                    info!(ticks = self.ticks, "Shutting down control loop");
                    break;
                }
            }
        }
    }

    /// One full tick: fetch, decide, apply, report health
    pub async fn run_once(&mut self) -> TickReport {
        let services: Vec<ServiceId> = self.controller.services().cloned().collect();
        self.metrics.set_services_monitored(services.len() as i64);

        let assembly = self.assembler.assemble(&services).await;
        let queries = self.assembler.catalog().bindings.len();
        let failed = assembly.failed.len();
        self.metrics.inc_metric_fetch_errors(failed as u64);
        if failed == 0 {
            self.health.set_healthy(components::METRIC_SOURCE).await;
        } else if failed >= queries {
            self.health
                .set_unhealthy(components::METRIC_SOURCE, "all metric queries failed")
                .await;
        } else {
            self.health
                .set_degraded(
                    components::METRIC_SOURCE,
                    format!("failed queries: {}", assembly.failed.join(", ")),
                )
                .await;
        }

        let report = self.controller.tick(&assembly.snapshot).await;
        self.ticks += 1;

        self.health.set_healthy(components::PLANNER).await;
        match report.failed() {
            0 => self.health.set_healthy(components::EXECUTOR).await,
            n => {
                self.health
                    .set_degraded(components::EXECUTOR, format!("{} applies failed", n))
                    .await
            }
        }
        match &report.store_error {
            Some(e) => self.health.set_unhealthy(components::STORE, e.clone()).await,
            None => self.health.set_healthy(components::STORE).await,
        }
        self.health.record_tick(&report).await;

        report
    }
}

/// Builder for the control loop
pub struct ControlLoopBuilder {
    controller: Option<Controller>,
    assembler: Option<SnapshotAssembler>,
    health: HealthRegistry,
    poll_interval: Duration,
}

impl ControlLoopBuilder {
    pub fn new() -> Self {
        Self {
            controller: None,
            assembler: None,
            health: HealthRegistry::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn controller(mut self, controller: Controller) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn assembler(mut self, assembler: SnapshotAssembler) -> Self {
        self.assembler = Some(assembler);
        self
    }

    /// Share a health registry with the HTTP API
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn build(self) -> Result<ControlLoop> {
        let controller = self
            .controller
            .ok_or_else(|| anyhow::anyhow!("Controller is required"))?;
        let assembler = self
            .assembler
            .ok_or_else(|| anyhow::anyhow!("Snapshot assembler is required"))?;
        if self.poll_interval.is_zero() {
            anyhow::bail!("Poll interval must be non-zero");
        }

        Ok(ControlLoop::new(
            controller,
            assembler,
            self.health,
            self.poll_interval,
        ))
    }
}

impl Default for ControlLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;
    use crate::health::ComponentStatus;
    use crate::models::{ApplyResult, Configuration};
    use crate::policy::PolicyConfig;
    use crate::source::{Aggregation, InMemorySource, MetricCatalog};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingExecutor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Executor for CountingExecutor {
        async fn apply(&self, _service: &str, _configuration: &Configuration) -> ApplyResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ApplyResult::success("ok")
        }
    }

    async fn saturated_source() -> Arc<InMemorySource> {
        let source = Arc::new(InMemorySource::new());
        source.set("cpu.quota.used.percent", Aggregation::Avg, "cart", 90.0).await;
        source.set("memory.limit.used.percent", Aggregation::Avg, "cart", 40.0).await;
        source.set("net.request.count.in", Aggregation::Sum, "cart", 80.0).await;
        source
    }

    fn controller(executor: Arc<dyn Executor>) -> Controller {
        Controller::new(
            Arc::new(PolicyConfig::default()),
            vec!["cart".to_string()],
            executor,
        )
        .unwrap()
    }

    #[test]
    fn test_builder_requires_parts() {
        assert!(ControlLoopBuilder::new().build().is_err());

        let executor = Arc::new(CountingExecutor {
            calls: AtomicUsize::new(0),
        });
        let result = ControlLoopBuilder::new()
            .controller(controller(executor))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_once_applies_and_reports_health() {
        let executor = Arc::new(CountingExecutor {
            calls: AtomicUsize::new(0),
        });
        let source = saturated_source().await;
        let health = HealthRegistry::new();
        health.register_all().await;

        let mut control = ControlLoopBuilder::new()
            .controller(controller(executor.clone()))
            .assembler(SnapshotAssembler::new(
                source,
                MetricCatalog::default(),
                Duration::from_secs(300),
            ))
            .health(health.clone())
            .poll_interval(Duration::from_secs(1))
            .build()
            .unwrap();

        assert!(!health.readiness().await.ready);
        let report = control.run_once().await;
        assert_eq!(report.applied(), 1);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            control.controller().configuration("cart"),
            Some(Configuration::new(600.0, 512.0, 1))
        );
        assert_eq!(health.health().await.status, ComponentStatus::Healthy);
        assert!(health.readiness().await.ready);
        let tick = health.health().await.last_tick.unwrap();
        assert_eq!(tick.services, 1);
        assert_eq!(tick.applied, 1);
    }

    #[tokio::test]
    async fn test_failed_queries_degrade_source() {
        let executor = Arc::new(CountingExecutor {
            calls: AtomicUsize::new(0),
        });
        let source = saturated_source().await;
        source.fail("jvm.gc.global.time").await;
        let health = HealthRegistry::new();

        let mut control = ControlLoopBuilder::new()
            .controller(controller(executor))
            .assembler(SnapshotAssembler::new(
                source,
                MetricCatalog::default(),
                Duration::from_secs(300),
            ))
            .health(health.clone())
            .build()
            .unwrap();

        control.run_once().await;
        let source_health = health.component(components::METRIC_SOURCE).await.unwrap();
        assert_eq!(source_health.status, ComponentStatus::Degraded);
        assert!(source_health
            .message
            .unwrap()
            .contains("jvm.gc.global.time/avg"));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let executor = Arc::new(CountingExecutor {
            calls: AtomicUsize::new(0),
        });
        let control = ControlLoopBuilder::new()
            .controller(controller(executor.clone()))
            .assembler(SnapshotAssembler::new(
                saturated_source().await,
                MetricCatalog::default(),
                Duration::from_secs(300),
            ))
            .poll_interval(Duration::from_millis(20))
            .build()
            .unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(control.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop did not stop")
            .unwrap();

        // The first tick fires immediately
        assert!(executor.calls.load(Ordering::SeqCst) >= 1);
    }
}

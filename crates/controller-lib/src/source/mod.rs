//! Metric acquisition
//!
//! A [`MetricSource`] answers one `(metric id, aggregation)` query for a set
//! of services. The [`SnapshotAssembler`] runs every query of a
//! [`MetricCatalog`] once per tick and folds the answers into one
//! [`MetricVector`] per service.

mod dataset;
mod memory;

pub use dataset::{dump_file_name, DatasetSource};
pub use memory::InMemorySource;

use crate::models::{Dimension, MetricSnapshot, MetricVector, ServiceId};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Aggregation applied by the monitoring backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Avg,
    Max,
    Sum,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Avg => "avg",
            Aggregation::Max => "max",
            Aggregation::Sum => "sum",
        }
    }
}

/// Trait for monitoring backends
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Aggregated value of one metric per service over the trailing window.
    ///
    /// Services without data are absent from the result.
    async fn fetch(
        &self,
        services: &[ServiceId],
        metric_id: &str,
        aggregation: Aggregation,
        window: Duration,
    ) -> Result<HashMap<ServiceId, f64>>;
}

/// One monitoring query and the vector dimensions it fills
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBinding {
    pub metric_id: String,
    pub aggregation: Aggregation,
    pub dimensions: Vec<Dimension>,
}

impl MetricBinding {
    pub fn new(metric_id: &str, aggregation: Aggregation, dimensions: &[Dimension]) -> Self {
        Self {
            metric_id: metric_id.to_string(),
            aggregation,
            dimensions: dimensions.to_vec(),
        }
    }
}

/// Queries run at every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricCatalog {
    pub bindings: Vec<MetricBinding>,
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self {
            bindings: vec![
                MetricBinding::new("cpu.quota.used.percent", Aggregation::Avg, &[Dimension::Cpu]),
                MetricBinding::new(
                    "memory.limit.used.percent",
                    Aggregation::Avg,
                    &[Dimension::Memory],
                ),
                MetricBinding::new(
                    "net.http.request.time",
                    Aggregation::Max,
                    &[Dimension::Latency],
                ),
                MetricBinding::new(
                    "net.request.count.in",
                    Aggregation::Sum,
                    &[Dimension::Throughput, Dimension::Requests],
                ),
                MetricBinding::new("jvm.gc.global.time", Aggregation::Avg, &[Dimension::GcTime]),
                MetricBinding::new(
                    "net.connection.count.in",
                    Aggregation::Sum,
                    &[Dimension::Connections],
                ),
            ],
        }
    }
}

/// Snapshot plus the queries that could not be answered
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub snapshot: MetricSnapshot,
    /// `metric_id/aggregation` of each failed query
    pub failed: Vec<String>,
}

/// Builds per-tick snapshots from a metric source
pub struct SnapshotAssembler {
    source: Arc<dyn MetricSource>,
    catalog: MetricCatalog,
    window: Duration,
}

impl SnapshotAssembler {
    pub fn new(source: Arc<dyn MetricSource>, catalog: MetricCatalog, window: Duration) -> Self {
        Self {
            source,
            catalog,
            window,
        }
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Run every catalog query once. Failed queries leave their dimensions
    /// at zero; values for services outside `services` are dropped.
    pub async fn assemble(&self, services: &[ServiceId]) -> Assembly {
        let mut assembly = Assembly {
            snapshot: services
                .iter()
                .map(|s| (s.clone(), MetricVector::default()))
                .collect(),
            failed: Vec::new(),
        };

        for binding in &self.catalog.bindings {
            let values = match self
                .source
                .fetch(services, &binding.metric_id, binding.aggregation, self.window)
                .await
            {
                Ok(values) => values,
                Err(e) => {
                    warn!(
                        metric_id = %binding.metric_id,
                        aggregation = binding.aggregation.as_str(),
                        error = %e,
                        "Metric fetch failed, using zero"
                    );
                    assembly
                        .failed
                        .push(format!("{}/{}", binding.metric_id, binding.aggregation.as_str()));
                    continue;
                }
            };

            for (service, value) in values {
                match assembly.snapshot.get_mut(&service) {
                    Some(vector) => {
                        for dimension in &binding.dimensions {
                            vector.set(*dimension, value);
                        }
                    }
                    None => debug!(service = %service, "Dropping value for unknown service"),
                }
            }
        }

        assembly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn services() -> Vec<ServiceId> {
        vec!["cart".to_string(), "orders".to_string()]
    }

    #[tokio::test]
    async fn test_assemble_fills_bound_dimensions() {
        let source = Arc::new(InMemorySource::new());
        source.set("cpu.quota.used.percent", Aggregation::Avg, "cart", 72.0).await;
        source.set("net.request.count.in", Aggregation::Sum, "cart", 88.0).await;
        source.set("net.http.request.time", Aggregation::Max, "orders", 2.5e8).await;

        let assembler =
            SnapshotAssembler::new(source, MetricCatalog::default(), Duration::from_secs(300));
        let assembly = assembler.assemble(&services()).await;

        assert!(assembly.failed.is_empty());
        let cart = assembly.snapshot["cart"];
        assert_eq!(cart.cpu_percent, 72.0);
        assert_eq!(cart.throughput, 88.0);
        assert_eq!(cart.requests, 88.0);
        assert_eq!(cart.latency, 0.0);
        assert_eq!(assembly.snapshot["orders"].latency, 2.5e8);
    }

    #[tokio::test]
    async fn test_failed_fetch_zeroes_dimension() {
        let source = Arc::new(InMemorySource::new());
        source.set("cpu.quota.used.percent", Aggregation::Avg, "cart", 72.0).await;
        source.set("memory.limit.used.percent", Aggregation::Avg, "cart", 40.0).await;
        source.fail("cpu.quota.used.percent").await;

        let assembler =
            SnapshotAssembler::new(source, MetricCatalog::default(), Duration::from_secs(300));
        let assembly = assembler.assemble(&services()).await;

        assert_eq!(assembly.failed, vec!["cpu.quota.used.percent/avg".to_string()]);
        assert_eq!(assembly.snapshot["cart"].cpu_percent, 0.0);
        assert_eq!(assembly.snapshot["cart"].memory_percent, 40.0);
    }

    #[tokio::test]
    async fn test_unknown_services_dropped() {
        let source = Arc::new(InMemorySource::new());
        source.set("cpu.quota.used.percent", Aggregation::Avg, "ghost", 99.0).await;

        let assembler =
            SnapshotAssembler::new(source, MetricCatalog::default(), Duration::from_secs(300));
        let assembly = assembler.assemble(&services()).await;

        assert_eq!(assembly.snapshot.len(), 2);
        assert!(!assembly.snapshot.contains_key("ghost"));
    }

    #[test]
    fn test_catalog_defaults() {
        let catalog = MetricCatalog::default();
        assert_eq!(catalog.bindings.len(), 6);
        let latency = &catalog.bindings[2];
        assert_eq!(latency.metric_id, "net.http.request.time");
        assert_eq!(latency.aggregation, Aggregation::Max);
    }
}

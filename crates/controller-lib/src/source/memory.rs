//! Preset metric values held in memory

use super::{Aggregation, MetricSource};
use async_trait::async_trait;
use crate::error::ControllerError;
use crate::models::ServiceId;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;

type Key = (String, Aggregation);

/// Metric source serving values set by the caller
#[derive(Default)]
pub struct InMemorySource {
    values: RwLock<HashMap<Key, HashMap<ServiceId, f64>>>,
    failing: RwLock<HashSet<String>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, metric_id: &str, aggregation: Aggregation, service: &str, value: f64) {
        self.values
            .write()
            .await
            .entry((metric_id.to_string(), aggregation))
            .or_default()
            .insert(service.to_string(), value);
    }

    /// Make every query for `metric_id` fail
    pub async fn fail(&self, metric_id: &str) {
        self.failing.write().await.insert(metric_id.to_string());
    }

    pub async fn clear(&self) {
        self.values.write().await.clear();
        self.failing.write().await.clear();
    }
}

#[async_trait]
impl MetricSource for InMemorySource {
    async fn fetch(
        &self,
        services: &[ServiceId],
        metric_id: &str,
        aggregation: Aggregation,
        _window: Duration,
    ) -> Result<HashMap<ServiceId, f64>> {
        if self.failing.read().await.contains(metric_id) {
            return Err(ControllerError::MetricSource(format!("{} unavailable", metric_id)).into());
        }

        let values = self.values.read().await;
        let Some(per_service) = values.get(&(metric_id.to_string(), aggregation)) else {
            return Ok(HashMap::new());
        };

        Ok(per_service
            .iter()
            .filter(|(service, _)| services.contains(service))
            .map(|(service, value)| (service.clone(), *value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_filters_services() {
        let source = InMemorySource::new();
        source.set("m", Aggregation::Sum, "a", 1.0).await;
        source.set("m", Aggregation::Sum, "b", 2.0).await;

        let got = source
            .fetch(&["a".to_string()], "m", Aggregation::Sum, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got["a"], 1.0);

        let other_agg = source
            .fetch(&["a".to_string()], "m", Aggregation::Avg, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(other_agg.is_empty());
    }

    #[tokio::test]
    async fn test_failing_metric() {
        let source = InMemorySource::new();
        source.fail("m").await;
        let err = source
            .fetch(&[], "m", Aggregation::Avg, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unavailable"));

        source.clear().await;
        assert!(source
            .fetch(&[], "m", Aggregation::Avg, Duration::from_secs(60))
            .await
            .is_ok());
    }
}

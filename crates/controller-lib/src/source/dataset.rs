//! Replay of recorded monitoring dumps
//!
//! Each `(metric id, aggregation)` pair lives in its own JSON file named
//! `<metric id with '.' as '_'>_<aggregation>_metric.json` with the body
//! `{"data": [{"t": <timestamp>, "d": [<service>, <value>]}, ...]}`.
//! All samples of a service are averaged.

use super::{Aggregation, MetricSource};
use async_trait::async_trait;
use crate::error::ControllerError;
use crate::models::ServiceId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// File name of the dump for one query
pub fn dump_file_name(metric_id: &str, aggregation: Aggregation) -> String {
    format!(
        "{}_{}_metric.json",
        metric_id.replace('.', "_"),
        aggregation.as_str()
    )
}

#[derive(Debug, Serialize, Deserialize)]
struct Dump {
    #[serde(default)]
    data: Vec<Sample>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Sample {
    #[serde(default)]
    t: i64,
    d: (String, Option<f64>),
}

/// Metric source reading dumps from a directory
pub struct DatasetSource {
    dir: PathBuf,
}

impl DatasetSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a dump in the replay format
    pub async fn write_dump(
        &self,
        metric_id: &str,
        aggregation: Aggregation,
        samples: &[(i64, &str, f64)],
    ) -> Result<PathBuf> {
        let dump = Dump {
            data: samples
                .iter()
                .map(|(t, service, value)| Sample {
                    t: *t,
                    d: (service.to_string(), Some(*value)),
                })
                .collect(),
        };
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create dataset dir {:?}", self.dir))?;
        let path = self.dir.join(dump_file_name(metric_id, aggregation));
        let body = serde_json::to_vec(&dump).map_err(ControllerError::from)?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write dump {:?}", path))?;
        Ok(path)
    }
}

#[async_trait]
impl MetricSource for DatasetSource {
    /// Recorded dumps already cover their capture window, so `window` is
    /// not applied.
    async fn fetch(
        &self,
        services: &[ServiceId],
        metric_id: &str,
        aggregation: Aggregation,
        _window: Duration,
    ) -> Result<HashMap<ServiceId, f64>> {
        let path = self.dir.join(dump_file_name(metric_id, aggregation));
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read dump {:?}", path))?;
        let dump: Dump = serde_json::from_str(&raw)
            .map_err(ControllerError::from)
            .with_context(|| format!("Malformed dump {:?}", path))?;

        let mut sums: HashMap<ServiceId, (f64, usize)> = HashMap::new();
        for sample in dump.data {
            let (service, value) = sample.d;
            let Some(value) = value.filter(|v| v.is_finite()) else {
                continue;
            };
            if !services.contains(&service) {
                continue;
            }
            let entry = sums.entry(service).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }

        debug!(
            metric_id = %metric_id,
            aggregation = aggregation.as_str(),
            services = sums.len(),
            "Loaded dump"
        );

        Ok(sums
            .into_iter()
            .map(|(service, (sum, count))| (service, sum / count as f64))
            .collect())
    }
}

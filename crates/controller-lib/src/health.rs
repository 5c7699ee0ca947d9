//! Liveness and readiness of the control loop
//!
//! Components report their own status after every tick. On top of that the
//! registry remembers the last completed tick: the controller becomes ready
//! only once a tick has finished, and a loop that stops ticking for longer
//! than `stale_after` is reported unhealthy.

use crate::controller::TickReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Status of one component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Working with reduced input, e.g. some metric queries failed
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            checked_at: Utc::now(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// What the last completed tick did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSummary {
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub services: usize,
    pub applied: usize,
    /// Services left in `ApplyFailed` by this tick
    pub apply_failed: usize,
}

impl From<&TickReport> for TickSummary {
    fn from(report: &TickReport) -> Self {
        Self {
            completed_at: Utc::now(),
            duration_ms: report.duration.as_millis() as u64,
            services: report.outcomes.len(),
            applied: report.applied(),
            apply_failed: report.failed(),
        }
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick: Option<TickSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick_age_secs: Option<i64>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names reported by the control loop
pub mod components {
    pub const METRIC_SOURCE: &str = "metric_source";
    pub const PLANNER: &str = "planner";
    pub const EXECUTOR: &str = "executor";
    pub const STORE: &str = "store";

    pub const ALL: [&str; 4] = [METRIC_SOURCE, PLANNER, EXECUTOR, STORE];
}

#[derive(Debug, Default)]
struct HealthState {
    components: BTreeMap<String, ComponentHealth>,
    last_tick: Option<TickSummary>,
    draining: bool,
}

/// Shared view of controller health; clones share state
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
    stale_after: Option<Duration>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the loop unhealthy when no tick completed within `stale_after`
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = Some(stale_after);
        self
    }

    /// Register every controller component as healthy
    pub async fn register_all(&self) {
        let mut state = self.state.write().await;
        for name in components::ALL {
            state
                .components
                .insert(name.to_string(), ComponentHealth::healthy());
        }
    }

    pub async fn component(&self, name: &str) -> Option<ComponentHealth> {
        self.state.read().await.components.get(name).cloned()
    }

    pub async fn set(&self, name: &str, health: ComponentHealth) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.set(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.set(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.set(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Record a completed tick
    pub async fn record_tick(&self, report: &TickReport) {
        self.state.write().await.last_tick = Some(TickSummary::from(report));
    }

    /// Stop reporting ready; used on shutdown
    pub async fn drain(&self) {
        self.state.write().await.draining = true;
    }

    fn is_stale(&self, last_tick: &TickSummary, now: DateTime<Utc>) -> bool {
        match (self.stale_after, (now - last_tick.completed_at).to_std()) {
            (Some(limit), Ok(age)) => age > limit,
            _ => false,
        }
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        let now = Utc::now();

        let mut status = state
            .components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        if let Some(tick) = &state.last_tick {
            if self.is_stale(tick, now) {
                status = ComponentStatus::Unhealthy;
            }
        }

        HealthResponse {
            status,
            components: state.components.clone(),
            last_tick: state.last_tick.clone(),
            last_tick_age_secs: state
                .last_tick
                .as_ref()
                .map(|t| (now - t.completed_at).num_seconds()),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;

        let reason = if state.draining {
            Some("Controller shutting down".to_string())
        } else {
            match &state.last_tick {
                None => Some("No control tick completed yet".to_string()),
                Some(tick) if self.is_stale(tick, Utc::now()) => Some(format!(
                    "Last control tick completed at {}",
                    tick.completed_at.to_rfc3339()
                )),
                Some(_) => {
                    let failed: Vec<&str> = state
                        .components
                        .iter()
                        .filter(|(_, h)| h.status == ComponentStatus::Unhealthy)
                        .map(|(name, _)| name.as_str())
                        .collect();
                    if failed.is_empty() {
                        None
                    } else {
                        Some(format!("Unhealthy components: {}", failed.join(", ")))
                    }
                }
            }
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}

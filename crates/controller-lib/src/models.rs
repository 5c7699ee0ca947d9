//! Core data models for the adaptation controller

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a monitored service (deployment name)
pub type ServiceId = String;

/// Metric readings for every monitored service at one tick
pub type MetricSnapshot = HashMap<ServiceId, MetricVector>;

/// Runtime readings for one service at one tick.
///
/// Readings that were not reported stay at `0.0`. Latency is expressed in
/// nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricVector {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub latency: f64,
    pub throughput: f64,
    pub gc_time: f64,
    pub connections: f64,
    pub requests: f64,
}

impl MetricVector {
    /// Read a single dimension
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Cpu => self.cpu_percent,
            Dimension::Memory => self.memory_percent,
            Dimension::Latency => self.latency,
            Dimension::Throughput => self.throughput,
            Dimension::GcTime => self.gc_time,
            Dimension::Connections => self.connections,
            Dimension::Requests => self.requests,
        }
    }

    /// Overwrite a single dimension. Non-finite values are stored as 0.
    pub fn set(&mut self, dimension: Dimension, value: f64) {
        let value = if value.is_finite() { value } else { 0.0 };
        match dimension {
            Dimension::Cpu => self.cpu_percent = value,
            Dimension::Memory => self.memory_percent = value,
            Dimension::Latency => self.latency = value,
            Dimension::Throughput => self.throughput = value,
            Dimension::GcTime => self.gc_time = value,
            Dimension::Connections => self.connections = value,
            Dimension::Requests => self.requests = value,
        }
    }
}

/// Named metric dimension of a [`MetricVector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Cpu,
    Memory,
    Latency,
    Throughput,
    GcTime,
    Connections,
    Requests,
}

/// Resource allocation of a service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// CPU in millicores
    pub cpu: f64,
    /// Memory in MB
    pub memory: f64,
    /// Replica count, always at least 1
    pub replicas: u32,
}

impl Configuration {
    pub fn new(cpu: f64, memory: f64, replicas: u32) -> Self {
        Self {
            cpu,
            memory,
            replicas: replicas.max(1),
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(500.0, 512.0, 1)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cpu={} memory={} replica={}",
            self.cpu, self.memory, self.replicas
        )
    }
}

/// Per-tick decision on whether a service should be reconsidered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationTrigger {
    NoAction,
    /// Saturated or slow: more resources wanted
    NeedsIncrease,
    /// Idle: candidate for scale-down
    NeedsDecrease,
}

impl AdaptationTrigger {
    pub fn needs_action(&self) -> bool {
        !matches!(self, AdaptationTrigger::NoAction)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdaptationTrigger::NoAction => "no_action",
            AdaptationTrigger::NeedsIncrease => "needs_increase",
            AdaptationTrigger::NeedsDecrease => "needs_decrease",
        }
    }
}

/// Cost class of a remediation action, scored by the cost dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    Cpu,
    Memory,
    Replica,
    Gc,
    /// No action taken (scoring the current operating point)
    None,
}

/// Result reported by an executor for one apply call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub success: bool,
    pub message: String,
}

impl ApplyResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

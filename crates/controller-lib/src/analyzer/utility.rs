//! Weighted utility model
//!
//! Combines per-dimension preferences into a single scalar:
//! `utility = Σ weight_d * preference_d`, cost included.

use super::preference::{CostPreference, DimensionPreference};
use crate::models::{CostCategory, MetricVector};
use serde::{Deserialize, Serialize};

/// Non-negative weight per scored dimension. Not required to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilityWeights {
    pub cpu: f64,
    pub memory: f64,
    pub latency: f64,
    pub throughput: f64,
    pub gc_time: f64,
    pub cost: f64,
}

impl Default for UtilityWeights {
    fn default() -> Self {
        Self {
            cpu: 0.2,
            memory: 0.2,
            latency: 0.45,
            throughput: 0.15,
            gc_time: 0.15,
            cost: 0.1,
        }
    }
}

impl UtilityWeights {
    pub fn total(&self) -> f64 {
        self.cpu + self.memory + self.latency + self.throughput + self.gc_time + self.cost
    }

    pub(crate) fn all(&self) -> [f64; 6] {
        [
            self.cpu,
            self.memory,
            self.latency,
            self.throughput,
            self.gc_time,
            self.cost,
        ]
    }
}

/// Preference curves for every scored dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceSet {
    pub cpu: DimensionPreference,
    pub memory: DimensionPreference,
    /// Latency curve, in nanoseconds
    pub latency: DimensionPreference,
    pub throughput: DimensionPreference,
    pub gc_time: DimensionPreference,
    pub cost: CostPreference,
}

impl Default for PreferenceSet {
    fn default() -> Self {
        Self::linear()
    }
}

impl PreferenceSet {
    /// Linear ramps over the observed operating ranges
    pub fn linear() -> Self {
        Self {
            cpu: DimensionPreference::linear(0.0, 100.0),
            memory: DimensionPreference::linear(0.0, 100.0),
            latency: DimensionPreference::linear(0.0, 2e9),
            throughput: DimensionPreference::linear(50.0, 100.0).inverted(),
            gc_time: DimensionPreference::linear(0.0, 500.0),
            cost: CostPreference::default(),
        }
    }

    /// Three-tier step curves
    pub fn step_tiers() -> Self {
        Self {
            cpu: DimensionPreference::step(25.0, 50.0),
            memory: DimensionPreference::step(25.0, 50.0),
            latency: DimensionPreference::step(1e7, 2e7),
            throughput: DimensionPreference::step(100.0, 50.0).inverted(),
            gc_time: DimensionPreference::step(200.0, 500.0),
            cost: CostPreference::default(),
        }
    }
}

/// Per-dimension breakdown of a utility computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilityBreakdown {
    pub cpu: f64,
    pub memory: f64,
    pub latency: f64,
    pub throughput: f64,
    pub gc_time: f64,
    pub cost: f64,
}

impl UtilityBreakdown {
    pub fn total(&self) -> f64 {
        self.cpu + self.memory + self.latency + self.throughput + self.gc_time + self.cost
    }
}

/// Utility function built from weights and preference curves
#[derive(Debug, Clone)]
pub struct UtilityModel {
    weights: UtilityWeights,
    preferences: PreferenceSet,
}

impl UtilityModel {
    pub fn new(weights: UtilityWeights, preferences: PreferenceSet) -> Self {
        Self {
            weights,
            preferences,
        }
    }

    pub fn weights(&self) -> &UtilityWeights {
        &self.weights
    }

    /// Score an operating point under a given remediation cost class
    pub fn calculate_utility(&self, metrics: &MetricVector, cost: CostCategory) -> f64 {
        self.breakdown(metrics, cost).total()
    }

    /// Weighted contribution of each dimension
    pub fn breakdown(&self, metrics: &MetricVector, cost: CostCategory) -> UtilityBreakdown {
        let p = &self.preferences;
        let w = &self.weights;
        UtilityBreakdown {
            cpu: w.cpu * p.cpu.score(metrics.cpu_percent),
            memory: w.memory * p.memory.score(metrics.memory_percent),
            latency: w.latency * p.latency.score(metrics.latency),
            throughput: w.throughput * p.throughput.score(metrics.throughput),
            gc_time: w.gc_time * p.gc_time.score(metrics.gc_time),
            cost: w.cost * p.cost.score(cost),
        }
    }
}

impl Default for UtilityModel {
    fn default() -> Self {
        Self::new(UtilityWeights::default(), PreferenceSet::default())
    }
}

//! Load scenario detection
//!
//! Flags "load fluctuation" from an exponential moving average and the
//! variance of recent combined-load samples, and "high concurrency" from
//! the active connection count. Used alongside the analyzer trigger.

mod window;

pub use window::{LoadWindow, DEFAULT_WINDOW_CAPACITY};

use crate::models::MetricVector;
use serde::{Deserialize, Serialize};

/// Weighted blend producing the combined load score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBlend {
    pub cpu_weight: f64,
    pub memory_weight: f64,
    pub connections_weight: f64,
    pub requests_weight: f64,
    /// Connections count mapped to a full share
    pub connections_scale: f64,
    /// Request count mapped to a full share
    pub requests_scale: f64,
}

impl Default for LoadBlend {
    fn default() -> Self {
        Self {
            cpu_weight: 0.4,
            memory_weight: 0.3,
            connections_weight: 0.2,
            requests_weight: 0.1,
            connections_scale: 1000.0,
            requests_scale: 1000.0,
        }
    }
}

impl LoadBlend {
    /// Combined load on a 0-100 scale. Not clamped: readings beyond the
    /// normalizers push it past 100.
    pub fn combined_load(&self, m: &MetricVector) -> f64 {
        let share = |value: f64, scale: f64| if scale > 0.0 { value / scale } else { 0.0 };
        100.0
            * (self.cpu_weight * m.cpu_percent / 100.0
                + self.memory_weight * m.memory_percent / 100.0
                + self.connections_weight * share(m.connections, self.connections_scale)
                + self.requests_weight * share(m.requests, self.requests_scale))
    }
}

/// Scenario detector parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// EMA smoothing factor in (0, 1]
    pub ema_alpha: f64,
    /// Allowed deviation of the current load from the EMA
    pub ema_threshold: f64,
    /// Allowed variance of the recent load window
    pub variance_threshold: f64,
    /// Connection count above which concurrency is high
    pub concurrency_threshold: f64,
    /// Rolling window capacity per service
    pub window_capacity: usize,
    pub blend: LoadBlend,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.2,
            ema_threshold: 5.0,
            variance_threshold: 10.0,
            concurrency_threshold: 100.0,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            blend: LoadBlend::default(),
        }
    }
}

/// Scenario label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioFlag {
    LoadFluctuation,
    HighConcurrency,
}

impl ScenarioFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioFlag::LoadFluctuation => "load_fluctuation",
            ScenarioFlag::HighConcurrency => "high_concurrency",
        }
    }
}

/// Set of zero, one or both scenario labels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioFlags {
    pub load_fluctuation: bool,
    pub high_concurrency: bool,
}

impl ScenarioFlags {
    pub fn is_empty(&self) -> bool {
        !self.load_fluctuation && !self.high_concurrency
    }

    pub fn contains(&self, flag: ScenarioFlag) -> bool {
        match flag {
            ScenarioFlag::LoadFluctuation => self.load_fluctuation,
            ScenarioFlag::HighConcurrency => self.high_concurrency,
        }
    }

    pub fn labels(&self) -> Vec<ScenarioFlag> {
        let mut out = Vec::with_capacity(2);
        if self.load_fluctuation {
            out.push(ScenarioFlag::LoadFluctuation);
        }
        if self.high_concurrency {
            out.push(ScenarioFlag::HighConcurrency);
        }
        out
    }
}

/// Per-service smoothing state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EmaState {
    value: Option<f64>,
}

impl EmaState {
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Fold a sample in; the first sample seeds the average
    pub fn update(&mut self, alpha: f64, sample: f64) -> f64 {
        let next = match self.value {
            None => sample,
            Some(prev) => alpha * sample + (1.0 - alpha) * prev,
        };
        self.value = Some(next);
        next
    }
}

/// Result of analyzing one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioReport {
    pub flags: ScenarioFlags,
    /// Load computed for this sample; the caller appends it to the window
    pub combined_load: f64,
    pub ema: f64,
    /// Variance of the window before this sample
    pub variance: f64,
}

/// Verdict over a batch of samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchVerdict {
    pub flagged: usize,
    pub clean: usize,
}

impl BatchVerdict {
    /// Majority vote: strictly more flagged ticks than clean ones
    pub fn requires_adaptation(&self) -> bool {
        self.flagged > self.clean
    }
}

/// Majority vote over already-computed reports
pub fn majority_vote(reports: &[ScenarioReport]) -> BatchVerdict {
    let flagged = reports.iter().filter(|r| !r.flags.is_empty()).count();
    BatchVerdict {
        flagged,
        clean: reports.len() - flagged,
    }
}

/// Stateless detector; smoothing state and windows are owned per service
#[derive(Debug, Clone, Default)]
pub struct ScenarioDetector {
    config: ScenarioConfig,
}

impl ScenarioDetector {
    pub fn new(config: ScenarioConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn combined_load(&self, metrics: &MetricVector) -> f64 {
        self.config.blend.combined_load(metrics)
    }

    /// Analyze one sample against the service's EMA state and recent window.
    ///
    /// Updates the EMA; does not touch the window.
    pub fn analyze(
        &self,
        ema: &mut EmaState,
        window: &LoadWindow,
        metrics: &MetricVector,
    ) -> ScenarioReport {
        let load = self.combined_load(metrics);
        let smoothed = ema.update(self.config.ema_alpha, load);

        let deviates = (load - smoothed).abs() > self.config.ema_threshold;
        let variance = window.variance();
        let load_fluctuation = if window.is_empty() {
            deviates
        } else {
            deviates || variance > self.config.variance_threshold
        };

        ScenarioReport {
            flags: ScenarioFlags {
                load_fluctuation,
                high_concurrency: metrics.connections > self.config.concurrency_threshold,
            },
            combined_load: load,
            ema: smoothed,
            variance,
        }
    }

    /// Analyze a batch of historical samples in order, appending each load
    /// to the window, and take the majority vote.
    pub fn scan_batch(
        &self,
        ema: &mut EmaState,
        window: &mut LoadWindow,
        samples: &[MetricVector],
    ) -> BatchVerdict {
        let reports: Vec<ScenarioReport> = samples
            .iter()
            .map(|m| {
                let report = self.analyze(ema, window, m);
                window.push(report.combined_load);
                report
            })
            .collect();
        majority_vote(&reports)
    }

    /// Fresh window sized from the configuration
    pub fn new_window(&self) -> LoadWindow {
        LoadWindow::new(self.config.window_capacity)
    }
}

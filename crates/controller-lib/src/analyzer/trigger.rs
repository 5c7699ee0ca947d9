//! Adaptation trigger policy
//!
//! A service needs more resources when any hard threshold is breached, and
//! is a scale-down candidate when CPU or memory sits idle. All comparisons
//! are strict.

use crate::models::{AdaptationTrigger, MetricVector};
use serde::{Deserialize, Serialize};

/// Hard thresholds for the trigger decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerThresholds {
    /// CPU percent above which the service is saturated
    pub cpu_high: f64,
    /// Memory percent above which the service is saturated
    pub memory_high: f64,
    /// Latency ceiling in nanoseconds
    pub latency_ceiling: f64,
    /// Throughput below which the service is underperforming
    pub throughput_floor: f64,
    /// GC time ceiling
    pub gc_time_ceiling: f64,
    /// CPU percent below which the service is idle
    pub cpu_idle: f64,
    /// Memory percent below which the service is idle
    pub memory_idle: f64,
}

impl Default for TriggerThresholds {
    fn default() -> Self {
        Self {
            cpu_high: 80.0,
            memory_high: 80.0,
            latency_ceiling: 1e9,
            throughput_floor: 50.0,
            gc_time_ceiling: 500.0,
            cpu_idle: 10.0,
            memory_idle: 10.0,
        }
    }
}

impl TriggerThresholds {
    /// True when any saturation threshold is breached
    pub fn is_breached(&self, m: &MetricVector) -> bool {
        m.cpu_percent > self.cpu_high
            || m.memory_percent > self.memory_high
            || m.latency > self.latency_ceiling
            || m.throughput < self.throughput_floor
            || m.gc_time > self.gc_time_ceiling
    }

    /// True when CPU or memory is idle
    pub fn is_idle(&self, m: &MetricVector) -> bool {
        m.cpu_percent < self.cpu_idle || m.memory_percent < self.memory_idle
    }

    pub fn evaluate(&self, m: &MetricVector) -> AdaptationTrigger {
        if self.is_breached(m) {
            AdaptationTrigger::NeedsIncrease
        } else if self.is_idle(m) {
            AdaptationTrigger::NeedsDecrease
        } else {
            AdaptationTrigger::NoAction
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(cpu: f64, memory: f64, latency: f64, tps: f64, gc: f64) -> MetricVector {
        MetricVector {
            cpu_percent: cpu,
            memory_percent: memory,
            latency,
            throughput: tps,
            gc_time: gc,
            ..Default::default()
        }
    }

    #[test]
    fn test_cpu_breach_triggers() {
        let t = TriggerThresholds::default();
        let trigger = t.evaluate(&metrics(85.0, 50.0, 0.0, 80.0, 0.0));
        assert_eq!(trigger, AdaptationTrigger::NeedsIncrease);
        assert!(trigger.needs_action());
    }

    #[test]
    fn test_no_breach_no_action() {
        let t = TriggerThresholds::default();
        let trigger = t.evaluate(&metrics(50.0, 50.0, 0.0, 80.0, 0.0));
        assert_eq!(trigger, AdaptationTrigger::NoAction);
        assert!(!trigger.needs_action());
    }

    #[test]
    fn test_thresholds_are_strict() {
        let t = TriggerThresholds::default();
        assert_eq!(
            t.evaluate(&metrics(80.0, 80.0, 1e9, 50.0, 500.0)),
            AdaptationTrigger::NoAction
        );
        assert_eq!(
            t.evaluate(&metrics(50.0, 10.0, 0.0, 80.0, 0.0)),
            AdaptationTrigger::NoAction
        );
    }

    #[test]
    fn test_each_breach() {
        let t = TriggerThresholds::default();
        let base = metrics(50.0, 50.0, 0.0, 80.0, 0.0);
        let cases = [
            MetricVector { memory_percent: 80.1, ..base },
            MetricVector { latency: 1.1e9, ..base },
            MetricVector { throughput: 49.9, ..base },
            MetricVector { gc_time: 501.0, ..base },
        ];
        for m in cases {
            assert_eq!(t.evaluate(&m), AdaptationTrigger::NeedsIncrease, "{:?}", m);
        }
    }

    #[test]
    fn test_idle_triggers_decrease() {
        let t = TriggerThresholds::default();
        assert_eq!(
            t.evaluate(&metrics(5.0, 50.0, 0.0, 80.0, 0.0)),
            AdaptationTrigger::NeedsDecrease
        );
        assert_eq!(
            t.evaluate(&metrics(50.0, 9.9, 0.0, 80.0, 0.0)),
            AdaptationTrigger::NeedsDecrease
        );
    }

    #[test]
    fn test_breach_wins_over_idle() {
        let t = TriggerThresholds::default();
        assert_eq!(
            t.evaluate(&metrics(5.0, 90.0, 0.0, 80.0, 0.0)),
            AdaptationTrigger::NeedsIncrease
        );
    }

    #[test]
    fn test_latency_ceiling_scale_is_nanoseconds() {
        // 999 ms is within the one-second ceiling; a millisecond reading of
        // 1000 would never trip it, so readings must arrive in nanoseconds.
        let t = TriggerThresholds::default();
        assert!(!t.is_breached(&metrics(50.0, 50.0, 999e6, 80.0, 0.0)));
        assert!(t.is_breached(&metrics(50.0, 50.0, 1.001e9, 80.0, 0.0)));
        assert!(!t.is_breached(&metrics(50.0, 50.0, 1000.0, 80.0, 0.0)));
    }

    #[test]
    fn test_missing_throughput_reads_as_breach() {
        let t = TriggerThresholds::default();
        assert_eq!(
            t.evaluate(&MetricVector {
                cpu_percent: 50.0,
                memory_percent: 50.0,
                ..Default::default()
            }),
            AdaptationTrigger::NeedsIncrease
        );
    }
}

//! Threshold-driven step strategy
//!
//! Scales replicas when the service is slow or saturated on both resources,
//! otherwise nudges CPU and memory one step at a time.

use super::{Action, Plan, Planner, PlannerConfig, Proposal};
use crate::models::{AdaptationTrigger, Configuration, MetricVector};
use serde::{Deserialize, Serialize};

/// Utilization bands for the step strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalThresholds {
    pub cpu_upper: f64,
    pub cpu_lower: f64,
    pub memory_upper: f64,
    pub memory_lower: f64,
}

impl Default for IncrementalThresholds {
    fn default() -> Self {
        Self {
            cpu_upper: 80.0,
            cpu_lower: 10.0,
            memory_upper: 80.0,
            memory_lower: 10.0,
        }
    }
}

pub struct IncrementalPlanner {
    config: PlannerConfig,
    /// Latency in nanoseconds above which replicas are added
    latency_ceiling: f64,
}

impl IncrementalPlanner {
    pub fn new(config: PlannerConfig, latency_ceiling: f64) -> Self {
        Self {
            config,
            latency_ceiling,
        }
    }

    fn within_max_cpu(&self, cpu: f64) -> bool {
        self.config.bounds.max_cpu.map_or(true, |max| cpu <= max)
    }

    fn within_max_memory(&self, memory: f64) -> bool {
        self.config.bounds.max_memory.map_or(true, |max| memory <= max)
    }

    /// Next configuration and the actions that produced it
    fn step(&self, m: &MetricVector, current: &Configuration) -> (Configuration, Vec<Action>) {
        let t = &self.config.incremental;
        let bounds = &self.config.bounds;
        let steps = &self.config.steps;
        let mut next = *current;
        let mut actions = Vec::new();

        let slow = m.latency > self.latency_ceiling;
        let saturated = m.cpu_percent > t.cpu_upper && m.memory_percent > t.memory_upper;
        let idle = m.cpu_percent < t.cpu_lower && m.memory_percent < t.memory_lower;

        if (slow || saturated) && current.replicas < bounds.max_replicas {
            next.replicas += 1;
            actions.push(Action::IncreaseReplicas);
            if self.within_max_cpu(next.cpu + steps.cpu) {
                next.cpu += steps.cpu;
                actions.push(Action::IncreaseCpu);
            }
            if self.within_max_memory(next.memory + steps.memory) {
                next.memory += steps.memory;
                actions.push(Action::IncreaseMemory);
            }
            return (next, actions);
        }

        if idle && current.replicas > bounds.min_replicas {
            next.replicas -= 1;
            actions.push(Action::DecreaseReplicas);
            if next.cpu > bounds.min_cpu {
                next.cpu = (next.cpu - steps.cpu).max(bounds.min_cpu);
                actions.push(Action::DecreaseCpu);
            }
            if next.memory > bounds.min_memory {
                next.memory = (next.memory - steps.memory).max(bounds.min_memory);
                actions.push(Action::DecreaseMemory);
            }
            return (next, actions);
        }

        if m.cpu_percent > t.cpu_upper {
            if self.within_max_cpu(next.cpu + steps.cpu) {
                next.cpu += steps.cpu;
                actions.push(Action::IncreaseCpu);
            }
        } else if m.cpu_percent < t.cpu_lower && next.cpu > bounds.min_cpu {
            next.cpu = (next.cpu - steps.cpu).max(bounds.min_cpu);
            actions.push(Action::DecreaseCpu);
        }

        if m.memory_percent > t.memory_upper {
            if self.within_max_memory(next.memory + steps.memory) {
                next.memory += steps.memory;
                actions.push(Action::IncreaseMemory);
            }
        } else if m.memory_percent < t.memory_lower && next.memory > bounds.min_memory {
            next.memory = (next.memory - steps.memory).max(bounds.min_memory);
            actions.push(Action::DecreaseMemory);
        }

        (next, actions)
    }
}

impl Planner for IncrementalPlanner {
    fn name(&self) -> &'static str {
        "incremental"
    }

    fn generate(
        &self,
        service: &str,
        trigger: AdaptationTrigger,
        metrics: &MetricVector,
        current: &Configuration,
    ) -> Plan {
        match self.alternatives(service, trigger, metrics, current).pop() {
            Some(proposal) => Plan::Change(proposal),
            None => Plan::NoChange,
        }
    }

    fn alternatives(
        &self,
        _service: &str,
        trigger: AdaptationTrigger,
        metrics: &MetricVector,
        current: &Configuration,
    ) -> Vec<Proposal> {
        if !trigger.needs_action() {
            return Vec::new();
        }
        let (configuration, actions) = self.step(metrics, current);
        if configuration == *current {
            return Vec::new();
        }
        vec![Proposal {
            actions,
            configuration,
            predicted_utility: None,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ResourceBounds;

    fn planner() -> IncrementalPlanner {
        IncrementalPlanner::new(PlannerConfig::default(), 1e9)
    }

    fn metrics(cpu: f64, memory: f64, latency: f64) -> MetricVector {
        MetricVector {
            cpu_percent: cpu,
            memory_percent: memory,
            latency,
            throughput: 80.0,
            ..Default::default()
        }
    }

    fn next(p: &IncrementalPlanner, m: &MetricVector, c: &Configuration) -> Option<Configuration> {
        p.generate("svc", AdaptationTrigger::NeedsIncrease, m, c)
            .proposal()
            .map(|p| p.configuration)
    }

    #[test]
    fn test_cpu_only_saturation_steps_cpu() {
        let c = next(&planner(), &metrics(90.0, 40.0, 0.0), &Configuration::default());
        assert_eq!(c, Some(Configuration::new(600.0, 512.0, 1)));
    }

    #[test]
    fn test_both_saturated_scales_out() {
        let p = planner();
        let plan = p.generate(
            "svc",
            AdaptationTrigger::NeedsIncrease,
            &metrics(90.0, 90.0, 0.0),
            &Configuration::default(),
        );
        let proposal = plan.proposal().unwrap();
        assert_eq!(proposal.configuration, Configuration::new(600.0, 768.0, 2));
        assert_eq!(
            proposal.actions,
            vec![Action::IncreaseReplicas, Action::IncreaseCpu, Action::IncreaseMemory]
        );
    }

    #[test]
    fn test_slow_service_scales_out() {
        let c = next(&planner(), &metrics(50.0, 50.0, 2e9), &Configuration::default());
        assert_eq!(c.map(|c| c.replicas), Some(2));
    }

    #[test]
    fn test_idle_scales_in_with_floors() {
        let p = planner();
        let c = p
            .generate(
                "svc",
                AdaptationTrigger::NeedsDecrease,
                &metrics(5.0, 5.0, 0.0),
                &Configuration::new(150.0, 300.0, 3),
            )
            .proposal()
            .map(|p| p.configuration);
        assert_eq!(c, Some(Configuration::new(100.0, 256.0, 2)));
    }

    #[test]
    fn test_per_resource_decrease_floored() {
        let p = planner();
        let c = p
            .generate(
                "svc",
                AdaptationTrigger::NeedsDecrease,
                &metrics(5.0, 50.0, 0.0),
                &Configuration::new(150.0, 512.0, 1),
            )
            .proposal()
            .map(|p| p.configuration);
        assert_eq!(c, Some(Configuration::new(100.0, 512.0, 1)));

        let at_floor = Configuration::new(100.0, 256.0, 1);
        let plan = p.generate(
            "svc",
            AdaptationTrigger::NeedsDecrease,
            &metrics(5.0, 5.0, 0.0),
            &at_floor,
        );
        assert_eq!(plan, Plan::NoChange);
    }

    #[test]
    fn test_replicas_stay_in_bounds_under_extremes() {
        let p = planner();
        let bounds = ResourceBounds::default();
        let mut c = Configuration::default();
        for _ in 0..20 {
            if let Some(n) = next(&p, &metrics(99.0, 99.0, 5e9), &c) {
                c = n;
            }
            assert!(c.replicas <= bounds.max_replicas);
        }
        assert_eq!(c.replicas, bounds.max_replicas);

        for _ in 0..60 {
            let plan = p.generate(
                "svc",
                AdaptationTrigger::NeedsDecrease,
                &metrics(0.0, 0.0, 0.0),
                &c,
            );
            if let Some(n) = plan.proposal() {
                c = n.configuration;
            }
            assert!(c.replicas >= bounds.min_replicas);
        }
        assert_eq!(c.replicas, bounds.min_replicas);
        assert_eq!(c.cpu, bounds.min_cpu);
        assert_eq!(c.memory, bounds.min_memory);
    }

    #[test]
    fn test_no_action_is_no_change() {
        let plan = planner().generate(
            "svc",
            AdaptationTrigger::NoAction,
            &metrics(99.0, 99.0, 0.0),
            &Configuration::default(),
        );
        assert_eq!(plan, Plan::NoChange);
    }

    #[test]
    fn test_max_cpu_caps_step() {
        let config = PlannerConfig {
            bounds: ResourceBounds {
                max_cpu: Some(550.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let p = IncrementalPlanner::new(config, 1e9);
        let plan = p.generate(
            "svc",
            AdaptationTrigger::NeedsIncrease,
            &metrics(95.0, 40.0, 0.0),
            &Configuration::default(),
        );
        assert_eq!(plan, Plan::NoChange);
    }
}

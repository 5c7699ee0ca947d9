//! Reconfiguration planning
//!
//! Given a trigger, the current metrics and the current configuration, a
//! planner proposes the next configuration. Planners never mutate the
//! configuration they are handed.

mod discrete;
mod exploration;
mod incremental;

pub use discrete::DiscretePlanner;
pub use exploration::{ExplorationConfig, ExploringPlanner};
pub use incremental::{IncrementalPlanner, IncrementalThresholds};

use crate::analyzer::Analyzer;
use crate::models::{AdaptationTrigger, Configuration, CostCategory, MetricVector};
use crate::policy::PolicyConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Remediation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    IncreaseCpu,
    IncreaseMemory,
    IncreaseReplicas,
    /// Give the heap more headroom to cut collection time
    OptimizeGc,
    DecreaseCpu,
    DecreaseMemory,
    DecreaseReplicas,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::IncreaseCpu => "increase_cpu",
            Action::IncreaseMemory => "increase_memory",
            Action::IncreaseReplicas => "increase_replicas",
            Action::OptimizeGc => "optimize_gc",
            Action::DecreaseCpu => "decrease_cpu",
            Action::DecreaseMemory => "decrease_memory",
            Action::DecreaseReplicas => "decrease_replicas",
        }
    }

    pub fn cost(&self) -> CostCategory {
        match self {
            Action::IncreaseCpu | Action::DecreaseCpu => CostCategory::Cpu,
            Action::IncreaseMemory | Action::DecreaseMemory => CostCategory::Memory,
            Action::IncreaseReplicas | Action::DecreaseReplicas => CostCategory::Replica,
            Action::OptimizeGc => CostCategory::Gc,
        }
    }

    /// Expected effect of the action on the metric vector
    pub fn default_projection(&self) -> Projection {
        match self {
            Action::IncreaseCpu => Projection {
                cpu_divisor: 1.5,
                latency_divisor: 1.2,
                throughput_multiplier: 1.1,
                ..Projection::identity()
            },
            Action::IncreaseMemory => Projection {
                memory_divisor: 2.0,
                latency_divisor: 1.1,
                throughput_multiplier: 1.05,
                gc_divisor: 1.5,
                ..Projection::identity()
            },
            Action::IncreaseReplicas => Projection {
                cpu_divisor: 1.2,
                memory_divisor: 1.2,
                latency_divisor: 1.5,
                throughput_multiplier: 1.5,
                gc_divisor: 1.1,
            },
            Action::OptimizeGc => Projection {
                latency_divisor: 1.05,
                gc_divisor: 2.0,
                ..Projection::identity()
            },
            Action::DecreaseCpu => Action::IncreaseCpu.default_projection().inverse(),
            Action::DecreaseMemory => Action::IncreaseMemory.default_projection().inverse(),
            Action::DecreaseReplicas => Action::IncreaseReplicas.default_projection().inverse(),
        }
    }

    /// Configuration after taking the action with the given step sizes
    pub fn apply_to(&self, current: &Configuration, steps: &StepSizes) -> Configuration {
        let mut next = *current;
        match self {
            Action::IncreaseCpu => next.cpu += steps.cpu,
            Action::DecreaseCpu => next.cpu -= steps.cpu,
            Action::IncreaseMemory | Action::OptimizeGc => next.memory += steps.memory,
            Action::DecreaseMemory => next.memory -= steps.memory,
            Action::IncreaseReplicas => next.replicas = next.replicas.saturating_add(1),
            // Zero replicas is rejected by the bounds check
            Action::DecreaseReplicas => next.replicas = next.replicas.saturating_sub(1),
        }
        next
    }
}

/// Multiplicative effect of an action on each scored dimension
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Projection {
    pub cpu_divisor: f64,
    pub memory_divisor: f64,
    pub latency_divisor: f64,
    pub throughput_multiplier: f64,
    pub gc_divisor: f64,
}

impl Default for Projection {
    fn default() -> Self {
        Self::identity()
    }
}

impl Projection {
    pub fn identity() -> Self {
        Self {
            cpu_divisor: 1.0,
            memory_divisor: 1.0,
            latency_divisor: 1.0,
            throughput_multiplier: 1.0,
            gc_divisor: 1.0,
        }
    }

    /// Projection undoing this one
    pub fn inverse(&self) -> Self {
        Self {
            cpu_divisor: 1.0 / self.cpu_divisor,
            memory_divisor: 1.0 / self.memory_divisor,
            latency_divisor: 1.0 / self.latency_divisor,
            throughput_multiplier: 1.0 / self.throughput_multiplier,
            gc_divisor: 1.0 / self.gc_divisor,
        }
    }

    pub fn factors(&self) -> [f64; 5] {
        [
            self.cpu_divisor,
            self.memory_divisor,
            self.latency_divisor,
            self.throughput_multiplier,
            self.gc_divisor,
        ]
    }

    /// Projected metrics; dimensions without a factor pass through
    pub fn apply(&self, m: &MetricVector) -> MetricVector {
        MetricVector {
            cpu_percent: m.cpu_percent / self.cpu_divisor,
            memory_percent: m.memory_percent / self.memory_divisor,
            latency: m.latency / self.latency_divisor,
            throughput: m.throughput * self.throughput_multiplier,
            gc_time: m.gc_time / self.gc_divisor,
            ..*m
        }
    }
}

/// Candidate considered by the discrete strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateAction {
    pub action: Action,
    #[serde(default)]
    pub projection: Option<Projection>,
}

impl CandidateAction {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            projection: None,
        }
    }

    /// Configured projection, or the action's default
    pub fn projection(&self) -> Projection {
        self.projection
            .unwrap_or_else(|| self.action.default_projection())
    }
}

/// Resource step sizes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepSizes {
    /// Millicores
    pub cpu: f64,
    /// MB
    pub memory: f64,
}

impl Default for StepSizes {
    fn default() -> Self {
        Self {
            cpu: 100.0,
            memory: 256.0,
        }
    }
}

/// Limits every proposed configuration must respect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceBounds {
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub min_cpu: f64,
    pub min_memory: f64,
    pub max_cpu: Option<f64>,
    pub max_memory: Option<f64>,
}

impl Default for ResourceBounds {
    fn default() -> Self {
        Self {
            min_replicas: 1,
            max_replicas: 4,
            min_cpu: 100.0,
            min_memory: 256.0,
            max_cpu: None,
            max_memory: None,
        }
    }
}

impl ResourceBounds {
    pub fn admits(&self, c: &Configuration) -> bool {
        c.replicas >= self.min_replicas
            && c.replicas <= self.max_replicas
            && c.cpu >= self.min_cpu
            && c.memory >= self.min_memory
            && self.max_cpu.map_or(true, |max| c.cpu <= max)
            && self.max_memory.map_or(true, |max| c.memory <= max)
    }
}

/// Which planning strategy to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerStrategy {
    #[default]
    Discrete,
    Incremental,
}

/// Planner parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub strategy: PlannerStrategy,
    /// Enumeration order is the tie-break order
    pub increase_candidates: Vec<CandidateAction>,
    pub decrease_candidates: Vec<CandidateAction>,
    pub steps: StepSizes,
    pub bounds: ResourceBounds,
    pub incremental: IncrementalThresholds,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            strategy: PlannerStrategy::Discrete,
            increase_candidates: vec![
                CandidateAction::new(Action::IncreaseCpu),
                CandidateAction::new(Action::IncreaseMemory),
                CandidateAction::new(Action::IncreaseReplicas),
                CandidateAction::new(Action::OptimizeGc),
            ],
            decrease_candidates: vec![
                CandidateAction::new(Action::DecreaseCpu),
                CandidateAction::new(Action::DecreaseMemory),
                CandidateAction::new(Action::DecreaseReplicas),
            ],
            steps: StepSizes::default(),
            bounds: ResourceBounds::default(),
            incremental: IncrementalThresholds::default(),
        }
    }
}

/// A proposed reconfiguration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Actions combined into this proposal, in the order taken
    pub actions: Vec<Action>,
    pub configuration: Configuration,
    /// Utility of the projected metrics, when the strategy scores candidates
    pub predicted_utility: Option<f64>,
}

/// Planner output
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    NoChange,
    Change(Proposal),
}

impl Plan {
    pub fn is_change(&self) -> bool {
        matches!(self, Plan::Change(_))
    }

    pub fn proposal(&self) -> Option<&Proposal> {
        match self {
            Plan::Change(p) => Some(p),
            Plan::NoChange => None,
        }
    }
}

/// Trait for planning strategies
pub trait Planner: Send + Sync {
    /// Strategy name for logs and metrics
    fn name(&self) -> &'static str;

    /// Best next configuration, or `NoChange`
    fn generate(
        &self,
        service: &str,
        trigger: AdaptationTrigger,
        metrics: &MetricVector,
        current: &Configuration,
    ) -> Plan;

    /// Every viable proposal in enumeration order
    fn alternatives(
        &self,
        service: &str,
        trigger: AdaptationTrigger,
        metrics: &MetricVector,
        current: &Configuration,
    ) -> Vec<Proposal>;
}

/// Build the planner described by a policy, wrapped for exploration when enabled
pub fn build_planner(policy: &PolicyConfig) -> Arc<dyn Planner> {
    let inner: Box<dyn Planner> = match policy.planner.strategy {
        PlannerStrategy::Discrete => Box::new(DiscretePlanner::new(
            Analyzer::from_policy(policy),
            policy.planner.clone(),
        )),
        PlannerStrategy::Incremental => Box::new(IncrementalPlanner::new(
            policy.planner.clone(),
            policy.trigger.latency_ceiling,
        )),
    };

    if policy.exploration.enabled {
        Arc::new(ExploringPlanner::new(inner, policy.exploration))
    } else {
        Arc::from(inner)
    }
}

//! Epsilon-greedy exploration around another planner

use super::{Plan, Planner, Proposal};
use crate::models::{AdaptationTrigger, Configuration, MetricVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;

/// Exploration settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    pub enabled: bool,
    /// Initial exploration probability
    pub epsilon: f64,
    /// Multiplier applied after every decision
    pub decay: f64,
    /// Floor for the decayed probability
    pub min_epsilon: f64,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            epsilon: 1.0,
            decay: 0.995,
            min_epsilon: 0.1,
            seed: None,
        }
    }
}

struct ExplorationState {
    epsilon: f64,
    rng: StdRng,
}

/// Delegates to an inner planner, but with probability epsilon returns a
/// uniformly chosen viable alternative instead of the best one.
pub struct ExploringPlanner {
    inner: Box<dyn Planner>,
    config: ExplorationConfig,
    state: Mutex<ExplorationState>,
}

impl ExploringPlanner {
    pub fn new(inner: Box<dyn Planner>, config: ExplorationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            inner,
            config,
            state: Mutex::new(ExplorationState {
                epsilon: config.epsilon,
                rng,
            }),
        }
    }

    /// Current exploration probability
    pub fn epsilon(&self) -> f64 {
        match self.state.lock() {
            Ok(state) => state.epsilon,
            Err(poisoned) => poisoned.into_inner().epsilon,
        }
    }

    /// Decide whether to explore and, if so, pick an index below `choices`
    fn roll(&self, choices: usize) -> Option<usize> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let explore = state.rng.gen::<f64>() < state.epsilon;
        state.epsilon = (state.epsilon * self.config.decay).max(self.config.min_epsilon);

        if explore && choices > 0 {
            Some(state.rng.gen_range(0..choices))
        } else {
            None
        }
    }
}

impl Planner for ExploringPlanner {
    fn name(&self) -> &'static str {
        "exploring"
    }

    fn generate(
        &self,
        service: &str,
        trigger: AdaptationTrigger,
        metrics: &MetricVector,
        current: &Configuration,
    ) -> Plan {
        if !trigger.needs_action() {
            return Plan::NoChange;
        }

        let mut alternatives = self.inner.alternatives(service, trigger, metrics, current);
        match self.roll(alternatives.len()) {
            Some(index) => {
                let proposal = alternatives.swap_remove(index);
                info!(
                    service = %service,
                    strategy = self.inner.name(),
                    configuration = %proposal.configuration,
                    "Exploring alternative configuration"
                );
                Plan::Change(proposal)
            }
            None => self.inner.generate(service, trigger, metrics, current),
        }
    }

    fn alternatives(
        &self,
        service: &str,
        trigger: AdaptationTrigger,
        metrics: &MetricVector,
        current: &Configuration,
    ) -> Vec<Proposal> {
        self.inner.alternatives(service, trigger, metrics, current)
    }
}

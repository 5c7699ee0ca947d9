//! Adaptation policy
//!
//! Every tunable of the decision engine in one serde value. Missing fields
//! take their defaults, so a policy file only needs the overrides.

use crate::analyzer::{PreferenceSet, TriggerThresholds, UtilityWeights};
use crate::error::{ControllerError, ControllerResult};
use crate::models::Configuration;
use crate::planner::{ExplorationConfig, PlannerConfig};
use crate::scenario::ScenarioConfig;
use serde::{Deserialize, Serialize};

/// How scenario flags feed into the trigger decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioMode {
    /// Detector runs, flags are only logged
    Disabled,
    /// A raised flag turns `NoAction` into `NeedsIncrease`
    #[default]
    SecondaryTrigger,
    /// The planner only runs when the analyzer triggers and a flag is raised
    PreFilter,
}

impl ScenarioMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioMode::Disabled => "disabled",
            ScenarioMode::SecondaryTrigger => "secondary_trigger",
            ScenarioMode::PreFilter => "pre_filter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub weights: UtilityWeights,
    pub preferences: PreferenceSet,
    pub trigger: TriggerThresholds,
    pub planner: PlannerConfig,
    pub scenario: ScenarioConfig,
    pub scenario_mode: ScenarioMode,
    pub exploration: ExplorationConfig,
    /// Configuration assumed for services without a stored record
    pub default_configuration: Configuration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            weights: UtilityWeights::default(),
            preferences: PreferenceSet::linear(),
            trigger: TriggerThresholds::default(),
            planner: PlannerConfig::default(),
            scenario: ScenarioConfig::default(),
            scenario_mode: ScenarioMode::default(),
            exploration: ExplorationConfig::default(),
            default_configuration: Configuration::default(),
        }
    }
}

impl PolicyConfig {
    /// Default policy with three-tier step preferences
    pub fn step_tiers() -> Self {
        Self {
            preferences: PreferenceSet::step_tiers(),
            ..Self::default()
        }
    }

    /// Reject parameter combinations the engine cannot act on
    pub fn validate(&self) -> ControllerResult<()> {
        if self.weights.all().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(invalid("utility weights must be finite and non-negative"));
        }

        let planner = &self.planner;
        for candidate in planner
            .increase_candidates
            .iter()
            .chain(planner.decrease_candidates.iter())
        {
            let factors = candidate.projection().factors();
            if factors.iter().any(|f| !f.is_finite() || *f <= 0.0) {
                return Err(invalid(format!(
                    "projection factors for {} must be positive",
                    candidate.action.as_str()
                )));
            }
        }

        let bounds = &planner.bounds;
        if bounds.min_replicas < 1 {
            return Err(invalid("min_replicas must be at least 1"));
        }
        if bounds.max_replicas < bounds.min_replicas {
            return Err(invalid(format!(
                "max_replicas ({}) is below min_replicas ({})",
                bounds.max_replicas, bounds.min_replicas
            )));
        }
        if planner.steps.cpu <= 0.0 || planner.steps.memory <= 0.0 {
            return Err(invalid("step sizes must be positive"));
        }
        if !bounds.admits(&self.default_configuration) {
            return Err(invalid(format!(
                "default configuration {} outside resource bounds",
                self.default_configuration
            )));
        }

        let alpha = self.scenario.ema_alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(invalid(format!("ema_alpha {} outside (0, 1]", alpha)));
        }
        if self.scenario.window_capacity == 0 {
            return Err(invalid("scenario window capacity must be non-zero"));
        }

        let exploration = &self.exploration;
        if !(0.0..=1.0).contains(&exploration.epsilon)
            || !(0.0..=1.0).contains(&exploration.min_epsilon)
        {
            return Err(invalid("exploration probabilities must lie in [0, 1]"));
        }
        if !(exploration.decay > 0.0 && exploration.decay <= 1.0) {
            return Err(invalid("exploration decay must lie in (0, 1]"));
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ControllerError {
    ControllerError::InvalidPolicy(msg.into())
}

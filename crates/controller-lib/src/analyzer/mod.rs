//! Utility and trigger model
//!
//! Turns a service's metric vector into a utility score and a trigger
//! decision. Evaluation never fails: missing readings are zero.

mod preference;
mod trigger;
mod utility;

pub use preference::{
    linear_preference, step_preference, CostPreference, DimensionPreference, Direction,
    PreferenceShape,
};
pub use trigger::TriggerThresholds;
pub use utility::{PreferenceSet, UtilityBreakdown, UtilityModel, UtilityWeights};

use crate::models::{AdaptationTrigger, CostCategory, MetricVector};
use crate::policy::PolicyConfig;

/// Outcome of analyzing one service at one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Utility of the current operating point
    pub utility: f64,
    pub trigger: AdaptationTrigger,
}

/// Scores operating points and decides whether to adapt
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    model: UtilityModel,
    thresholds: TriggerThresholds,
}

impl Analyzer {
    pub fn new(model: UtilityModel, thresholds: TriggerThresholds) -> Self {
        Self { model, thresholds }
    }

    pub fn from_policy(policy: &PolicyConfig) -> Self {
        Self::new(
            UtilityModel::new(policy.weights, policy.preferences.clone()),
            policy.trigger,
        )
    }

    pub fn model(&self) -> &UtilityModel {
        &self.model
    }

    pub fn thresholds(&self) -> &TriggerThresholds {
        &self.thresholds
    }

    /// Utility of an operating point under a remediation cost class
    pub fn calculate_utility(&self, metrics: &MetricVector, cost: CostCategory) -> f64 {
        self.model.calculate_utility(metrics, cost)
    }

    pub fn trigger(&self, metrics: &MetricVector) -> AdaptationTrigger {
        self.thresholds.evaluate(metrics)
    }

    pub fn evaluate(&self, metrics: &MetricVector) -> Evaluation {
        Evaluation {
            utility: self.calculate_utility(metrics, CostCategory::None),
            trigger: self.trigger(metrics),
        }
    }
}

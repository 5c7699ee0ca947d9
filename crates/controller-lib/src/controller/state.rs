//! Per-service control state

use crate::models::{AdaptationTrigger, Configuration};
use crate::scenario::{EmaState, LoadWindow};
use serde::{Deserialize, Serialize};

/// Where a service is in the control cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServicePhase {
    #[default]
    Stable,
    Evaluating,
    Applying,
    /// Last apply failed; the next tick starts from the old configuration
    ApplyFailed,
}

impl ServicePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServicePhase::Stable => "stable",
            ServicePhase::Evaluating => "evaluating",
            ServicePhase::Applying => "applying",
            ServicePhase::ApplyFailed => "apply_failed",
        }
    }
}

/// Everything the controller remembers about one service
#[derive(Debug, Clone)]
pub struct ServiceState {
    /// Last successfully applied configuration
    pub configuration: Configuration,
    pub phase: ServicePhase,
    pub ema: EmaState,
    pub window: LoadWindow,
    pub last_utility: Option<f64>,
    pub last_trigger: AdaptationTrigger,
}

impl ServiceState {
    pub fn new(configuration: Configuration, window: LoadWindow) -> Self {
        Self {
            configuration,
            phase: ServicePhase::Stable,
            ema: EmaState::default(),
            window,
            last_utility: None,
            last_trigger: AdaptationTrigger::NoAction,
        }
    }
}

//! Per-dimension preference functions
//!
//! Map a raw metric reading onto a desirability in [0, 1], where 1 means
//! fully satisfactory. Two shapes are supported: three-tier steps and a
//! clamped linear ramp.

use crate::models::CostCategory;
use serde::{Deserialize, Serialize};

/// Whether smaller or larger readings are preferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    LowerIsBetter,
    HigherIsBetter,
}

/// Shape of a preference curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum PreferenceShape {
    /// Three tiers scoring 1.0 / 0.5 / 0.0.
    ///
    /// For lower-is-better: `v < good` scores 1, `v < fair` scores 0.5.
    /// For higher-is-better: `v >= good` scores 1, `v >= fair` scores 0.5.
    Step { good: f64, fair: f64 },
    /// Clamp to `[min, max]` then interpolate
    Linear { min: f64, max: f64 },
}

/// Preference curve for one metric dimension
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionPreference {
    pub direction: Direction,
    #[serde(flatten)]
    pub shape: PreferenceShape,
}

impl DimensionPreference {
    pub fn linear(min: f64, max: f64) -> Self {
        Self {
            direction: Direction::LowerIsBetter,
            shape: PreferenceShape::Linear { min, max },
        }
    }

    pub fn step(good: f64, fair: f64) -> Self {
        Self {
            direction: Direction::LowerIsBetter,
            shape: PreferenceShape::Step { good, fair },
        }
    }

    /// Flip the curve so larger readings score higher
    pub fn inverted(mut self) -> Self {
        self.direction = Direction::HigherIsBetter;
        self
    }

    /// Score a reading. Non-finite readings are treated as 0.
    pub fn score(&self, value: f64) -> f64 {
        let value = if value.is_finite() { value } else { 0.0 };
        match self.shape {
            PreferenceShape::Step { good, fair } => {
                step_preference(value, good, fair, self.direction)
            }
            PreferenceShape::Linear { min, max } => {
                linear_preference(value, min, max, self.direction)
            }
        }
    }
}

/// Three-tier preference with half-open, lower-bound-inclusive intervals
pub fn step_preference(value: f64, good: f64, fair: f64, direction: Direction) -> f64 {
    match direction {
        Direction::LowerIsBetter => {
            if value < good {
                1.0
            } else if value < fair {
                0.5
            } else {
                0.0
            }
        }
        Direction::HigherIsBetter => {
            if value >= good {
                1.0
            } else if value >= fair {
                0.5
            } else {
                0.0
            }
        }
    }
}

/// Clamped linear preference.
///
/// A degenerate range (`max <= min`) collapses into a threshold at `min`.
pub fn linear_preference(value: f64, min: f64, max: f64, direction: Direction) -> f64 {
    let span = max - min;
    if span <= 0.0 {
        return match direction {
            Direction::LowerIsBetter if value <= min => 1.0,
            Direction::HigherIsBetter if value >= min => 1.0,
            _ => 0.0,
        };
    }

    let fraction = (value.clamp(min, max) - min) / span;
    match direction {
        Direction::LowerIsBetter => 1.0 - fraction,
        Direction::HigherIsBetter => fraction,
    }
}

/// Categorical preference over remediation cost classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostPreference {
    /// Categories scored with `preferred_score`
    pub preferred: Vec<CostCategory>,
    pub preferred_score: f64,
    pub other_score: f64,
}

impl Default for CostPreference {
    fn default() -> Self {
        Self {
            preferred: vec![CostCategory::Cpu, CostCategory::Memory],
            preferred_score: 1.0,
            other_score: 0.5,
        }
    }
}

impl CostPreference {
    pub fn score(&self, category: CostCategory) -> f64 {
        if self.preferred.contains(&category) {
            self.preferred_score
        } else {
            self.other_score
        }
    }
}

//! Candidate enumeration strategy
//!
//! Projects the metric vector through each candidate action, scores the
//! projection with the utility model and keeps the best one. Ties go to the
//! candidate enumerated first.

use super::{CandidateAction, Plan, Planner, PlannerConfig, Proposal};
use crate::analyzer::Analyzer;
use crate::models::{AdaptationTrigger, Configuration, MetricVector};
use tracing::debug;

pub struct DiscretePlanner {
    analyzer: Analyzer,
    config: PlannerConfig,
}

impl DiscretePlanner {
    pub fn new(analyzer: Analyzer, config: PlannerConfig) -> Self {
        Self { analyzer, config }
    }

    fn candidates(&self, trigger: AdaptationTrigger) -> &[CandidateAction] {
        match trigger {
            AdaptationTrigger::NeedsIncrease => &self.config.increase_candidates,
            AdaptationTrigger::NeedsDecrease => &self.config.decrease_candidates,
            AdaptationTrigger::NoAction => &[],
        }
    }
}

impl Planner for DiscretePlanner {
    fn name(&self) -> &'static str {
        "discrete"
    }

    fn generate(
        &self,
        service: &str,
        trigger: AdaptationTrigger,
        metrics: &MetricVector,
        current: &Configuration,
    ) -> Plan {
        let mut best: Option<Proposal> = None;
        for proposal in self.alternatives(service, trigger, metrics, current) {
            let score = proposal.predicted_utility.unwrap_or(f64::NEG_INFINITY);
            let better = match &best {
                None => true,
                Some(b) => score > b.predicted_utility.unwrap_or(f64::NEG_INFINITY),
            };
            if better {
                best = Some(proposal);
            }
        }

        match best {
            Some(proposal) => Plan::Change(proposal),
            None => Plan::NoChange,
        }
    }

    fn alternatives(
        &self,
        service: &str,
        trigger: AdaptationTrigger,
        metrics: &MetricVector,
        current: &Configuration,
    ) -> Vec<Proposal> {
        self.candidates(trigger)
            .iter()
            .filter_map(|candidate| {
                let action = candidate.action;
                let configuration = action.apply_to(current, &self.config.steps);
                if !self.config.bounds.admits(&configuration) {
                    debug!(
                        service = %service,
                        action = action.as_str(),
                        "Candidate rejected by resource bounds"
                    );
                    return None;
                }

                let projected = candidate.projection().apply(metrics);
                let utility = self.analyzer.calculate_utility(&projected, action.cost());
                debug!(
                    service = %service,
                    action = action.as_str(),
                    utility = utility,
                    "Candidate scored"
                );

                Some(Proposal {
                    actions: vec![action],
                    configuration,
                    predicted_utility: Some(utility),
                })
            })
            .collect()
    }
}

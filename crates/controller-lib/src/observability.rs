//! Prometheus metrics and event-tagged logging for the controller

use crate::models::{AdaptationTrigger, Configuration};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Tick latency buckets in seconds; ticks include apply commands
const TICK_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

static GLOBAL_METRICS: OnceLock<ControllerMetricsInner> = OnceLock::new();

struct ControllerMetricsInner {
    tick_duration_seconds: Histogram,
    services_monitored: IntGauge,
    triggers: IntCounterVec,
    scenario_flags: IntCounterVec,
    plans: IntCounterVec,
    applies: IntCounter,
    apply_failures: IntCounter,
    metric_fetch_errors: IntCounter,
    utility: GaugeVec,
}

impl ControllerMetricsInner {
    fn new() -> Self {
        Self {
            tick_duration_seconds: register_histogram!(
                "adaptation_controller_tick_duration_seconds",
                "Time spent on one control tick, applies included",
                TICK_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_duration_seconds"),

            services_monitored: register_int_gauge!(
                "adaptation_controller_services_monitored",
                "Number of services under control"
            )
            .expect("Failed to register services_monitored"),

            triggers: register_int_counter_vec!(
                "adaptation_controller_triggers_total",
                "Trigger decisions that asked for adaptation",
                &["trigger"]
            )
            .expect("Failed to register triggers_total"),

            scenario_flags: register_int_counter_vec!(
                "adaptation_controller_scenario_flags_total",
                "Scenario labels raised by the detector",
                &["scenario"]
            )
            .expect("Failed to register scenario_flags_total"),

            plans: register_int_counter_vec!(
                "adaptation_controller_plans_total",
                "Planner results by outcome",
                &["outcome"]
            )
            .expect("Failed to register plans_total"),

            applies: register_int_counter!(
                "adaptation_controller_applies_total",
                "Configurations applied successfully"
            )
            .expect("Failed to register applies_total"),

            apply_failures: register_int_counter!(
                "adaptation_controller_apply_failures_total",
                "Apply calls that failed or timed out"
            )
            .expect("Failed to register apply_failures_total"),

            metric_fetch_errors: register_int_counter!(
                "adaptation_controller_metric_fetch_errors_total",
                "Metric queries that failed"
            )
            .expect("Failed to register metric_fetch_errors_total"),

            utility: register_gauge_vec!(
                "adaptation_controller_utility",
                "Utility of each service's current operating point",
                &["service"]
            )
            .expect("Failed to register utility"),
        }
    }
}

/// Handle to the process-wide controller metrics.
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct ControllerMetrics {
    inner: &'static ControllerMetricsInner,
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(ControllerMetricsInner::new),
        }
    }

    pub fn observe_tick_duration(&self, duration_secs: f64) {
        self.inner.tick_duration_seconds.observe(duration_secs);
    }

    pub fn set_services_monitored(&self, count: i64) {
        self.inner.services_monitored.set(count);
    }

    pub fn inc_trigger(&self, trigger: AdaptationTrigger) {
        self.inner
            .triggers
            .with_label_values(&[trigger.as_str()])
            .inc();
    }

    pub fn inc_scenario_flag(&self, scenario: &str) {
        self.inner.scenario_flags.with_label_values(&[scenario]).inc();
    }

    pub fn inc_plan(&self, outcome: &str) {
        self.inner.plans.with_label_values(&[outcome]).inc();
    }

    pub fn inc_applies(&self) {
        self.inner.applies.inc();
    }

    pub fn inc_apply_failures(&self) {
        self.inner.apply_failures.inc();
    }

    pub fn inc_metric_fetch_errors(&self, count: u64) {
        self.inner.metric_fetch_errors.inc_by(count);
    }

    pub fn set_utility(&self, service: &str, utility: f64) {
        self.inner.utility.with_label_values(&[service]).set(utility);
    }
}

/// Structured logger for adaptation events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_adaptation_triggered(
        &self,
        service: &str,
        trigger: AdaptationTrigger,
        utility: f64,
        scenarios: &[&str],
    ) {
        info!(
            event = "adaptation_triggered",
            instance = %self.instance,
            service = %service,
            trigger = trigger.as_str(),
            utility = utility,
            scenarios = ?scenarios,
            "Service needs adaptation"
        );
    }

    pub fn log_scenario_detected(&self, service: &str, scenario: &str, load: f64, ema: f64) {
        info!(
            event = "scenario_detected",
            instance = %self.instance,
            service = %service,
            scenario = %scenario,
            combined_load = load,
            ema = ema,
            "Load scenario detected"
        );
    }

    pub fn log_plan_selected(
        &self,
        service: &str,
        strategy: &str,
        actions: &[&str],
        from: &Configuration,
        to: &Configuration,
        predicted_utility: Option<f64>,
    ) {
        info!(
            event = "plan_selected",
            instance = %self.instance,
            service = %service,
            strategy = %strategy,
            actions = ?actions,
            from = %from,
            to = %to,
            predicted_utility = ?predicted_utility,
            "Selected new configuration"
        );
    }

    pub fn log_configuration_applied(&self, service: &str, configuration: &Configuration) {
        info!(
            event = "configuration_applied",
            instance = %self.instance,
            service = %service,
            cpu = configuration.cpu,
            memory = configuration.memory,
            replicas = configuration.replicas,
            "Configuration applied"
        );
    }

    pub fn log_apply_failed(&self, service: &str, configuration: &Configuration, reason: &str) {
        warn!(
            event = "apply_failed",
            instance = %self.instance,
            service = %service,
            configuration = %configuration,
            reason = %reason,
            "Apply failed, keeping previous configuration"
        );
    }

    pub fn log_startup(&self, version: &str, services: usize, strategy: &str) {
        info!(
            event = "controller_started",
            instance = %self.instance,
            controller_version = %version,
            services = services,
            strategy = %strategy,
            "Adaptation controller started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "controller_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Adaptation controller shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_collectors() {
        let a = ControllerMetrics::new();
        let b = ControllerMetrics::new();

        let before = a.inner.applies.get();
        a.inc_applies();
        b.inc_applies();
        // Other tests share the registry, so only a lower bound holds
        assert!(b.inner.applies.get() >= before + 2);

        a.observe_tick_duration(0.02);
        a.set_services_monitored(3);
        a.inc_trigger(AdaptationTrigger::NeedsIncrease);
        a.inc_scenario_flag("high_concurrency");
        a.inc_plan("change");
        a.inc_metric_fetch_errors(2);
        a.set_utility("metrics-handle-test", 0.88);
        assert_eq!(
            a.inner
                .utility
                .with_label_values(&["metrics-handle-test"])
                .get(),
            0.88
        );
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("controller-0");
        assert_eq!(logger.instance, "controller-0");
        logger.log_configuration_applied("cart", &Configuration::default());
    }
}

//! Control cycle
//!
//! Each tick evaluates every known service, plans a new configuration when
//! the trigger fires, applies all proposals concurrently and records the
//! ones that succeeded. Only a successful apply moves a service's
//! configuration forward.

mod r#loop;
mod state;

pub use r#loop::{ControlLoop, ControlLoopBuilder, DEFAULT_POLL_INTERVAL};
pub use state::{ServicePhase, ServiceState};

use crate::analyzer::Analyzer;
use crate::error::ControllerResult;
use crate::executor::Executor;
use crate::models::{
    AdaptationTrigger, ApplyResult, Configuration, MetricSnapshot, MetricVector, ServiceId,
};
use crate::observability::{ControllerMetrics, StructuredLogger};
use crate::planner::{build_planner, Plan, Planner, Proposal};
use crate::policy::{PolicyConfig, ScenarioMode};
use crate::scenario::{BatchVerdict, ScenarioDetector, ScenarioFlags};
use crate::store::{ConfigurationStore, ConfigurationTable};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Default bound on a single apply call
pub const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Applied configurations shared with readers such as the HTTP API
pub type SharedConfigurations = Arc<RwLock<ConfigurationTable>>;

/// What happened to one service during a tick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// No adaptation needed
    Stable,
    /// Adaptation needed but no viable change
    NoChange,
    Applied { configuration: Configuration },
    ApplyFailed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceOutcome {
    pub service: ServiceId,
    pub utility: f64,
    /// Trigger after scenario handling
    pub trigger: AdaptationTrigger,
    pub scenarios: ScenarioFlags,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    /// One entry per known service, ordered by service id
    pub outcomes: Vec<ServiceOutcome>,
    /// Set when applied configurations could not be persisted
    pub store_error: Option<String>,
}

impl TickReport {
    pub fn outcome(&self, service: &str) -> Option<&ServiceOutcome> {
        self.outcomes.iter().find(|o| o.service == service)
    }

    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Applied { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::ApplyFailed { .. }))
            .count()
    }
}

/// Combine the analyzer trigger with scenario flags
pub fn effective_trigger(
    mode: ScenarioMode,
    trigger: AdaptationTrigger,
    flags: &ScenarioFlags,
) -> AdaptationTrigger {
    match mode {
        ScenarioMode::Disabled => trigger,
        ScenarioMode::SecondaryTrigger => {
            if trigger == AdaptationTrigger::NoAction && !flags.is_empty() {
                AdaptationTrigger::NeedsIncrease
            } else {
                trigger
            }
        }
        ScenarioMode::PreFilter => {
            if trigger.needs_action() && !flags.is_empty() {
                trigger
            } else {
                AdaptationTrigger::NoAction
            }
        }
    }
}

/// The adaptation decision engine
pub struct Controller {
    policy: Arc<PolicyConfig>,
    analyzer: Analyzer,
    detector: ScenarioDetector,
    planner: Arc<dyn Planner>,
    executor: Arc<dyn Executor>,
    store: Option<ConfigurationStore>,
    services: BTreeMap<ServiceId, ServiceState>,
    published: SharedConfigurations,
    apply_timeout: Duration,
    metrics: ControllerMetrics,
    logger: StructuredLogger,
}

impl Controller {
    /// Controller for `services`, all starting at the policy's default
    /// configuration. Fails on an invalid policy.
    pub fn new(
        policy: Arc<PolicyConfig>,
        services: impl IntoIterator<Item = ServiceId>,
        executor: Arc<dyn Executor>,
    ) -> ControllerResult<Self> {
        policy.validate()?;

        let detector = ScenarioDetector::new(policy.scenario);
        let services: BTreeMap<ServiceId, ServiceState> = services
            .into_iter()
            .map(|s| {
                let state = ServiceState::new(policy.default_configuration, detector.new_window());
                (s, state)
            })
            .collect();
        let table = services
            .iter()
            .map(|(s, st)| (s.clone(), st.configuration))
            .collect();

        Ok(Self {
            analyzer: Analyzer::from_policy(&policy),
            planner: build_planner(&policy),
            detector,
            executor,
            store: None,
            services,
            published: Arc::new(RwLock::new(table)),
            apply_timeout: DEFAULT_APPLY_TIMEOUT,
            metrics: ControllerMetrics::new(),
            logger: StructuredLogger::new("adaptation-controller"),
            policy,
        })
    }

    /// Persist applied configurations; stored records seed known services
    pub fn with_store(mut self, store: ConfigurationStore) -> ControllerResult<Self> {
        let stored = store.load()?;
        let bounds = self.policy.planner.bounds;
        for (service, state) in self.services.iter_mut() {
            match stored.get(service) {
                Some(configuration) if bounds.admits(configuration) => {
                    debug!(service = %service, configuration = %configuration, "Seeded from store");
                    state.configuration = *configuration;
                }
                Some(configuration) => warn!(
                    service = %service,
                    configuration = %configuration,
                    fallback = %state.configuration,
                    "Stored configuration outside resource bounds, using policy default"
                ),
                None => {}
            }
        }
        self.store = Some(store);
        self.republish_now();
        Ok(self)
    }

    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_apply_timeout(mut self, timeout: Duration) -> Self {
        self.apply_timeout = timeout;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn planner_name(&self) -> &'static str {
        self.planner.name()
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceId> {
        self.services.keys()
    }

    pub fn service_state(&self, service: &str) -> Option<&ServiceState> {
        self.services.get(service)
    }

    pub fn configuration(&self, service: &str) -> Option<Configuration> {
        self.services.get(service).map(|s| s.configuration)
    }

    /// Handle to the published configuration table
    pub fn configurations(&self) -> SharedConfigurations {
        self.published.clone()
    }

    /// Record a successfully applied configuration. Unknown services are
    /// ignored and reported as `false`.
    pub fn update_configuration(&mut self, service: &str, configuration: Configuration) -> bool {
        match self.services.get_mut(service) {
            Some(state) => {
                state.configuration = configuration;
                true
            }
            None => false,
        }
    }

    fn table(&self) -> ConfigurationTable {
        self.services
            .iter()
            .map(|(s, st)| (s.clone(), st.configuration))
            .collect()
    }

    /// Publish without waiting; only used before the table is shared
    fn republish_now(&self) {
        if let Ok(mut table) = self.published.try_write() {
            *table = self.table();
        }
    }

    /// Feed a batch of historical samples for one service through the
    /// scenario detector, warming its window and EMA. Returns the majority
    /// vote, or `None` for an unknown service.
    pub fn assess_history(
        &mut self,
        service: &str,
        samples: &[MetricVector],
    ) -> Option<BatchVerdict> {
        let state = self.services.get_mut(service)?;
        Some(
            self.detector
                .scan_batch(&mut state.ema, &mut state.window, samples),
        )
    }

    /// Run one control tick against a metric snapshot
    pub async fn tick(&mut self, snapshot: &MetricSnapshot) -> TickReport {
        let started_at = Utc::now();
        let start = Instant::now();

        let unknown = snapshot
            .keys()
            .filter(|s| !self.services.contains_key(*s))
            .count();
        if unknown > 0 {
            debug!(unknown = unknown, "Ignoring metrics for unknown services");
        }

        let mut outcomes: BTreeMap<ServiceId, ServiceOutcome> = BTreeMap::new();
        let mut pending: Vec<(ServiceId, Proposal)> = Vec::new();

        for (service, state) in self.services.iter_mut() {
            state.phase = ServicePhase::Evaluating;
            let metrics = snapshot.get(service).copied().unwrap_or_default();

            let evaluation = self.analyzer.evaluate(&metrics);
            state.last_utility = Some(evaluation.utility);
            self.metrics.set_utility(service, evaluation.utility);

            let report = self
                .detector
                .analyze(&mut state.ema, &state.window, &metrics);
            state.window.push(report.combined_load);
            let labels: Vec<&str> = report.flags.labels().iter().map(|f| f.as_str()).collect();
            for label in &labels {
                self.metrics.inc_scenario_flag(label);
                self.logger
                    .log_scenario_detected(service, label, report.combined_load, report.ema);
            }

            let trigger =
                effective_trigger(self.policy.scenario_mode, evaluation.trigger, &report.flags);
            state.last_trigger = trigger;

            let mut outcome = ServiceOutcome {
                service: service.clone(),
                utility: evaluation.utility,
                trigger,
                scenarios: report.flags,
                outcome: Outcome::Stable,
            };

            if !trigger.needs_action() {
                state.phase = ServicePhase::Stable;
                outcomes.insert(service.clone(), outcome);
                continue;
            }

            self.metrics.inc_trigger(trigger);
            self.logger
                .log_adaptation_triggered(service, trigger, evaluation.utility, &labels);

            match self
                .planner
                .generate(service, trigger, &metrics, &state.configuration)
            {
                Plan::NoChange => {
                    self.metrics.inc_plan("no_change");
                    state.phase = ServicePhase::Stable;
                    outcome.outcome = Outcome::NoChange;
                }
                Plan::Change(proposal) => {
                    self.metrics.inc_plan("change");
                    let actions: Vec<&str> = proposal.actions.iter().map(|a| a.as_str()).collect();
                    self.logger.log_plan_selected(
                        service,
                        self.planner.name(),
                        &actions,
                        &state.configuration,
                        &proposal.configuration,
                        proposal.predicted_utility,
                    );
                    state.phase = ServicePhase::Applying;
                    pending.push((service.clone(), proposal));
                }
            }
            outcomes.insert(service.clone(), outcome);
        }

        let mut set = JoinSet::new();
        for (service, proposal) in pending {
            let executor = self.executor.clone();
            let timeout = self.apply_timeout;
            set.spawn(async move {
                let apply = executor.apply(&service, &proposal.configuration);
                let result = match tokio::time::timeout(timeout, apply).await {
                    Ok(result) => result,
                    Err(_) => {
                        ApplyResult::failure(format!("apply timed out after {:?}", timeout))
                    }
                };
                (service, proposal.configuration, result)
            });
        }

        let mut applied = 0usize;
        while let Some(joined) = set.join_next().await {
            let (service, configuration, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!(error = %e, "Apply task aborted");
                    continue;
                }
            };

            if result.success {
                self.update_configuration(&service, configuration);
                self.metrics.inc_applies();
                self.logger.log_configuration_applied(&service, &configuration);
                applied += 1;
                if let Some(state) = self.services.get_mut(&service) {
                    state.phase = ServicePhase::Stable;
                }
                if let Some(o) = outcomes.get_mut(&service) {
                    o.outcome = Outcome::Applied { configuration };
                }
            } else {
                self.metrics.inc_apply_failures();
                self.logger
                    .log_apply_failed(&service, &configuration, &result.message);
                if let Some(state) = self.services.get_mut(&service) {
                    state.phase = ServicePhase::ApplyFailed;
                }
                if let Some(o) = outcomes.get_mut(&service) {
                    o.outcome = Outcome::ApplyFailed {
                        reason: result.message,
                    };
                }
            }
        }

        // Tasks that never reported back count as failures
        for (service, state) in self.services.iter_mut() {
            if state.phase == ServicePhase::Applying {
                state.phase = ServicePhase::ApplyFailed;
                self.metrics.inc_apply_failures();
                if let Some(o) = outcomes.get_mut(service) {
                    o.outcome = Outcome::ApplyFailed {
                        reason: "apply task aborted".to_string(),
                    };
                }
            }
        }

        let mut store_error = None;
        if applied > 0 {
            let table = self.table();
            if let Some(store) = &self.store {
                if let Err(e) = store.save(&table) {
                    warn!(error = %e, path = ?store.path(), "Failed to persist configurations");
                    store_error = Some(e.to_string());
                }
            }
            *self.published.write().await = table;
        }

        let duration = start.elapsed();
        self.metrics.observe_tick_duration(duration.as_secs_f64());

        TickReport {
            started_at,
            duration,
            outcomes: outcomes.into_values().collect(),
            store_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DryRunExecutor;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::sync::Barrier;

    struct MockExecutor {
        succeed: bool,
        calls: AtomicUsize,
    }

    impl MockExecutor {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                succeed,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Executor for MockExecutor {
        async fn apply(&self, _service: &str, _configuration: &Configuration) -> ApplyResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                ApplyResult::success("ok")
            } else {
                ApplyResult::failure("kubectl refused")
            }
        }
    }

    struct SlowExecutor;

    #[async_trait]
    impl Executor for SlowExecutor {
        async fn apply(&self, _service: &str, _configuration: &Configuration) -> ApplyResult {
            tokio::time::sleep(Duration::from_secs(30)).await;
            ApplyResult::success("late")
        }
    }

    /// Succeeds only once every expected apply is in flight
    struct BarrierExecutor {
        barrier: Barrier,
    }

    #[async_trait]
    impl Executor for BarrierExecutor {
        async fn apply(&self, _service: &str, _configuration: &Configuration) -> ApplyResult {
            self.barrier.wait().await;
            ApplyResult::success("together")
        }
    }

    fn cpu_saturated() -> MetricVector {
        MetricVector {
            cpu_percent: 90.0,
            memory_percent: 40.0,
            throughput: 80.0,
            ..Default::default()
        }
    }

    fn calm() -> MetricVector {
        MetricVector {
            cpu_percent: 50.0,
            memory_percent: 50.0,
            throughput: 80.0,
            ..Default::default()
        }
    }

    fn snapshot(entries: &[(&str, MetricVector)]) -> MetricSnapshot {
        entries.iter().map(|(s, m)| (s.to_string(), *m)).collect()
    }

    fn controller(executor: Arc<dyn Executor>, services: &[&str]) -> Controller {
        Controller::new(
            Arc::new(PolicyConfig::default()),
            services.iter().map(|s| s.to_string()),
            executor,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_cpu_saturation_applies_and_persists() {
        let dir = TempDir::new().unwrap();
        let store = ConfigurationStore::new(dir.path().join("state.json"));
        let executor = MockExecutor::new(true);
        let mut ctl = controller(executor.clone(), &["svc-a"])
            .with_store(store.clone())
            .unwrap();

        let report = ctl.tick(&snapshot(&[("svc-a", cpu_saturated())])).await;

        let outcome = report.outcome("svc-a").unwrap();
        assert_eq!(outcome.trigger, AdaptationTrigger::NeedsIncrease);
        let expected = Configuration::new(600.0, 512.0, 1);
        assert_eq!(
            outcome.outcome,
            Outcome::Applied {
                configuration: expected
            }
        );
        assert_eq!(ctl.configuration("svc-a"), Some(expected));
        assert_eq!(ctl.service_state("svc-a").unwrap().phase, ServicePhase::Stable);
        assert_eq!(store.load().unwrap()["svc-a"], expected);
        assert_eq!(ctl.configurations().read().await["svc-a"], expected);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        assert!(report.store_error.is_none());
    }

    #[tokio::test]
    async fn test_apply_failure_keeps_configuration() {
        let dir = TempDir::new().unwrap();
        let store = ConfigurationStore::new(dir.path().join("state.json"));
        let mut ctl = controller(MockExecutor::new(false), &["svc-a"])
            .with_store(store.clone())
            .unwrap();

        let report = ctl.tick(&snapshot(&[("svc-a", cpu_saturated())])).await;

        match &report.outcome("svc-a").unwrap().outcome {
            Outcome::ApplyFailed { reason } => assert!(reason.contains("kubectl refused")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(report.failed(), 1);
        assert_eq!(ctl.configuration("svc-a"), Some(Configuration::new(500.0, 512.0, 1)));
        assert_eq!(
            ctl.service_state("svc-a").unwrap().phase,
            ServicePhase::ApplyFailed
        );
        assert!(store.load().unwrap().is_empty());
        assert_eq!(
            ctl.configurations().read().await["svc-a"],
            Configuration::default()
        );
    }

    #[tokio::test]
    async fn test_failed_service_reevaluated_next_tick() {
        let mut ctl = controller(MockExecutor::new(false), &["svc-a"]);
        ctl.tick(&snapshot(&[("svc-a", cpu_saturated())])).await;

        // Same combined load as before, so no fluctuation flag either
        let steady = MetricVector {
            cpu_percent: 60.0,
            memory_percent: 80.0,
            throughput: 80.0,
            ..Default::default()
        };
        let report = ctl.tick(&snapshot(&[("svc-a", steady)])).await;
        assert_eq!(report.outcome("svc-a").unwrap().outcome, Outcome::Stable);
        assert_eq!(ctl.service_state("svc-a").unwrap().phase, ServicePhase::Stable);
    }

    #[tokio::test]
    async fn test_unknown_service_ignored() {
        let executor = MockExecutor::new(true);
        let mut ctl = controller(executor.clone(), &["svc-a"]);
        let report = ctl
            .tick(&snapshot(&[("svc-a", calm()), ("ghost", cpu_saturated())]))
            .await;

        assert_eq!(report.outcomes.len(), 1);
        assert!(report.outcome("ghost").is_none());
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_service_reads_as_zero() {
        let mut ctl = controller(Arc::new(DryRunExecutor), &["svc-a", "svc-b"]);
        let report = ctl.tick(&snapshot(&[("svc-a", calm())])).await;

        assert_eq!(report.outcomes.len(), 2);
        let b = report.outcome("svc-b").unwrap();
        // Zero throughput is under the floor
        assert_eq!(b.trigger, AdaptationTrigger::NeedsIncrease);
        assert!((b.utility - 1.05).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_apply_timeout_is_failure() {
        let mut ctl = controller(Arc::new(SlowExecutor), &["svc-a"])
            .with_apply_timeout(Duration::from_millis(50));
        let report = ctl.tick(&snapshot(&[("svc-a", cpu_saturated())])).await;

        match &report.outcome("svc-a").unwrap().outcome {
            Outcome::ApplyFailed { reason } => assert!(reason.contains("timed out")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(ctl.configuration("svc-a"), Some(Configuration::default()));
    }

    #[tokio::test]
    async fn test_applies_run_concurrently() {
        let executor = Arc::new(BarrierExecutor {
            barrier: Barrier::new(2),
        });
        let mut ctl = controller(executor, &["svc-a", "svc-b"])
            .with_apply_timeout(Duration::from_secs(5));
        let report = ctl
            .tick(&snapshot(&[("svc-a", cpu_saturated()), ("svc-b", cpu_saturated())]))
            .await;
        assert_eq!(report.applied(), 2);
    }

    #[tokio::test]
    async fn test_store_seeds_configuration() {
        let dir = TempDir::new().unwrap();
        let store = ConfigurationStore::new(dir.path().join("state.json"));
        store
            .record("svc-a", Configuration::new(700.0, 1024.0, 2))
            .unwrap();

        let ctl = controller(Arc::new(DryRunExecutor), &["svc-a", "svc-b"])
            .with_store(store)
            .unwrap();
        assert_eq!(
            ctl.configuration("svc-a"),
            Some(Configuration::new(700.0, 1024.0, 2))
        );
        assert_eq!(ctl.configuration("svc-b"), Some(Configuration::default()));
        assert_eq!(
            ctl.configurations().read().await["svc-a"],
            Configuration::new(700.0, 1024.0, 2)
        );
    }

    #[tokio::test]
    async fn test_out_of_bounds_store_record_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{
                "svc-a": {"cpu": 10.0, "memory": 1.0, "replicas": 0},
                "svc-b": {"cpu": 600.0, "memory": 512.0, "replicas": 9}
            }"#,
        )
        .unwrap();

        let ctl = controller(Arc::new(DryRunExecutor), &["svc-a", "svc-b"])
            .with_store(ConfigurationStore::new(path))
            .unwrap();

        let a = ctl.configuration("svc-a").unwrap();
        assert!(a.replicas >= 1);
        assert_eq!(a, Configuration::default());
        assert_eq!(ctl.configuration("svc-b"), Some(Configuration::default()));
        assert_eq!(
            ctl.configurations().read().await["svc-a"],
            Configuration::default()
        );
    }

    #[tokio::test]
    async fn test_invalid_policy_rejected() {
        let mut policy = PolicyConfig::default();
        policy.scenario.ema_alpha = 2.0;
        let result = Controller::new(
            Arc::new(policy),
            vec!["svc-a".to_string()],
            Arc::new(DryRunExecutor),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_secondary_trigger_on_concurrency() {
        let executor = MockExecutor::new(true);
        let mut ctl = controller(executor.clone(), &["svc-a"]);
        let busy = MetricVector {
            connections: 500.0,
            ..calm()
        };
        let report = ctl.tick(&snapshot(&[("svc-a", busy)])).await;
        let outcome = report.outcome("svc-a").unwrap();
        assert!(outcome.scenarios.high_concurrency);
        assert_eq!(outcome.trigger, AdaptationTrigger::NeedsIncrease);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_mode_only_logs_flags() {
        let policy = PolicyConfig {
            scenario_mode: ScenarioMode::Disabled,
            ..Default::default()
        };
        let executor = MockExecutor::new(true);
        let mut ctl = Controller::new(
            Arc::new(policy),
            vec!["svc-a".to_string()],
            executor.clone(),
        )
        .unwrap();
        let busy = MetricVector {
            connections: 500.0,
            ..calm()
        };
        let report = ctl.tick(&snapshot(&[("svc-a", busy)])).await;
        let outcome = report.outcome("svc-a").unwrap();
        assert!(outcome.scenarios.high_concurrency);
        assert_eq!(outcome.outcome, Outcome::Stable);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pre_filter_requires_flag() {
        let policy = PolicyConfig {
            scenario_mode: ScenarioMode::PreFilter,
            ..Default::default()
        };
        let executor = MockExecutor::new(true);
        let mut ctl = Controller::new(
            Arc::new(policy),
            vec!["svc-a".to_string()],
            executor.clone(),
        )
        .unwrap();

        // Breach without any scenario flag is filtered out
        let report = ctl.tick(&snapshot(&[("svc-a", cpu_saturated())])).await;
        assert_eq!(report.outcome("svc-a").unwrap().outcome, Outcome::Stable);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);

        let busy = MetricVector {
            connections: 500.0,
            ..cpu_saturated()
        };
        let report = ctl.tick(&snapshot(&[("svc-a", busy)])).await;
        assert!(matches!(
            report.outcome("svc-a").unwrap().outcome,
            Outcome::Applied { .. }
        ));
    }

    #[test]
    fn test_effective_trigger_table() {
        let none = ScenarioFlags::default();
        let flagged = ScenarioFlags {
            load_fluctuation: true,
            high_concurrency: false,
        };
        use AdaptationTrigger::*;
        use ScenarioMode::*;

        assert_eq!(effective_trigger(Disabled, NoAction, &flagged), NoAction);
        assert_eq!(effective_trigger(SecondaryTrigger, NoAction, &flagged), NeedsIncrease);
        assert_eq!(effective_trigger(SecondaryTrigger, NeedsDecrease, &flagged), NeedsDecrease);
        assert_eq!(effective_trigger(SecondaryTrigger, NoAction, &none), NoAction);
        assert_eq!(effective_trigger(PreFilter, NeedsIncrease, &none), NoAction);
        assert_eq!(effective_trigger(PreFilter, NeedsIncrease, &flagged), NeedsIncrease);
        assert_eq!(effective_trigger(PreFilter, NoAction, &flagged), NoAction);
    }

    #[tokio::test]
    async fn test_assess_history_warms_window() {
        let mut ctl = controller(Arc::new(DryRunExecutor), &["svc-a"]);
        let busy = MetricVector {
            connections: 500.0,
            ..calm()
        };
        let verdict = ctl.assess_history("svc-a", &[busy, busy, calm()]).unwrap();
        assert!(verdict.requires_adaptation());
        assert_eq!(ctl.service_state("svc-a").unwrap().window.len(), 3);
        assert!(ctl.assess_history("ghost", &[busy]).is_none());
    }
}

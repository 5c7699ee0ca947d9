//! Utility-driven self-adaptation for microservices
//!
//! This crate provides:
//! - Utility and trigger analysis of per-service metrics
//! - Load scenario detection (EMA, variance, concurrency)
//! - Discrete and incremental reconfiguration planning
//! - The control loop, metric sources, executors and persistence
//! - Health checks and observability

pub mod analyzer;
pub mod controller;
pub mod error;
pub mod executor;
pub mod health;
pub mod models;
pub mod observability;
pub mod planner;
pub mod policy;
pub mod scenario;
pub mod source;
pub mod store;

pub use analyzer::{Analyzer, Evaluation};
pub use controller::{
    ControlLoop, ControlLoopBuilder, Controller, Outcome, ServiceOutcome, SharedConfigurations,
    TickReport,
};
pub use error::{ControllerError, ControllerResult};
pub use executor::{CommandExecutor, DryRunExecutor, Executor};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
    TickSummary,
};
pub use models::*;
pub use observability::{ControllerMetrics, StructuredLogger};
pub use planner::{build_planner, Plan, Planner};
pub use policy::{PolicyConfig, ScenarioMode};
pub use scenario::ScenarioDetector;
pub use source::{MetricCatalog, MetricSource, SnapshotAssembler};
pub use store::ConfigurationStore;

//! Adaptation controller daemon
//!
//! Polls service metrics, decides on resource changes and applies them
//! through an external command.

use adaptation_controller::{api, config::ControllerConfig};
use anyhow::{Context, Result};
use controller_lib::{
    health::HealthRegistry,
    observability::{ControllerMetrics, StructuredLogger},
    source::DatasetSource,
    CommandExecutor, ConfigurationStore, ControlLoopBuilder, Controller, DryRunExecutor, Executor,
    SnapshotAssembler,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CONTROLLER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting adaptation-controller");

    let config = ControllerConfig::load()?;
    info!(
        instance = %config.instance,
        services = config.services.len(),
        dataset_dir = %config.dataset_dir.display(),
        "Controller configured"
    );

    // Stalled after three missed ticks
    let health_registry = HealthRegistry::new().with_stale_after(config.poll_interval() * 3);
    health_registry.register_all().await;

    let logger = StructuredLogger::new(&config.instance);

    let executor: Arc<dyn Executor> = match &config.apply_command {
        Some(program) => Arc::new(
            CommandExecutor::new(program.clone()).with_leading_args(config.apply_args.clone()),
        ),
        None => {
            warn!("No apply_command configured, running in dry-run mode");
            Arc::new(DryRunExecutor)
        }
    };

    let controller = Controller::new(
        Arc::new(config.policy.clone()),
        config.services.clone(),
        executor,
    )?
    .with_store(ConfigurationStore::new(config.state_path.clone()))
    .with_context(|| format!("Failed to load state from {}", config.state_path.display()))?
    .with_apply_timeout(config.apply_timeout())
    .with_logger(logger.clone());

    let strategy = controller.planner_name();
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        controller.configurations(),
        ControllerMetrics::new(),
    ));

    let assembler = SnapshotAssembler::new(
        Arc::new(DatasetSource::new(config.dataset_dir.clone())),
        config.catalog.clone(),
        config.metric_window(),
    );

    let control_loop = ControlLoopBuilder::new()
        .controller(controller)
        .assembler(assembler)
        .health(health_registry.clone())
        .poll_interval(config.poll_interval())
        .build()?;

    logger.log_startup(CONTROLLER_VERSION, config.services.len(), strategy);

    // Start health and metrics server
    let api_port = config.api_port;
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server stopped");
        }
    });

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(control_loop.run(shutdown_rx));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.drain().await;

    let _ = shutdown_tx.send(());
    if let Err(e) = loop_handle.await {
        error!(error = %e, "Control loop task failed");
    }
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}

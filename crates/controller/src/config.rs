//! Controller configuration

use anyhow::{Context, Result};
use controller_lib::{source::MetricCatalog, PolicyConfig, ServiceId};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "CONTROLLER_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "controller.toml";
const ENV_PREFIX: &str = "CONTROLLER";

/// Controller configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Instance name attached to structured log records
    pub instance: String,

    /// Services under control
    pub services: Vec<ServiceId>,

    /// Seconds between control ticks
    pub poll_interval_secs: u64,

    /// Trailing window each metric query aggregates over, in seconds
    pub metric_window_secs: u64,

    /// API server port for health/metrics
    pub api_port: u16,

    /// Directory holding the metric dumps
    pub dataset_dir: PathBuf,

    /// Program invoked to apply a configuration; dry run when unset
    pub apply_command: Option<PathBuf>,

    /// Arguments placed before the generated `key=value` arguments
    pub apply_args: Vec<String>,

    /// Upper bound on one apply call, in seconds
    pub apply_timeout_secs: u64,

    /// File holding the last applied configuration per service
    pub state_path: PathBuf,

    pub policy: PolicyConfig,

    pub catalog: MetricCatalog,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "adaptation-controller".to_string())
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            services: Vec::new(),
            poll_interval_secs: 300,
            metric_window_secs: 300,
            api_port: 8080,
            dataset_dir: PathBuf::from("data"),
            apply_command: None,
            apply_args: Vec::new(),
            apply_timeout_secs: 60,
            state_path: PathBuf::from("state/configurations.json"),
            policy: PolicyConfig::default(),
            catalog: MetricCatalog::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path, ENV_PREFIX)
    }

    /// Layer `<prefix>_*` environment variables over an optional file.
    /// Nested keys use `__`, e.g. `CONTROLLER_POLICY__SCENARIO_MODE`.
    pub fn load_from(path: &str, env_prefix: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("services")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        let config: ControllerConfig = settings
            .try_deserialize()
            .context("Invalid controller configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            anyhow::bail!("At least one service must be configured");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be non-zero");
        }
        if self.apply_timeout_secs == 0 {
            anyhow::bail!("apply_timeout_secs must be non-zero");
        }
        if self.apply_timeout_secs >= self.poll_interval_secs {
            anyhow::bail!(
                "apply_timeout_secs ({}) must be below poll_interval_secs ({})",
                self.apply_timeout_secs,
                self.poll_interval_secs
            );
        }
        self.policy.validate().context("Invalid policy")?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn metric_window(&self) -> Duration {
        Duration::from_secs(self.metric_window_secs)
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }
}

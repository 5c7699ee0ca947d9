//! Configuration executors
//!
//! The executor is the only component that touches the deployment. It is
//! told to move one service to one configuration and reports whether that
//! worked; it never decides anything.

use crate::models::{ApplyResult, Configuration};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Trait for applying a configuration to a running service
#[async_trait]
pub trait Executor: Send + Sync {
    async fn apply(&self, service: &str, configuration: &Configuration) -> ApplyResult;
}

/// Runs an external program with `cpu=<c> memory=<m> replica=<r> service=<s>`.
///
/// Exit status 0 is success; the message is taken from stdout, or stderr on
/// failure.
pub struct CommandExecutor {
    program: PathBuf,
    /// Passed before the configuration arguments, e.g. a script for `sh`
    leading_args: Vec<String>,
}

impl CommandExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    pub fn args(service: &str, configuration: &Configuration) -> Vec<String> {
        vec![
            format!("cpu={}", configuration.cpu),
            format!("memory={}", configuration.memory),
            format!("replica={}", configuration.replicas),
            format!("service={}", service),
        ]
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn apply(&self, service: &str, configuration: &Configuration) -> ApplyResult {
        let args = Self::args(service, configuration);
        debug!(program = ?self.program, args = ?args, "Running apply command");

        let output = match Command::new(&self.program)
            .args(&self.leading_args)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!(service = %service, error = %e, "Failed to spawn apply command");
                return ApplyResult::failure(format!("spawn {:?}: {}", self.program, e));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            ApplyResult::success(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() { stdout } else { stderr };
            ApplyResult::failure(format!("exit {}: {}", output.status, detail))
        }
    }
}

/// Logs the configuration and reports success without touching anything
#[derive(Debug, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl Executor for DryRunExecutor {
    async fn apply(&self, service: &str, configuration: &Configuration) -> ApplyResult {
        info!(
            service = %service,
            configuration = %configuration,
            "Dry run, configuration not applied"
        );
        ApplyResult::success("dry run")
    }
}

//! Persistence of the last applied configuration per service

use crate::error::{ControllerError, ControllerResult};
use crate::models::{Configuration, ServiceId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Applied configurations keyed by service
pub type ConfigurationTable = BTreeMap<ServiceId, Configuration>;

/// JSON file holding `service -> {cpu, memory, replicas}`
#[derive(Debug, Clone)]
pub struct ConfigurationStore {
    path: PathBuf,
}

impl ConfigurationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the table; a missing file is an empty table
    pub fn load(&self) -> ControllerResult<ConfigurationTable> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "No stored configurations");
                return Ok(ConfigurationTable::new());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Replace the file atomically (write temp, then rename)
    pub fn save(&self, table: &ConfigurationTable) -> ControllerResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec_pretty(table)?;
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, &self.path).map_err(|e| {
            ControllerError::Store(format!(
                "failed to rename {:?} to {:?}: {}",
                temp_path, self.path, e
            ))
        })?;

        debug!(path = ?self.path, services = table.len(), "Saved configurations");
        Ok(())
    }

    /// Record one service's configuration, keeping the others
    pub fn record(&self, service: &str, configuration: Configuration) -> ControllerResult<()> {
        let mut table = self.load()?;
        table.insert(service.to_string(), configuration);
        self.save(&table)
    }
}

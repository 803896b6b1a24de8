//! Console configuration.
//!
//! Stored as JSON at `<config dir>/tether/config.json`. A missing or
//! unreadable file is not an error: the defaults are used and a warning is
//! logged.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConsoleError;

/// Environment variable that overrides `log_filter`.
pub const LOG_ENV: &str = "TETHER_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Give computations a shared interrupt cell next to the stop flag.
    pub interrupt_cell: bool,
    /// Echo committed input lines into the output buffer.
    pub echo_input: bool,
    /// Text echoed when the keyboard interrupt fires.
    pub interrupt_echo: String,
    /// Prefix for faults raised by the host rather than the computation.
    pub host_fault_prefix: String,
    /// Shown when a cancelled computation gave no text of its own.
    pub stopped_message: String,
    /// `tracing` filter directive.
    pub log_filter: String,
    /// Capacity of the console event channel.
    pub event_capacity: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            interrupt_cell: true,
            echo_input: true,
            interrupt_echo: "^C".to_string(),
            host_fault_prefix: "Host error: ".to_string(),
            stopped_message: "Execution stopped by user".to_string(),
            log_filter: "info".to_string(),
            event_capacity: 1024,
        }
    }
}

impl ConsoleConfig {
    /// Default location, `None` when the platform has no home directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "tether", "tether").map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load from `path` (or the default location), falling back to defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Self::default().with_env_overrides();
        };

        let config = if path.exists() {
            match Self::read(&path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(
                        "Failed to load config from {}: {}. Using default configuration.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.with_env_overrides()
    }

    /// Strict read: any IO or parse failure is returned.
    pub fn read(path: &Path) -> Result<Self, ConsoleError> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConsoleError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConsoleError> {
        if self.event_capacity == 0 {
            return Err(ConsoleError::Config("event_capacity must be positive".into()));
        }
        Ok(())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(filter) = std::env::var(LOG_ENV) {
            if !filter.trim().is_empty() {
                self.log_filter = filter;
            }
        }
        self
    }
}

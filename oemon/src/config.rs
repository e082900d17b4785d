//! Dashboard settings stored next to the profiles:
//! $XDG_CONFIG_HOME/oemon/settings.json (fallback ~/.config/oemon/settings.json)

use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path, path::PathBuf, time::Duration};
use thiserror::Error;

use crate::profiles::config_dir;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Delay between the end of one poll and the start of the next.
    pub poll_interval_ms: u64,
    /// History length for the live charts.
    pub chart_capacity: usize,
    /// History length for the long-running statistics panel.
    pub stats_capacity: usize,
    pub request_timeout_ms: u64,
    /// Passed to oemanager when stopping an agent.
    pub wait_to_finish_ms: u64,
    pub wait_after_stop_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            chart_capacity: 20,
            stats_capacity: 500,
            request_timeout_ms: 10_000,
            wait_to_finish_ms: 120_000,
            wait_after_stop_ms: 60_000,
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(100))
    }
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Load settings; a missing file means defaults.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    match fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("no settings at '{}'; using defaults", path.display());
            Ok(Settings::default())
        }
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&settings_path())
}

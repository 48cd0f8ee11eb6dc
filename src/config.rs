// SPDX-License-Identifier: GPL-3.0-only

//! User configuration handling

use crate::constants::LISTENER_POLL_TIMEOUT;
use crate::errors::{CtrlError, CtrlResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device used when none is given on the command line
    pub device: Option<String>,
    /// Listener poll timeout in milliseconds
    pub poll_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: None,
            poll_timeout_ms: LISTENER_POLL_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Config {
    fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("camctl").join("config.json"))
    }

    /// Load the configuration; a missing or unreadable file falls back to
    /// the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), %err, "Ignoring malformed config file");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> CtrlResult<()> {
        let Some(path) = Self::path() else {
            return Err(CtrlError::Config("no config directory".to_string()));
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| CtrlError::Config(err.to_string()))?;
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|err| CtrlError::Config(err.to_string()))?;
        std::fs::write(&path, raw).map_err(|err| CtrlError::Config(err.to_string()))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms.max(1))
    }
}

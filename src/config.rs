//! Startup configuration: curve parameters plus the sensor chips to watch

use crate::curve::CurveConfig;
use crate::errors::{FanManagerError, Result};
use crate::sensors::DEFAULT_SENSOR_CHIPS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the control loop needs, loaded once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanManagerConfig {
    pub curve: CurveConfig,
    pub sensor_chips: Vec<String>,
}

impl Default for FanManagerConfig {
    fn default() -> Self {
        Self {
            curve: CurveConfig::default(),
            sensor_chips: DEFAULT_SENSOR_CHIPS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl FanManagerConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            FanManagerError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            FanManagerError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Defaults, overlaid with the file at `path` when one is given
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// System-wide location written by `dump-config --save` when no path is given
    pub fn get_config_path() -> PathBuf {
        PathBuf::from("/etc/fan-manager/config.json")
    }
}

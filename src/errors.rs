//! Error types for the fan manager

use thiserror::Error;

/// Result type alias for the fan manager
pub type Result<T> = std::result::Result<T, FanManagerError>;

/// Main error type for the fan manager
#[derive(Error, Debug)]
pub enum FanManagerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("DBus error: {0}")]
    DBus(#[from] zbus::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sensor acquisition failed: {0}")]
    Acquisition(String),

    #[error("Fan actuation failed: {0}")]
    Actuation(String),

    #[error("Invalid fan level: {0} (expected 0-100)")]
    InvalidFanLevel(i64),

    #[error("Invalid fan curve: {0}")]
    InvalidCurve(String),
}

impl FanManagerError {
    /// Whether this error is a rejected input rather than an operational failure
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FanManagerError::InvalidFanLevel(_) | FanManagerError::InvalidCurve(_)
        )
    }
}

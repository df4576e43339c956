//! Fan Manager
//!
//! Closed-loop fan control for Dell PowerEdge servers: samples CPU core
//! temperatures from lm-sensors, shapes them through an exponential curve and
//! sets the fan level through the BMC with IPMI raw commands.

pub mod args;
pub mod client;
pub mod config;
pub mod control;
pub mod curve;
pub mod daemon;
pub mod errors;
pub mod ipmi;
pub mod logging;
pub mod sensors;
pub mod service;
pub mod telemetry;

#[cfg(test)]
mod test_utils;

// DBus names for the remote tool surface
pub const DBUS_SERVICE_NAME: &str = "io.github.FanManager";
pub const DBUS_OBJECT_PATH: &str = "/io/github/FanManager";

// Re-export commonly used types
pub use config::FanManagerConfig;
pub use curve::{compute_fan_level, CurveConfig};
pub use errors::{FanManagerError, Result};
pub use service::{FanManager, ToolResponse};

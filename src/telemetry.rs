//! Observability port for the control path
//!
//! Components receive an `Arc<dyn Telemetry>` and report what happened as
//! [`ControlEvent`]s instead of logging directly. [`LogTelemetry`] forwards
//! events to the `log` facade.

use log::{debug, error, info, warn};

/// Something worth reporting from the control path
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// The hottest core found in a sensor snapshot
    HottestCore {
        chip: String,
        core: String,
        temperature: f64,
    },
    /// None of the configured chips exposed a core input
    NoMatchingSensors { chips: Vec<String> },
    /// The sensor source could not be queried or parsed
    AcquisitionFailed { command: String, detail: String },
    /// A temperature was mapped through the curve
    FanLevelComputed { temperature: f64, level: u8 },
    /// A requested level was outside 0-100 and never reached the BMC
    FanLevelRejected { level: i64 },
    /// A raw command was handed to the BMC
    CommandIssued { command: String },
    /// The BMC command could not be dispatched
    ActuationFailed { command: String, detail: String },
    /// A control cycle did not actuate
    CycleSkipped { detail: String },
    /// The control loop started with the given poll interval
    LoopStarted { poll_interval_secs: u64 },
    /// The control loop observed a shutdown request
    LoopStopped,
    /// An external tool ran but exited unsuccessfully
    ToolExited {
        command: String,
        status: String,
        stderr: String,
    },
    /// Anything an external tool printed that is not otherwise consumed
    ToolOutput { command: String, output: String },
}

/// Sink for control events
pub trait Telemetry: Send + Sync {
    fn emit(&self, event: ControlEvent);
}

/// Forwards control events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn emit(&self, event: ControlEvent) {
        match event {
            ControlEvent::HottestCore {
                chip,
                core,
                temperature,
            } => info!(
                "Highest temperature: {:.1}°C (chip {}, {})",
                temperature, chip, core
            ),
            ControlEvent::NoMatchingSensors { chips } => {
                warn!("No core temperature inputs found for chips {:?}", chips)
            }
            ControlEvent::AcquisitionFailed { command, detail } => {
                error!("Failed to read temperature via '{}': {}", command, detail)
            }
            ControlEvent::FanLevelComputed { temperature, level } => {
                info!("Fan level for {:.1}°C: {}%", temperature, level)
            }
            ControlEvent::FanLevelRejected { level } => {
                warn!("Rejected fan level {} (expected 0-100)", level)
            }
            ControlEvent::CommandIssued { command } => debug!("Issued: {}", command),
            ControlEvent::ActuationFailed { command, detail } => {
                error!("Failed to set fan level via '{}': {}", command, detail)
            }
            ControlEvent::CycleSkipped { detail } => {
                warn!("Skipping fan adjustment this cycle: {}", detail)
            }
            ControlEvent::LoopStarted { poll_interval_secs } => info!(
                "Starting fan control loop (poll every {}s)",
                poll_interval_secs
            ),
            ControlEvent::LoopStopped => info!("Fan control loop stopped"),
            ControlEvent::ToolExited {
                command,
                status,
                stderr,
            } => warn!("'{}' exited with {}: {}", command, status, stderr),
            ControlEvent::ToolOutput { command, output } => {
                debug!("'{}' printed: {}", command, output)
            }
        }
    }
}

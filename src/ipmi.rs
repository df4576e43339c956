//! BMC fan actuation over IPMI raw commands

use crate::errors::{FanManagerError, Result};
use crate::telemetry::{ControlEvent, Telemetry};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::process::Command;

/// Switch the BMC to manual fan control
pub const MANUAL_MODE: [u8; 4] = [0x30, 0x30, 0x01, 0x00];
/// Prefix of the set-level command; the percentage is appended as the last byte
pub const SET_LEVEL_PREFIX: [u8; 4] = [0x30, 0x30, 0x02, 0xff];

/// Raw payload that sets all fans to `level` percent
pub fn set_level_payload(level: u8) -> Vec<u8> {
    let mut payload = SET_LEVEL_PREFIX.to_vec();
    payload.push(level);
    payload
}

/// Render a payload as space-separated hex bytes (`0x30 0x30 0x02 0xff 0x32`)
pub fn hex_bytes(payload: &[u8]) -> String {
    payload
        .iter()
        .map(|b| format!("{:#04x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Delivers raw command payloads to the BMC
#[async_trait]
pub trait BmcTransport: Send + Sync {
    /// Human-readable form of the invocation for `payload`
    fn describe(&self, payload: &[u8]) -> String;

    /// Dispatch `payload`; errors only when the command could not be issued at all
    async fn send_raw(&self, payload: &[u8]) -> Result<()>;
}

/// Sends raw commands through the `ipmitool` binary
#[derive(Clone)]
pub struct IpmiTool {
    program: String,
    telemetry: Arc<dyn Telemetry>,
}

impl IpmiTool {
    pub fn new(telemetry: Arc<dyn Telemetry>) -> Self {
        Self::with_program("ipmitool", telemetry)
    }

    pub fn with_program(program: impl Into<String>, telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            program: program.into(),
            telemetry,
        }
    }
}

#[async_trait]
impl BmcTransport for IpmiTool {
    fn describe(&self, payload: &[u8]) -> String {
        format!("{} raw {}", self.program, hex_bytes(payload))
    }

    async fn send_raw(&self, payload: &[u8]) -> Result<()> {
        let args: Vec<String> = payload.iter().map(|b| format!("{:#04x}", b)).collect();

        // Captured so the tool never writes into the JSON printed on our stdout
        let output = Command::new(&self.program)
            .arg("raw")
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                FanManagerError::Actuation(format!(
                    "failed to run '{}': {}",
                    self.describe(payload),
                    e
                ))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !stdout.is_empty() {
            self.telemetry.emit(ControlEvent::ToolOutput {
                command: self.describe(payload),
                output: stdout,
            });
        }

        // The BMC's answer is not checked; only dispatch failures are errors
        if !output.status.success() {
            self.telemetry.emit(ControlEvent::ToolExited {
                command: self.describe(payload),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of a fan-level request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Ok,
    InvalidInput,
    Error,
}

/// Result of [`FanController::set_fan_level`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanCommandResult {
    pub status: CommandStatus,
    /// The level-select command for the requested level
    pub issued_command: String,
    pub error_detail: Option<String>,
}

impl FanCommandResult {
    pub fn is_ok(&self) -> bool {
        self.status == CommandStatus::Ok
    }
}

/// Actuator boundary: validates a level and drives the BMC into manual mode at that level
pub struct FanController {
    transport: Arc<dyn BmcTransport>,
    telemetry: Arc<dyn Telemetry>,
}

impl FanController {
    pub fn new(transport: Arc<dyn BmcTransport>, telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            transport,
            telemetry,
        }
    }

    /// Command string reported for `level`, whether or not it is valid
    pub fn level_command(&self, level: i64) -> String {
        match u8::try_from(level) {
            Ok(level) => self.transport.describe(&set_level_payload(level)),
            Err(_) => format!("{} {}", self.transport.describe(&SET_LEVEL_PREFIX), level),
        }
    }

    /// Set every fan to `level` percent.
    ///
    /// Levels outside 0-100 are rejected without touching the BMC. Otherwise the
    /// manual-mode command is sent, then the level command is sent regardless of
    /// how the first one went.
    pub async fn set_fan_level(&self, level: i64) -> FanCommandResult {
        let issued_command = self.level_command(level);

        let level = match u8::try_from(level) {
            Ok(valid) if valid <= 100 => valid,
            _ => {
                self.telemetry.emit(ControlEvent::FanLevelRejected { level });
                return FanCommandResult {
                    status: CommandStatus::InvalidInput,
                    issued_command,
                    error_detail: Some(FanManagerError::InvalidFanLevel(level).to_string()),
                };
            }
        };

        let mode = self.dispatch(&MANUAL_MODE).await;
        let set = self.dispatch(&set_level_payload(level)).await;

        match mode.and(set) {
            Ok(()) => FanCommandResult {
                status: CommandStatus::Ok,
                issued_command,
                error_detail: None,
            },
            Err(e) => FanCommandResult {
                status: CommandStatus::Error,
                issued_command,
                error_detail: Some(e.to_string()),
            },
        }
    }

    async fn dispatch(&self, payload: &[u8]) -> Result<()> {
        let command = self.transport.describe(payload);
        match self.transport.send_raw(payload).await {
            Ok(()) => {
                self.telemetry.emit(ControlEvent::CommandIssued { command });
                Ok(())
            }
            Err(e) => {
                self.telemetry.emit(ControlEvent::ActuationFailed {
                    command,
                    detail: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

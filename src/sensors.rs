//! CPU core temperature acquisition from lm-sensors

use crate::errors::{FanManagerError, Result};
use crate::telemetry::{ControlEvent, Telemetry};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::process::Command;

/// Chip identifiers scanned when none are configured
pub const DEFAULT_SENSOR_CHIPS: [&str; 2] = ["coretemp-isa-0000", "coretemp-isa-0001"];

/// One reading of every sensor the host exposes, keyed by chip identifier.
///
/// Mirrors the layout printed by `sensors -j`:
/// `{"coretemp-isa-0000": {"Adapter": "ISA adapter", "Core 0": {"temp2_input": 42.0}}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorSnapshot {
    chips: Map<String, Value>,
}

impl SensorSnapshot {
    /// Parse the JSON document printed by `sensors -j`
    pub fn from_json(json: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(chips) => Ok(Self { chips }),
            other => Err(FanManagerError::Acquisition(format!(
                "expected a JSON object of chips, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Find the hottest `*_input` reading under any `Core *` metric of the given chips.
    ///
    /// Chips are scanned in order and only a strictly higher reading replaces the
    /// current maximum, so the first-seen core wins a tie. Readings at or below
    /// zero never register.
    pub fn hottest_core<S: AsRef<str>>(&self, chips: &[S]) -> Option<CoreHotspot> {
        let mut hottest: Option<CoreHotspot> = None;

        for chip in chips {
            let chip: &str = chip.as_ref();
            let Some(Value::Object(metrics)) = self.chips.get(chip) else {
                continue;
            };

            for (core, inputs) in metrics.iter().filter(|(key, _)| key.contains("Core")) {
                let Value::Object(inputs) = inputs else {
                    continue;
                };

                for (_, value) in inputs.iter().filter(|(key, _)| key.contains("_input")) {
                    let Some(temperature) = value.as_f64() else {
                        continue;
                    };
                    let current = hottest.as_ref().map_or(0.0, |h| h.temperature);
                    if temperature > current {
                        hottest = Some(CoreHotspot {
                            chip: chip.to_string(),
                            core: core.clone(),
                            temperature,
                        });
                    }
                }
            }
        }

        hottest
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Location and value of the hottest core in a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct CoreHotspot {
    pub chip: String,
    pub core: String,
    pub temperature: f64,
}

/// Anything that can produce a fresh [`SensorSnapshot`]
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Human-readable form of the query, reported alongside readings
    fn command(&self) -> String;

    async fn snapshot(&self) -> Result<SensorSnapshot>;
}

/// Queries lm-sensors through `sensors -j`
#[derive(Clone)]
pub struct LmSensors {
    program: String,
    telemetry: Arc<dyn Telemetry>,
}

impl LmSensors {
    pub fn new(telemetry: Arc<dyn Telemetry>) -> Self {
        Self::with_program("sensors", telemetry)
    }

    /// Use a different `sensors` binary (for example an absolute path)
    pub fn with_program(program: impl Into<String>, telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            program: program.into(),
            telemetry,
        }
    }
}

#[async_trait]
impl SensorSource for LmSensors {
    fn command(&self) -> String {
        format!("{} -j", self.program)
    }

    async fn snapshot(&self) -> Result<SensorSnapshot> {
        let output = Command::new(&self.program)
            .arg("-j")
            .output()
            .await
            .map_err(|e| {
                FanManagerError::Acquisition(format!("failed to run '{}': {}", self.command(), e))
            })?;

        // sensors exits non-zero when a single chip misbehaves but still prints the rest
        if !output.status.success() {
            self.telemetry.emit(ControlEvent::ToolExited {
                command: self.command(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        SensorSnapshot::from_json(&stdout).map_err(|e| {
            FanManagerError::Acquisition(format!(
                "unparsable output from '{}' ({}): {}",
                self.command(),
                output.status,
                e
            ))
        })
    }
}

/// Outcome of a temperature read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadingStatus {
    Ok,
    Error,
}

/// Highest core temperature plus how it was obtained
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureReading {
    /// Degrees Celsius; `None` when the read failed
    pub value: Option<f64>,
    pub source_command: String,
    pub status: ReadingStatus,
    pub error_detail: Option<String>,
}

impl TemperatureReading {
    pub fn ok(value: f64, source_command: String) -> Self {
        Self {
            value: Some(value),
            source_command,
            status: ReadingStatus::Ok,
            error_detail: None,
        }
    }

    pub fn error(source_command: String, detail: String) -> Self {
        Self {
            value: None,
            source_command,
            status: ReadingStatus::Error,
            error_detail: Some(detail),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReadingStatus::Ok
    }
}

/// Reduces a sensor snapshot to the single hottest core temperature
pub struct TemperatureReader {
    source: Arc<dyn SensorSource>,
    telemetry: Arc<dyn Telemetry>,
}

impl TemperatureReader {
    pub fn new(source: Arc<dyn SensorSource>, telemetry: Arc<dyn Telemetry>) -> Self {
        Self { source, telemetry }
    }

    /// Read the hottest core across `chips`.
    ///
    /// Failure to query or parse the sensor source yields an `Error` reading.
    /// Finding no matching core is not an error: the reading is `Ok` with a
    /// value of zero.
    pub async fn read<S: AsRef<str>>(&self, chips: &[S]) -> TemperatureReading {
        let command = self.source.command();

        let snapshot = match self.source.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let detail = e.to_string();
                self.telemetry.emit(ControlEvent::AcquisitionFailed {
                    command: command.clone(),
                    detail: detail.clone(),
                });
                return TemperatureReading::error(command, detail);
            }
        };

        match snapshot.hottest_core(chips) {
            Some(hotspot) => {
                let temperature = hotspot.temperature;
                self.telemetry.emit(ControlEvent::HottestCore {
                    chip: hotspot.chip,
                    core: hotspot.core,
                    temperature,
                });
                TemperatureReading::ok(temperature, command)
            }
            None => {
                self.telemetry.emit(ControlEvent::NoMatchingSensors {
                    chips: chips.iter().map(|c| c.as_ref().to_string()).collect(),
                });
                TemperatureReading::ok(0.0, command)
            }
        }
    }
}

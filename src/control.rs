//! Closed control loop: read temperature, compute fan level, actuate, sleep

use crate::curve::{compute_fan_level, CurveConfig};
use crate::errors::Result;
use crate::ipmi::{FanCommandResult, FanController};
use crate::sensors::TemperatureReader;
use crate::telemetry::{ControlEvent, Telemetry};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

/// What a single control cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A level was computed and handed to the actuator
    Actuated {
        temperature: f64,
        level: u8,
        result: FanCommandResult,
    },
    /// The temperature could not be read, so the BMC was left alone
    Skipped { detail: String },
}

/// Drives the fans from CPU temperature until told to stop
pub struct ControlLoop {
    reader: TemperatureReader,
    controller: FanController,
    config: CurveConfig,
    sensor_chips: Vec<String>,
    telemetry: Arc<dyn Telemetry>,
}

impl ControlLoop {
    /// Build a loop for `config`, rejecting curves that violate their invariants
    pub fn new(
        reader: TemperatureReader,
        controller: FanController,
        config: CurveConfig,
        sensor_chips: Vec<String>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            reader,
            controller,
            config,
            sensor_chips,
            telemetry,
        })
    }

    pub fn config(&self) -> &CurveConfig {
        &self.config
    }

    /// Run one read, compute, actuate pass without sleeping
    pub async fn run_cycle(&self) -> CycleOutcome {
        let reading = self.reader.read(self.sensor_chips.as_slice()).await;

        let temperature = match reading.value {
            Some(value) if reading.is_ok() => value,
            _ => {
                let detail = reading
                    .error_detail
                    .unwrap_or_else(|| "temperature unavailable".to_string());
                self.telemetry.emit(ControlEvent::CycleSkipped {
                    detail: detail.clone(),
                });
                return CycleOutcome::Skipped { detail };
            }
        };

        let level = compute_fan_level(temperature, &self.config);
        self.telemetry
            .emit(ControlEvent::FanLevelComputed { temperature, level });

        // Actuation failures are reported by the controller; the loop carries on
        let result = self.controller.set_fan_level(i64::from(level)).await;

        CycleOutcome::Actuated {
            temperature,
            level,
            result,
        }
    }

    /// Cycle every poll interval until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// The shutdown signal is checked before each cycle and raced against the sleep.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.poll_interval_secs);
        self.telemetry.emit(ControlEvent::LoopStarted {
            poll_interval_secs: self.config.poll_interval_secs,
        });

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_cycle().await;

            tokio::select! {
                _ = sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.telemetry.emit(ControlEvent::LoopStopped);
    }
}

//! Operations exposed to the CLI and the remote tool surface
//!
//! Every operation answers with a [`ToolResponse`], the request/response
//! payload shared by all front ends:
//! `{"response": ..., "command": "...", "status": 200|400|500, "error": "..."}`.

use crate::config::FanManagerConfig;
use crate::control::{ControlLoop, CycleOutcome};
use crate::curve::CurveConfig;
use crate::errors::Result;
use crate::ipmi::{BmcTransport, CommandStatus, FanCommandResult, FanController, IpmiTool};
use crate::sensors::{LmSensors, SensorSource, TemperatureReader, TemperatureReading};
use crate::telemetry::Telemetry;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;

pub const STATUS_OK: u16 = 200;
pub const STATUS_INVALID_INPUT: u16 = 400;
pub const STATUS_ERROR: u16 = 500;

/// Command name reported by [`FanManager::auto_adjust_fan`]
pub const AUTO_ADJUST_COMMAND: &str = "auto_set_fan_speed";

/// Payload returned by every operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub response: Option<Value>,
    pub command: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResponse {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<TemperatureReading> for ToolResponse {
    fn from(reading: TemperatureReading) -> Self {
        let status = if reading.is_ok() {
            STATUS_OK
        } else {
            STATUS_ERROR
        };
        Self {
            response: reading.value.map(Value::from),
            command: reading.source_command,
            status,
            error: reading.error_detail,
        }
    }
}

impl From<FanCommandResult> for ToolResponse {
    fn from(result: FanCommandResult) -> Self {
        let status = match result.status {
            CommandStatus::Ok => STATUS_OK,
            CommandStatus::InvalidInput => STATUS_INVALID_INPUT,
            CommandStatus::Error => STATUS_ERROR,
        };
        Self {
            response: None,
            command: result.issued_command,
            status,
            error: result.error_detail,
        }
    }
}

/// Entry point for the four fan-management operations
#[derive(Clone)]
pub struct FanManager {
    sensors: Arc<dyn SensorSource>,
    transport: Arc<dyn BmcTransport>,
    telemetry: Arc<dyn Telemetry>,
    sensor_chips: Vec<String>,
}

impl FanManager {
    pub fn new(
        sensors: Arc<dyn SensorSource>,
        transport: Arc<dyn BmcTransport>,
        telemetry: Arc<dyn Telemetry>,
        sensor_chips: Vec<String>,
    ) -> Self {
        Self {
            sensors,
            transport,
            telemetry,
            sensor_chips,
        }
    }

    /// Manager backed by `sensors -j` and `ipmitool`
    pub fn system(config: &FanManagerConfig, telemetry: Arc<dyn Telemetry>) -> Self {
        Self::new(
            Arc::new(LmSensors::new(Arc::clone(&telemetry))),
            Arc::new(IpmiTool::new(Arc::clone(&telemetry))),
            telemetry,
            config.sensor_chips.clone(),
        )
    }

    pub fn sensor_chips(&self) -> &[String] {
        &self.sensor_chips
    }

    fn reader(&self) -> TemperatureReader {
        TemperatureReader::new(Arc::clone(&self.sensors), Arc::clone(&self.telemetry))
    }

    fn controller(&self) -> FanController {
        FanController::new(Arc::clone(&self.transport), Arc::clone(&self.telemetry))
    }

    /// Read the hottest CPU core
    pub async fn get_temperature(&self) -> ToolResponse {
        self.reader().read(self.sensor_chips.as_slice()).await.into()
    }

    /// Put the BMC in manual mode at `level` percent
    pub async fn set_fan(&self, level: i64) -> ToolResponse {
        self.controller().set_fan_level(level).await.into()
    }

    /// Run a single read, compute, actuate cycle with `curve`
    pub async fn auto_adjust_fan(&self, curve: &CurveConfig) -> ToolResponse {
        let control = match self.control_loop(curve.clone()) {
            Ok(control) => control,
            Err(e) => {
                return ToolResponse {
                    response: None,
                    command: AUTO_ADJUST_COMMAND.to_string(),
                    status: STATUS_INVALID_INPUT,
                    error: Some(e.to_string()),
                }
            }
        };

        match control.run_cycle().await {
            CycleOutcome::Skipped { detail } => ToolResponse {
                response: None,
                command: AUTO_ADJUST_COMMAND.to_string(),
                status: STATUS_ERROR,
                error: Some(detail),
            },
            CycleOutcome::Actuated {
                temperature,
                level,
                result,
            } => {
                let response = Some(json!({
                    "temperature": temperature,
                    "fan_level": level,
                }));
                if result.is_ok() {
                    ToolResponse {
                        response,
                        command: AUTO_ADJUST_COMMAND.to_string(),
                        status: STATUS_OK,
                        error: None,
                    }
                } else {
                    ToolResponse {
                        response,
                        command: AUTO_ADJUST_COMMAND.to_string(),
                        status: STATUS_ERROR,
                        error: result.error_detail,
                    }
                }
            }
        }
    }

    /// Control loop over this manager's ports
    pub fn control_loop(&self, curve: CurveConfig) -> Result<ControlLoop> {
        ControlLoop::new(
            self.reader(),
            self.controller(),
            curve,
            self.sensor_chips.clone(),
            Arc::clone(&self.telemetry),
        )
    }

    /// Run the control loop until `shutdown` fires.
    ///
    /// Only an invalid curve is an error; acquisition and actuation failures
    /// are absorbed by the loop.
    pub async fn run_service(
        &self,
        curve: CurveConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let control = self.control_loop(curve)?;
        control.run(shutdown).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipmi::{set_level_payload, MANUAL_MODE};
    use crate::test_utils::{coretemp_json, RecordingTelemetry, RecordingTransport, ScriptedSensors};

    fn manager(
        sensors: Arc<ScriptedSensors>,
        transport: Arc<RecordingTransport>,
    ) -> FanManager {
        FanManager::new(
            sensors,
            transport,
            RecordingTelemetry::new(),
            vec!["coretemp-isa-0000".to_string(), "coretemp-isa-0001".to_string()],
        )
    }

    #[tokio::test]
    async fn test_get_temperature_payload() {
        let fan = manager(
            ScriptedSensors::always(&coretemp_json(57.0)),
            RecordingTransport::new(),
        );

        let response = fan.get_temperature().await;
        assert_eq!(response.status, STATUS_OK);
        assert_eq!(response.response, Some(json!(57.0)));
        assert_eq!(response.command, "sensors -j");

        let payload: Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert_eq!(
            payload,
            json!({"response": 57.0, "command": "sensors -j", "status": 200})
        );
    }

    #[tokio::test]
    async fn test_get_temperature_failure_payload() {
        let fan = manager(ScriptedSensors::failing(), RecordingTransport::new());

        let response = fan.get_temperature().await;
        assert_eq!(response.status, STATUS_ERROR);
        assert_eq!(response.response, None);
        assert!(response.error.is_some());

        let payload: Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert_eq!(payload["response"], Value::Null);
        assert_eq!(payload["status"], json!(500));
    }

    #[tokio::test]
    async fn test_set_fan_statuses() {
        let transport = RecordingTransport::new();
        let fan = manager(ScriptedSensors::failing(), transport.clone());

        let ok = fan.set_fan(50).await;
        assert_eq!(ok.status, STATUS_OK);
        assert_eq!(ok.response, None);
        assert_eq!(ok.command, "fake raw 0x30 0x30 0x02 0xff 0x32");

        assert_eq!(fan.set_fan(150).await.status, STATUS_INVALID_INPUT);
        assert_eq!(fan.set_fan(-1).await.status, STATUS_INVALID_INPUT);

        // only the valid request reached the BMC
        assert_eq!(
            transport.sent(),
            vec![MANUAL_MODE.to_vec(), set_level_payload(50)]
        );
    }

    #[tokio::test]
    async fn test_set_fan_dispatch_failure() {
        let transport = RecordingTransport::failing_on(set_level_payload(60));
        let fan = manager(ScriptedSensors::failing(), transport);

        let response = fan.set_fan(60).await;
        assert_eq!(response.status, STATUS_ERROR);
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn test_auto_adjust_success() {
        let transport = RecordingTransport::new();
        let fan = manager(ScriptedSensors::always(&coretemp_json(70.0)), transport.clone());

        let response = fan.auto_adjust_fan(&CurveConfig::default()).await;
        assert_eq!(response.status, STATUS_OK);
        assert_eq!(response.command, AUTO_ADJUST_COMMAND);
        assert_eq!(
            response.response,
            Some(json!({"temperature": 70.0, "fan_level": 17}))
        );
        assert_eq!(transport.sent().last(), Some(&set_level_payload(17)));
    }

    #[tokio::test]
    async fn test_auto_adjust_rejects_degenerate_curve() {
        let transport = RecordingTransport::new();
        let sensors = ScriptedSensors::always(&coretemp_json(70.0));
        let fan = manager(sensors.clone(), transport.clone());

        let curve = CurveConfig {
            min_temp: 60.0,
            max_temp: 60.0,
            ..CurveConfig::default()
        };
        let response = fan.auto_adjust_fan(&curve).await;
        assert_eq!(response.status, STATUS_INVALID_INPUT);
        assert_eq!(sensors.reads(), 0);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_auto_adjust_read_failure() {
        let transport = RecordingTransport::new();
        let fan = manager(ScriptedSensors::failing(), transport.clone());

        let response = fan.auto_adjust_fan(&CurveConfig::default()).await;
        assert_eq!(response.status, STATUS_ERROR);
        assert!(response.error.is_some());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_auto_adjust_actuation_failure() {
        let transport = RecordingTransport::failing_on(MANUAL_MODE.to_vec());
        let fan = manager(ScriptedSensors::always(&coretemp_json(80.0)), transport);

        let response = fan.auto_adjust_fan(&CurveConfig::default()).await;
        assert_eq!(response.status, STATUS_ERROR);
        assert_eq!(
            response.response,
            Some(json!({"temperature": 80.0, "fan_level": 100}))
        );
    }

    #[tokio::test]
    async fn test_run_service_rejects_invalid_curve() {
        let fan = manager(ScriptedSensors::failing(), RecordingTransport::new());
        let (_stop, shutdown) = watch::channel(false);

        let curve = CurveConfig {
            min_temp: 90.0,
            max_temp: 40.0,
            ..CurveConfig::default()
        };
        assert!(fan.run_service(curve, shutdown).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_service_until_shutdown() {
        let sensors = ScriptedSensors::always(&coretemp_json(65.0));
        let transport = RecordingTransport::new();
        let fan = manager(sensors.clone(), transport.clone());
        let (stop, shutdown) = watch::channel(false);

        let curve = CurveConfig {
            exponent: 1.0,
            poll_interval_secs: 10,
            ..CurveConfig::default()
        };
        let task = tokio::spawn(async move { fan.run_service(curve, shutdown).await });

        tokio::time::sleep(std::time::Duration::from_secs(25)).await;
        stop.send(true).unwrap();
        task.await.unwrap().unwrap();

        // t = 0, 10, 20
        assert_eq!(sensors.reads(), 3);
        assert_eq!(transport.sent().last(), Some(&set_level_payload(52)));
    }
}

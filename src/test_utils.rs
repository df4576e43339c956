//! Fakes for the sensor, BMC and telemetry ports shared by the unit tests

use crate::errors::{FanManagerError, Result};
use crate::ipmi::{hex_bytes, BmcTransport};
use crate::sensors::{SensorSnapshot, SensorSource};
use crate::telemetry::{ControlEvent, Telemetry};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Snapshot with a single Intel chip whose hottest core reads `temperature`
pub fn coretemp_json(temperature: f64) -> String {
    format!(
        r#"{{"coretemp-isa-0000": {{"Adapter": "ISA adapter", "Core 0": {{"temp2_input": 30.0}}, "Core 1": {{"temp3_input": {:.1}}}}}}}"#,
        temperature
    )
}

/// Sensor source that replays canned `sensors -j` output.
///
/// `None` entries fail the read. The last entry repeats once the script runs out.
pub struct ScriptedSensors {
    script: Vec<Option<String>>,
    reads: AtomicUsize,
}

impl ScriptedSensors {
    pub fn sequence(script: Vec<Option<String>>) -> Arc<Self> {
        assert!(!script.is_empty(), "script needs at least one entry");
        Arc::new(Self {
            script,
            reads: AtomicUsize::new(0),
        })
    }

    pub fn always(json: &str) -> Arc<Self> {
        Self::sequence(vec![Some(json.to_string())])
    }

    pub fn failing() -> Arc<Self> {
        Self::sequence(vec![None])
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SensorSource for ScriptedSensors {
    fn command(&self) -> String {
        "sensors -j".to_string()
    }

    async fn snapshot(&self) -> Result<SensorSnapshot> {
        let index = self.reads.fetch_add(1, Ordering::SeqCst);
        let entry = &self.script[index.min(self.script.len() - 1)];
        match entry {
            Some(json) => SensorSnapshot::from_json(json),
            None => Err(FanManagerError::Acquisition(
                "sensors: command not found".to_string(),
            )),
        }
    }
}

/// BMC transport that records every payload instead of sending it
pub struct RecordingTransport {
    sent: Mutex<Vec<Vec<u8>>>,
    fail_on: Option<Vec<u8>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_on: None,
        })
    }

    /// Record everything but report a dispatch failure for `payload`
    pub fn failing_on(payload: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_on: Some(payload),
        })
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl BmcTransport for RecordingTransport {
    fn describe(&self, payload: &[u8]) -> String {
        format!("fake raw {}", hex_bytes(payload))
    }

    async fn send_raw(&self, payload: &[u8]) -> Result<()> {
        self.sent.lock().unwrap().push(payload.to_vec());
        if self.fail_on.as_deref() == Some(payload) {
            return Err(FanManagerError::Actuation(format!(
                "failed to run '{}'",
                self.describe(payload)
            )));
        }
        Ok(())
    }
}

/// Telemetry sink that keeps every event
#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<ControlEvent>>,
}

impl RecordingTelemetry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ControlEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Telemetry for RecordingTelemetry {
    fn emit(&self, event: ControlEvent) {
        self.events.lock().unwrap().push(event);
    }
}

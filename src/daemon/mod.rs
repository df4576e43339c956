//! D-Bus tool surface for the fan manager
//!
//! Each method is a one-shot call into [`FanManager`] and answers with the
//! JSON form of a [`crate::service::ToolResponse`].

use crate::{
    curve::CurveConfig,
    errors::Result,
    service::{FanManager, ToolResponse},
    DBUS_OBJECT_PATH, DBUS_SERVICE_NAME,
};
use log::{debug, error, info};
use tokio::sync::watch;
use zbus::{dbus_interface, ConnectionBuilder};

/// Serves [`FanManager`] on the system bus
pub struct FanManagerDaemon {
    manager: FanManager,
}

impl FanManagerDaemon {
    pub fn new(manager: FanManager) -> Self {
        Self { manager }
    }

    /// Serve until `shutdown` fires, optionally running the control loop alongside
    pub async fn run(
        self,
        control: Option<CurveConfig>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        info!("Starting fan manager daemon");

        let manager = self.manager.clone();
        let _connection = ConnectionBuilder::system()?
            .name(DBUS_SERVICE_NAME)?
            .serve_at(DBUS_OBJECT_PATH, self)?
            .build()
            .await?;

        info!("Daemon started, listening on DBus as {}", DBUS_SERVICE_NAME);

        match control {
            Some(curve) => manager.run_service(curve, shutdown).await?,
            None => {
                while !*shutdown.borrow() {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Fan manager daemon stopping");
        Ok(())
    }
}

fn encode(response: ToolResponse) -> zbus::fdo::Result<String> {
    response.to_json().map_err(|e| {
        error!("Failed to encode response: {}", e);
        zbus::fdo::Error::Failed(e.to_string())
    })
}

#[dbus_interface(name = "io.github.FanManager")]
impl FanManagerDaemon {
    /// Hottest CPU core temperature
    async fn get_temperature(&self) -> zbus::fdo::Result<String> {
        debug!("Fetching CPU temperature");
        let response = self.manager.get_temperature().await;
        info!("Temperature result: {:?}", response);
        encode(response)
    }

    /// Set the fan level (0-100)
    async fn set_fan(&self, level: i32) -> zbus::fdo::Result<String> {
        debug!("Setting fan level to {}", level);
        let response = self.manager.set_fan(i64::from(level)).await;
        info!("Set fan result: {:?}", response);
        encode(response)
    }

    /// Read, compute and actuate once with the given curve
    async fn auto_adjust_fan(
        &self,
        min_fan_speed: u8,
        max_fan_speed: u8,
        min_temp: f64,
        max_temp: f64,
        exponent: f64,
    ) -> zbus::fdo::Result<String> {
        let curve = CurveConfig {
            min_fan_speed,
            max_fan_speed,
            min_temp,
            max_temp,
            exponent,
            ..CurveConfig::default()
        };
        debug!("Automatic fan speed adjustment with {:?}", curve);

        let response = match curve.validate_operator_bounds() {
            Ok(()) => self.manager.auto_adjust_fan(&curve).await,
            Err(e) => ToolResponse {
                response: None,
                command: crate::service::AUTO_ADJUST_COMMAND.to_string(),
                status: crate::service::STATUS_INVALID_INPUT,
                error: Some(e.to_string()),
            },
        };
        info!("Automatic fan speed result: {:?}", response);
        encode(response)
    }
}

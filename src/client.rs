//! Client for a running fan manager daemon

use crate::{
    args::RemoteCommands,
    curve::CurveConfig,
    errors::{FanManagerError, Result},
};
use log::debug;
use zbus::{dbus_proxy, Connection};

#[dbus_proxy(
    interface = "io.github.FanManager",
    default_service = "io.github.FanManager",
    default_path = "/io/github/FanManager"
)]
trait FanManagerRemote {
    fn get_temperature(&self) -> zbus::Result<String>;

    fn set_fan(&self, level: i32) -> zbus::Result<String>;

    fn auto_adjust_fan(
        &self,
        min_fan_speed: u8,
        max_fan_speed: u8,
        min_temp: f64,
        max_temp: f64,
        exponent: f64,
    ) -> zbus::Result<String>;
}

/// Client for communicating with the fan manager daemon
pub struct FanManagerClient {
    proxy: FanManagerRemoteProxy<'static>,
}

impl FanManagerClient {
    /// Connect to the daemon on the system bus
    pub async fn new() -> Result<Self> {
        let connection = Connection::system().await.map_err(FanManagerError::DBus)?;
        let proxy = FanManagerRemoteProxy::new(&connection).await?;

        Ok(Self { proxy })
    }

    /// Run a remote command and return the daemon's JSON payload
    pub async fn handle(&self, command: RemoteCommands, curve: &CurveConfig) -> Result<String> {
        match command {
            RemoteCommands::Temp => {
                debug!("Requesting temperature from daemon");
                Ok(self.proxy.get_temperature().await?)
            }
            RemoteCommands::SetFan { level } => {
                debug!("Requesting fan level {} from daemon", level);
                let level = i32::try_from(level).map_err(|_| FanManagerError::InvalidFanLevel(level))?;
                Ok(self.proxy.set_fan(level).await?)
            }
            RemoteCommands::Auto => {
                debug!("Requesting automatic adjustment with {:?}", curve);
                Ok(self
                    .proxy
                    .auto_adjust_fan(
                        curve.min_fan_speed,
                        curve.max_fan_speed,
                        curve.min_temp,
                        curve.max_temp,
                        curve.exponent,
                    )
                    .await?)
            }
        }
    }
}

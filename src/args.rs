//! Command line argument parsing for the fan manager

use crate::config::FanManagerConfig;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Fan Manager
///
/// Drives Dell PowerEdge fans through the BMC from CPU core temperature.
/// With no subcommand it runs the control loop until interrupted.
#[derive(Parser, Debug)]
#[command(name = "fan-manager")]
#[command(about = "Manage your Dell PowerEdge fan speed from CPU temperature")]
#[command(version)]
pub struct Args {
    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub curve: CurveArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Curve and polling overrides
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct CurveArgs {
    /// Intensity of fan speed, the curve exponent (0-10) [default: 5]
    #[arg(short, long, global = true)]
    pub intensity: Option<f64>,

    /// Temperature at or below which fans run at the minimum speed (40-90) [default: 50]
    #[arg(short, long, global = true)]
    pub cold: Option<f64>,

    /// Temperature at or above which fans run at the maximum speed (40-90) [default: 80]
    #[arg(short, long, global = true)]
    pub warm: Option<f64>,

    /// Minimum fan speed percentage (0-100) [default: 5]
    #[arg(short, long, global = true)]
    pub slow: Option<u8>,

    /// Maximum fan speed percentage (0-100) [default: 100]
    #[arg(short, long, global = true)]
    pub fast: Option<u8>,

    /// Seconds between temperature polls (1-300) [default: 24]
    #[arg(short, long, global = true)]
    pub poll_rate: Option<u64>,

    /// Sensor chip to scan for core temperatures (repeatable)
    #[arg(long = "chip", value_name = "CHIP", global = true)]
    pub chips: Vec<String>,
}

impl CurveArgs {
    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, mut config: FanManagerConfig) -> FanManagerConfig {
        let curve = &mut config.curve;
        if let Some(intensity) = self.intensity {
            curve.exponent = intensity;
        }
        if let Some(cold) = self.cold {
            curve.min_temp = cold;
        }
        if let Some(warm) = self.warm {
            curve.max_temp = warm;
        }
        if let Some(slow) = self.slow {
            curve.min_fan_speed = slow;
        }
        if let Some(fast) = self.fast {
            curve.max_fan_speed = fast;
        }
        if let Some(poll_rate) = self.poll_rate {
            curve.poll_interval_secs = poll_rate;
        }
        if !self.chips.is_empty() {
            config.sensor_chips = self.chips.clone();
        }
        config
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the hottest CPU core temperature
    Temp,
    /// Set the fan speed percentage (0-100)
    SetFan {
        /// Fan level percentage
        #[arg(allow_negative_numbers = true)]
        level: i64,
    },
    /// Adjust the fan speed once from the current temperature
    Auto,
    /// Serve the fan manager on D-Bus
    Daemon {
        /// Also run the control loop in the daemon
        #[arg(long)]
        control: bool,
    },
    /// Call a running daemon over D-Bus
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },
    /// Print the effective configuration as JSON
    DumpConfig {
        /// Also write it to this path (or the system default when no path is given)
        #[arg(long, value_name = "PATH", num_args = 0..=1)]
        save: Option<Option<PathBuf>>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum RemoteCommands {
    /// Hottest CPU core temperature
    Temp,
    /// Set the fan speed percentage (0-100)
    SetFan {
        #[arg(allow_negative_numbers = true)]
        level: i64,
    },
    /// Adjust the fan speed once with the configured curve
    Auto,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_short_flags_override_defaults() {
        let args = Args::try_parse_from([
            "fan-manager", "-i", "3", "-c", "45", "-w", "85", "-s", "10", "-f", "90", "-p", "30",
        ])
        .unwrap();
        assert!(args.command.is_none());

        let config = args.curve.apply(FanManagerConfig::default());
        assert_eq!(config.curve.exponent, 3.0);
        assert_eq!(config.curve.min_temp, 45.0);
        assert_eq!(config.curve.max_temp, 85.0);
        assert_eq!(config.curve.min_fan_speed, 10);
        assert_eq!(config.curve.max_fan_speed, 90);
        assert_eq!(config.curve.poll_interval_secs, 30);
        assert_eq!(config.sensor_chips.len(), 2);
    }

    #[test]
    fn test_no_flags_keeps_base_config() {
        let args = Args::try_parse_from(["fan-manager"]).unwrap();
        let base = FanManagerConfig::default();
        assert_eq!(args.curve.apply(base.clone()), base);
    }

    #[test]
    fn test_chips_replace_defaults() {
        let args = Args::try_parse_from([
            "fan-manager",
            "--chip",
            "k10temp-pci-00c3",
            "--chip",
            "k10temp-pci-00cb",
        ])
        .unwrap();
        let config = args.curve.apply(FanManagerConfig::default());
        assert_eq!(config.sensor_chips, vec!["k10temp-pci-00c3", "k10temp-pci-00cb"]);
    }

    #[test]
    fn test_set_fan_accepts_negative_level() {
        let args = Args::try_parse_from(["fan-manager", "set-fan", "-1"]).unwrap();
        assert!(matches!(args.command, Some(Commands::SetFan { level: -1 })));

        let args = Args::try_parse_from(["fan-manager", "set-fan", "150"]).unwrap();
        assert!(matches!(args.command, Some(Commands::SetFan { level: 150 })));
    }

    #[test]
    fn test_unparsable_numbers_are_rejected() {
        assert!(Args::try_parse_from(["fan-manager", "-c", "warm"]).is_err());
        assert!(Args::try_parse_from(["fan-manager", "-s", "300"]).is_err());
    }

    #[test]
    fn test_subcommands() {
        let args = Args::try_parse_from(["fan-manager", "daemon", "--control", "-v"]).unwrap();
        assert!(matches!(args.command, Some(Commands::Daemon { control: true })));
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["fan-manager", "remote", "set-fan", "40"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Commands::Remote {
                command: RemoteCommands::SetFan { level: 40 }
            })
        ));

        let args = Args::try_parse_from(["fan-manager", "dump-config", "--save"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Commands::DumpConfig { save: Some(None) })
        ));
    }
}

//! Main entry point for the fan manager

use anyhow::Context;
use clap::Parser;
use fan_manager::{
    args::{Args, Commands},
    client::FanManagerClient,
    daemon::FanManagerDaemon,
    logging,
    telemetry::LogTelemetry,
    FanManager, FanManagerConfig, ToolResponse,
};
use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    // Print version and build metadata for binary identity verification
    let pkg_version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let git_desc = option_env!("GIT_DESC").unwrap_or("unknown");
    let build_time = option_env!("BUILD_TIME").unwrap_or("unknown");
    eprintln!(
        "fan-manager v{} (git {} / {}) built {}",
        pkg_version, git_hash, git_desc, build_time
    );

    let args = Args::parse();

    logging::setup(args.verbose, args.log_file.as_deref()).context("Failed to set up logging")?;

    // Bad configuration is the only fatal error, and only before anything runs
    let config = match FanManagerConfig::resolve(args.config.as_deref()) {
        Ok(base) => args.curve.apply(base),
        Err(e) => {
            error!("{}", e);
            return Ok(ExitCode::from(2));
        }
    };
    if let Err(e) = config.curve.validate_operator_bounds() {
        error!("{}", e);
        return Ok(ExitCode::from(2));
    }

    let telemetry = Arc::new(LogTelemetry);
    let manager = FanManager::system(&config, telemetry);

    let success = match args.command {
        None => {
            let shutdown = shutdown_on_ctrl_c();
            manager
                .run_service(config.curve.clone(), shutdown)
                .await
                .context("Fan control loop failed to start")?;
            true
        }
        Some(Commands::Temp) => print_response(manager.get_temperature().await)?,
        Some(Commands::SetFan { level }) => print_response(manager.set_fan(level).await)?,
        Some(Commands::Auto) => print_response(manager.auto_adjust_fan(&config.curve).await)?,
        Some(Commands::Daemon { control }) => {
            let shutdown = shutdown_on_ctrl_c();
            let curve = control.then(|| config.curve.clone());
            FanManagerDaemon::new(manager)
                .run(curve, shutdown)
                .await
                .context("Fan manager daemon failed")?;
            true
        }
        Some(Commands::Remote { command }) => {
            let client = FanManagerClient::new()
                .await
                .context("Failed to connect to the fan manager daemon")?;
            println!("{}", client.handle(command, &config.curve).await?);
            true
        }
        Some(Commands::DumpConfig { save }) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if let Some(path) = save {
                let path = path.unwrap_or_else(FanManagerConfig::get_config_path);
                config
                    .save_to_file(&path)
                    .with_context(|| format!("Failed to save {}", path.display()))?;
                info!("Configuration saved to {}", path.display());
            }
            true
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_response(response: ToolResponse) -> fan_manager::Result<bool> {
    println!("{}", response.to_json_pretty()?);
    Ok(response.is_success())
}

/// Shutdown channel that flips when Ctrl-C is received
fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                let _ = stop.send(true);
            }
            Err(e) => {
                // keep the sender alive so the service runs until the process is killed
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
                drop(stop);
            }
        }
    });
    shutdown
}

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;

use args::Args;
use clap::Parser;
use config::Config;
use tokio_util::sync::CancellationToken;

mod args;
mod handlers;
mod server;
mod state;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes per spec §6: 0 success, 1 generic failure, 2 configuration
/// error, 3 port bind failure, 130 SIGINT.
#[repr(u8)]
enum ExitStatus {
    Success = 0,
    Failure = 1,
    ConfigError = 2,
    BindFailure = 3,
    Interrupted = 130,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config at {}: {err:#}", args.config.display());
            return ExitCode::from(ExitStatus::ConfigError as u8);
        }
    };

    if let Some(level) = &args.log_filter {
        config.logging.level = level.clone();
    }
    telemetry::init(&config.logging);

    if let Err(err) = config.validate() {
        log::error!("invalid configuration: {err:#}");
        return ExitCode::from(ExitStatus::ConfigError as u8);
    }

    let listen_address = resolve_listen_address(&config, &args);
    config.server.listen_address = Some(listen_address);

    let shutdown_signal = CancellationToken::new();
    let interrupted = shutdown_signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("received SIGINT");
            interrupted.cancel();
        }
    });
    let signal_fired = shutdown_signal.clone();

    let serve_config = server::ServeConfig {
        listen_address,
        config,
        shutdown_signal,
        version: VERSION.to_string(),
    };

    match server::serve(serve_config).await {
        Ok(()) if signal_fired.is_cancelled() => ExitCode::from(ExitStatus::Interrupted as u8),
        Ok(()) => ExitCode::from(ExitStatus::Success as u8),
        Err(err) if err.to_string().contains("failed to bind") => {
            log::error!("{err:#}");
            ExitCode::from(ExitStatus::BindFailure as u8)
        }
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::from(ExitStatus::Failure as u8)
        }
    }
}

/// Resolves the listen address from, in order: CLI/env `--host`/`--port`
/// overrides, the configured `server.listen_address`, then the default
/// `0.0.0.0:8000` (spec §6 `PORT`/`HOST` environment variables).
fn resolve_listen_address(config: &Config, args: &Args) -> SocketAddr {
    let configured = config.server.listen_address.unwrap_or(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000));
    let host = args.host.unwrap_or(configured.ip());
    let port = args.port.unwrap_or(configured.port());
    SocketAddr::new(host, port)
}

//! Command-line / environment arguments (spec §6 "Environment variables
//! recognized", exit codes).

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

fn default_config_path() -> PathBuf {
    dirs_home().join(".routecodex").join("config.json")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Parser)]
#[command(name = "routecodex", author, version, about = "Unified multi-protocol LLM gateway", long_about = None)]
pub struct Args {
    /// Path to `config.json`/`config.toml` (spec §6 on-disk state layout).
    #[arg(long, env = "ROUTECODEX_CONFIG_PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Overrides the configured listen port.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Overrides the configured listen host.
    #[arg(long, env = "HOST")]
    pub host: Option<IpAddr>,

    /// Log filter string (`info`, `debug`, `server=debug,pipeline=trace`, ...).
    #[arg(long, env = "RUST_LOG")]
    pub log_filter: Option<String>,
}

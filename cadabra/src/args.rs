use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Cadabra split-test service
#[derive(Debug, Parser)]
#[command(name = "cadabra", about = "Split-test bucket assignment and reporting service")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "cadabra.toml", env = "CADABRA_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "CADABRA_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Override the configured log filter (`RUST_LOG` still wins)
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    pub check: bool,
}

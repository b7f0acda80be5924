//! Pixelsig Signalling Server
//!
//! Terminates WebSocket connections from streamers, players, and SFUs and
//! brokers their WebRTC signalling. Media never passes through this process.
//!
//! # Usage
//!
//! ```bash
//! # Default (unified endpoint on port 8888)
//! pixelsig-server
//!
//! # Custom port and capacity
//! pixelsig-server --port 9000 --max-subscribers 16
//!
//! # Legacy split ports (8888 streamer / 8889 player / 8890 sfu)
//! pixelsig-server --split
//!
//! # With a config file, overridden by flags
//! pixelsig-server --config broker.json --verbose
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pixelsig_broker::{Broker, BrokerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixelsig-server")]
#[command(about = "Pixelsig signalling broker - routes WebRTC signalling between streamers and players")]
#[command(version)]
struct Cli {
    /// Unified listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Listen host
    #[arg(long)]
    host: Option<String>,

    /// Use legacy split ports instead of the unified endpoint
    #[arg(long)]
    split: bool,

    /// Per-streamer subscriber cap
    #[arg(long)]
    max_subscribers: Option<usize>,

    /// Refuse SFU connections
    #[arg(long)]
    disable_sfu: bool,

    /// JSON configuration file (flags take precedence)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug,pixelsig_broker=trace,pixelsig_transport=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            serde_json::from_str::<BrokerConfig>(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => BrokerConfig::default(),
    };

    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.unified_port = port;
    }
    if cli.split {
        config.enable_unified_port = false;
    }
    if let Some(cap) = cli.max_subscribers {
        config.max_subscribers = cap;
    }
    if cli.disable_sfu {
        config.enable_sfu = false;
    }

    tracing::info!("Pixelsig signalling broker starting");
    if config.enable_unified_port {
        tracing::info!(
            "Unified endpoint: ws://{}:{} (paths {}, {}, {}, {})",
            config.host,
            config.unified_port,
            config.player_path,
            config.streamer_path,
            config.sfu_path,
            config.unreal_path,
        );
    } else {
        tracing::info!(
            "Split endpoints: streamer {}, player {}, sfu {}",
            config.streamer_port,
            config.player_port,
            config.sfu_port,
        );
    }
    tracing::info!(
        max_subscribers = config.max_subscribers,
        sfu_enabled = config.enable_sfu,
        "broker configured"
    );

    let broker = Broker::new(config);
    broker.serve().await?;

    Ok(())
}

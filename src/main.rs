//! Rockfall Server
//!
//! Authoritative server binary. Listens until Ctrl-C.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rockfall::{GameServer, ServerConfig, VERSION};

/// Command line arguments.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on
    #[clap(short, long, default_value_t = rockfall::network::server::DEFAULT_PORT)]
    port: u16,
    /// Simulation ticks per second
    #[clap(short, long, default_value_t = rockfall::TICK_RATE)]
    tick_rate: u32,
    /// Refuse connections beyond this many
    #[clap(long, default_value_t = 256)]
    max_connections: usize,
    /// Drop clients silent for this many seconds
    #[clap(long)]
    idle_timeout_secs: Option<u64>,
    /// Close clients sending a longer line (0 for no limit)
    #[clap(long, default_value_t = rockfall::network::server::DEFAULT_MAX_LINE_LEN)]
    max_line_bytes: usize,
    /// Seed for hazard spawning
    #[clap(long)]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("invalid host address: {}", self.host))?;
        anyhow::ensure!(self.tick_rate > 0, "tick rate must be positive");

        Ok(ServerConfig {
            bind_addr: SocketAddr::new(ip, self.port),
            tick_rate: self.tick_rate,
            max_connections: self.max_connections,
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
            max_line_len: Some(self.max_line_bytes).filter(|&n| n > 0),
            rng_seed: self.seed,
            ..Default::default()
        })
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Args::parse().into_config()?;
    info!("Rockfall Server v{}", VERSION);

    let handle = GameServer::new(config)
        .start()
        .await
        .context("server failed to start")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Ctrl-C received, shutting down");

    handle.shutdown().await;
    Ok(())
}

//! revsync server
//!
//! Serves pull and push for offline survey clients over HTTP.

use clap::Parser;
use revsync_core::StoreConfig;
use revsync_server::{ServerConfig, SyncServer};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// revsync pull/push sync server.
#[derive(Parser)]
#[command(name = "revsync-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, env = "REVSYNC_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Request timeout in seconds
    #[arg(long, env = "REVSYNC_REQUEST_TIMEOUT", default_value = "30")]
    request_timeout: u64,

    /// Maximum ledger entries returned by one pull
    #[arg(long, env = "REVSYNC_MAX_PULL_RECORDS", default_value = "1000")]
    max_pull_records: usize,

    /// Maximum records accepted by one push
    #[arg(long, env = "REVSYNC_MAX_PUSH_BATCH", default_value = "100")]
    max_push_batch: usize,

    /// Writer lock timeout in milliseconds
    #[arg(long, env = "REVSYNC_LOCK_TIMEOUT_MS", default_value = "5000")]
    lock_timeout_ms: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.bind)
            .with_request_timeout(Duration::from_secs(self.request_timeout))
            .with_max_pull_records(self.max_pull_records)
            .with_max_push_batch(self.max_push_batch)
            .with_store(StoreConfig::new().lock_timeout(Duration::from_millis(self.lock_timeout_ms)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.server_config();
    tracing::info!(
        bind = %config.bind_addr,
        max_pull_records = config.max_pull_records,
        max_push_batch = config.max_push_batch,
        "starting revsync server"
    );

    SyncServer::new(config)?.serve().await?;
    Ok(())
}

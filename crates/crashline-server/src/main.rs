//! Crashline server binary.
//!
//! # Usage
//!
//! ```bash
//! crashline-server --bind 0.0.0.0:9933
//!
//! # Shorter rounds for local testing
//! crashline-server --bet-window-ms 2000 --log-level debug
//! ```

use std::time::Duration;

use clap::Parser;
use crashline_core::{EngineConfig, Money};
use crashline_server::{DriverConfig, Server, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Crashline game server
#[derive(Parser, Debug)]
#[command(name = "crashline-server")]
#[command(about = "Crash-game server speaking the framed binary object protocol")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:9933")]
    bind: String,

    /// Round clock tick interval in milliseconds
    #[arg(long, default_value = "100")]
    tick_ms: u64,

    /// Betting window in milliseconds
    #[arg(long, default_value = "5000")]
    bet_window_ms: u64,

    /// Longest a socket write may block before the client is dropped
    #[arg(long, default_value = "2000")]
    write_timeout_ms: u64,

    /// Balance credited to newly logged-in players, in major units
    #[arg(long, default_value = "3000")]
    start_balance: u64,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let engine = EngineConfig {
        bet_duration: Duration::from_millis(args.bet_window_ms),
        starting_balance: Money::from_major(args.start_balance),
        ..Default::default()
    };
    let config = ServerConfig {
        bind_address: args.bind,
        tick_interval: Duration::from_millis(args.tick_ms),
        write_timeout: Duration::from_millis(args.write_timeout_ms),
        driver: DriverConfig { max_connections: args.max_connections, engine, ..Default::default() },
        ..Default::default()
    };

    let server = Server::bind(config).await?;
    tracing::info!("Server listening on {}", server.local_addr()?);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown requested");
        })
        .await?;

    Ok(())
}

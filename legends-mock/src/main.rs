//! City Legends mock match server
//!
//! Plays the demo match to every client that connects to
//! `ws://HOST:PORT/ws/match/:matchId?playerId=...`.
//!
//! # Usage
//!
//! ```bash
//! # Default: all interfaces, port 8081, real-time pace
//! cargo run -p legends-mock
//!
//! # Custom port, ten times faster
//! WS_PORT=9000 cargo run -p legends-mock -- --pace 0.1
//! ```

use clap::Parser;
use legends_core::{init_observability, shutdown_observability, ObservabilityConfig};
use legends_mock::{MatchScript, MockMatchServer};
use std::net::{IpAddr, SocketAddr};

#[derive(Parser, Debug)]
#[command(author, version, about = "Scripted WebSocket match server for City Legends", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "WS_PORT", default_value_t = 8081)]
    port: u16,

    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Timeline multiplier; 0.5 plays the match twice as fast
    #[arg(long, default_value_t = 1.0)]
    pace: f64,

    /// Log filter directive (RUST_LOG wins when set)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    init_observability(ObservabilityConfig::console("legends-mock").with_log_level(args.log_level))?;

    let server = MockMatchServer::builder()
        .bind(SocketAddr::new(args.host, args.port))
        .script(MatchScript::demo().scaled(args.pace))
        .build()
        .await?;

    tracing::info!(
        "Listening on ws://{}/ws/match/:matchId",
        server.local_addr()?
    );

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    shutdown_observability();
    Ok(())
}

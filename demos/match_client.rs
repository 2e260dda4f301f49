//! Example: follow a match and survive server restarts
//!
//! Start the mock server first:
//! ```bash
//! cargo run -p legends-mock -- --pace 0.2
//! ```
//!
//! Then run this client (optionally with a match URL):
//! ```bash
//! cargo run --example match_client
//! cargo run --example match_client -- ws://127.0.0.1:8081/ws/match/m_42?playerId=p_me
//! ```
//!
//! Stop and restart the server to watch the client back off and reconnect.
//! Ctrl-C closes the channel and exits.

use legends::client::{ClientBuilder, ConnectionState, InboundEvent};
use legends::core::{init_observability, shutdown_observability, EventKind, ObservabilityConfig};
use serde_json::json;
use std::time::Duration;

const DEFAULT_URL: &str = "ws://127.0.0.1:8081/ws/match/m_demo_1?playerId=p_demo_you";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_observability(ObservabilityConfig::console("match-client"))?;

    let url = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string());
    println!("=== City Legends match client ===");
    println!("Following {}\n", url);

    let client = ClientBuilder::new(url)
        .reconnect_delay(Duration::from_secs(1))
        .max_reconnect_delay(Duration::from_secs(15))
        .heartbeat_interval(Some(Duration::from_secs(20)))
        .log_prefix("[match]")
        .on_open(|| println!("✓ Connected"))
        .on_event(|event| match &event {
            InboundEvent::Json(_) => match event.envelope() {
                Some(envelope) => match envelope.known_kind() {
                    Some(EventKind::TurnStart) => println!(
                        "▶ Turn {} for {}",
                        envelope.payload["turnNumber"], envelope.payload["activePlayerId"]
                    ),
                    Some(kind) => println!("📩 {}: {}", kind.as_str(), envelope.payload),
                    None => println!("📩 {} (unknown kind)", envelope.kind),
                },
                None => println!("📩 {}", event.as_json().map(ToString::to_string).unwrap_or_default()),
            },
            InboundEvent::Raw(frame) => println!("📦 raw frame ({} bytes)", frame.len()),
        })
        .on_error(|error| println!("✗ {}", error))
        .on_close(|info| println!("Connection closed: {} {}", info.code, info.reason))
        .build()?;

    client.connect();

    // Announce ourselves once the first connection is up
    let announcer = {
        let client = client.clone();
        let mut state = client.state_receiver();
        tokio::spawn(async move {
            if state.wait_for(|s| *s == ConnectionState::Open).await.is_ok() {
                let _ = client.send_json(&json!({ "type": "ready" }));
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    println!("\nClosing...");
    announcer.abort();
    client.close();

    let mut state = client.state_receiver();
    let _ = tokio::time::timeout(
        Duration::from_secs(6),
        state.wait_for(|s| s.is_terminal()),
    )
    .await;

    shutdown_observability();
    Ok(())
}

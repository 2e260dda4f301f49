//! Resilient real-time event channel client for City Legends
//!
//! This crate keeps one persistent connection between a game page and the
//! match server alive: it reconnects with exponential backoff after
//! unplanned drops, keeps the connection warm with a heartbeat and decodes
//! inbound JSON before handing it to application callbacks.
//!
//! # Core Features
//!
//! - **WebSocket Transport**: tokio-tungstenite behind a small [`Transport`] trait
//! - **Auto-Reconnection**: exponential backoff, reset after every successful open
//! - **Heartbeat**: configurable keepalive payload while the connection is open
//! - **Message Policy**: every frame reaches `on_raw_message`; valid JSON reaches `on_event`
//! - **Manual Close**: `close()` ends the instance and suppresses reconnection
//! - **Observability**: structured logging plus optional OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use legends_client::{ClientBuilder, InboundEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("ws://localhost:8081/ws/match/m_demo_1?playerId=p_demo_you")
//!         .log_prefix("[match]")
//!         .on_event(|event: InboundEvent| {
//!             if let Some(envelope) = event.envelope() {
//!                 println!("{} at {}", envelope.kind, envelope.timestamp);
//!             }
//!         })
//!         .on_close(|info| println!("closed: {}", info))
//!         .build()?;
//!
//!     client.connect();
//!     client.send_json(&serde_json::json!({"type": "play_card", "cardId": "c_42"}))?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! # Handler Objects
//!
//! ```rust,no_run
//! use legends_client::{ChannelHandler, ClientConfig, InboundEvent, RealtimeClient};
//!
//! struct Hud;
//!
//! impl ChannelHandler for Hud {
//!     fn on_event(&mut self, event: InboundEvent) {
//!         println!("{:?}", event);
//!     }
//! }
//!
//! # async fn example() -> legends_core::Result<()> {
//! let client = RealtimeClient::new("ws://localhost:8081/ws/match/m_1", ClientConfig::default(), Hud)?;
//! client.connect();
//! # Ok(())
//! # }
//! ```

mod callbacks;
mod client;
mod client_builder;
mod config;
mod connection_state;
mod metrics;
mod reconnect;
mod transport;

pub use callbacks::{Callbacks, ChannelHandler, InboundEvent};
pub use client::RealtimeClient;
pub use client_builder::ClientBuilder;
pub use config::{
    ClientConfig, ClientOptions, DEFAULT_HEARTBEAT_INTERVAL_MS, DEFAULT_LOG_PREFIX,
    DEFAULT_MAX_RECONNECT_DELAY_MS, DEFAULT_RECONNECT_DELAY_MS,
};
pub use connection_state::ConnectionState;
pub use metrics::ClientMetrics;
pub use reconnect::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectionStrategy};
pub use transport::{Connector, Transport, TransportEvent, WsConnector, WsTransport};

pub use legends_core::{CloseInfo, Error, Frame, Payload, Result};

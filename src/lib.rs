//! City Legends real-time event channel
//!
//! This is the umbrella crate that re-exports the workspace crates. Depend
//! on it when you want the client and the mock server behind one name.
//!
//! # Architecture
//!
//! - **legends-core**: wire types, frame codec, errors, observability
//! - **legends-client**: the reconnecting, heartbeating channel client
//! - **legends-mock**: a scripted match server for local play and tests
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use legends::RealtimeClient;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RealtimeClient::builder("ws://localhost:8081/ws/match/m_demo_1")
//!         .reconnect_delay(Duration::from_secs(1))
//!         .on_event(|event| println!("event: {:?}", event))
//!         .on_close(|info| println!("closed: {}", info.code))
//!         .build()?;
//!
//!     client.connect();
//!     client.send_json(&serde_json::json!({"type": "ready"}))?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.close();
//!     Ok(())
//! }
//! ```

pub use legends_client as client;
pub use legends_core as core;
pub use legends_mock as mock;

pub use legends_client::{ClientBuilder, RealtimeClient};
pub use legends_mock::MockMatchServer;

//! Scripted WebSocket match server for City Legends clients
//!
//! `legends-mock` plays a canned match to every client that connects to
//! `/ws/match/:matchId?playerId=...`, logs whatever the client sends and can
//! drop every connection on demand to exercise client reconnection.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use legends_mock::{MatchScript, MockMatchServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = MockMatchServer::builder()
//!         .bind(([127, 0, 0, 1], 8081))
//!         .script(MatchScript::demo())
//!         .build()
//!         .await?;
//!
//!     println!("listening on ws://{}/ws/match/:matchId", server.local_addr()?);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # In Tests
//!
//! ```rust,no_run
//! use legends_mock::{MatchScript, MockMatchServer};
//! use std::time::Duration;
//!
//! # async fn example() -> legends_core::Result<()> {
//! let server = MockMatchServer::builder()
//!     .bind(([127, 0, 0, 1], 0))
//!     .script(MatchScript::demo().scaled(0.01))
//!     .build()
//!     .await?
//!     .spawn();
//!
//! let url = server.match_url("m_1", "p_1");
//! // ... connect a client to `url` ...
//! server.wait_for_connections(1, Duration::from_secs(5)).await;
//! server.disconnect_all();
//! # Ok(())
//! # }
//! ```

mod builder;
mod connection;
pub mod script;

pub use builder::MockServerBuilder;
pub use script::{MatchContext, MatchScript, ScriptStep};

use legends_core::{Error, Result, CLOSE_GOING_AWAY};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};

/// Body of a message a client sent
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// Text that parsed as JSON
    Json(serde_json::Value),
    /// Text that is not JSON
    Text(String),
    Binary(Vec<u8>),
}

/// A message received from a client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMessage {
    pub match_id: String,
    pub player_id: String,
    pub body: MessageBody,
}

impl ClientMessage {
    /// The parsed JSON body, if any
    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.body {
            MessageBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The `type` field of a JSON body
    pub fn message_type(&self) -> Option<&str> {
        self.json()?.get("type")?.as_str()
    }
}

/// State shared by the accept loop, connection tasks and handles
pub(crate) struct Shared {
    pub(crate) script: MatchScript,
    pub(crate) disconnect: broadcast::Sender<u16>,
    pub(crate) received: Mutex<Vec<ClientMessage>>,
    pub(crate) changed: Notify,
    accepted: AtomicUsize,
    active: AtomicUsize,
}

impl Shared {
    pub(crate) fn new(script: MatchScript) -> Self {
        let (disconnect, _) = broadcast::channel(16);
        Self {
            script,
            disconnect,
            received: Mutex::new(Vec::new()),
            changed: Notify::new(),
            accepted: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
        }
    }

    pub(crate) fn connection_opened(&self) {
        self.accepted.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    pub(crate) fn connection_closed(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    /// Wait until `condition` holds, or `timeout` elapses
    async fn wait_until(&self, timeout: Duration, condition: impl Fn(&Self) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register before checking so a change in between is not missed
            let changed = self.changed.notified();
            if condition(self) {
                return true;
            }
            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                return condition(self);
            }
        }
    }

    fn received(&self) -> Vec<ClientMessage> {
        self.received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_default()
    }
}

/// Scripted match server
pub struct MockMatchServer {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl MockMatchServer {
    /// Start configuring a server
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::new()
    }

    pub(crate) fn new(listener: TcpListener, script: MatchScript) -> Self {
        Self {
            listener,
            shared: Arc::new(Shared::new(script)),
        }
    }

    /// The address the server is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::Io(e.to_string()))
    }

    /// A handle for observing and controlling the running server
    pub fn handle(&self) -> Result<MockServerHandle> {
        Ok(MockServerHandle {
            addr: self.local_addr()?,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Close every open connection with code 1001; returns how many were told
    pub fn disconnect_all(&self) -> usize {
        disconnect_all(&self.shared)
    }

    /// Every message received so far, across connections
    pub fn received(&self) -> Vec<ClientMessage> {
        self.shared.received()
    }

    /// Accept connections until the listener fails
    pub async fn run(self) -> Result<()> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Starting mock match server");
        let conn_counter = AtomicU64::new(0);

        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| Error::Io(e.to_string()))?;
            let conn_id = conn_counter.fetch_add(1, Ordering::SeqCst);
            let shared = Arc::clone(&self.shared);

            tokio::spawn(async move {
                if let Err(e) = connection::handle_connection(stream, conn_id, shared).await {
                    tracing::warn!(conn_id, peer = %peer, error = %e, "Connection ended with error");
                }
            });
        }
    }

    /// Run the server on a background task
    pub fn spawn(self) -> MockServerHandle {
        let handle = MockServerHandle {
            // Bound listeners always have an address
            addr: self
                .listener
                .local_addr()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 0))),
            shared: Arc::clone(&self.shared),
        };

        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!(error = %e, "Mock match server stopped");
            }
        });
        handle
    }
}

/// Clonable view of a running [`MockMatchServer`]
#[derive(Clone)]
pub struct MockServerHandle {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl MockServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL a client uses to join `match_id` as `player_id`
    pub fn match_url(&self, match_id: &str, player_id: &str) -> String {
        format!("ws://{}/ws/match/{}?playerId={}", self.addr, match_id, player_id)
    }

    /// Close every open connection with code 1001; returns how many were told
    pub fn disconnect_all(&self) -> usize {
        disconnect_all(&self.shared)
    }

    /// Every message received so far, across connections
    pub fn received(&self) -> Vec<ClientMessage> {
        self.shared.received()
    }

    /// Connections currently open
    pub fn active_connections(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Connections accepted since the server started
    pub fn total_connections(&self) -> usize {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` connections have been accepted in total
    pub async fn wait_for_connections(&self, count: usize, timeout: Duration) -> bool {
        self.shared
            .wait_until(timeout, |shared| shared.accepted.load(Ordering::SeqCst) >= count)
            .await
    }

    /// Wait until at least `count` client messages have been received
    pub async fn wait_for_received(&self, count: usize, timeout: Duration) -> bool {
        self.shared
            .wait_until(timeout, |shared| shared.received().len() >= count)
            .await
    }
}

fn disconnect_all(shared: &Shared) -> usize {
    tracing::info!("Disconnecting all clients");
    shared.disconnect.send(CLOSE_GOING_AWAY).unwrap_or(0)
}

//! Connection state tracking
//!
//! # Connection States
//!
//! ```text
//!   Idle ──connect()──▶ Connecting ──open──▶ Open
//!    ▲                     │                  │
//!    │ (no reconnect)      │ failure          │ close event
//!    │                     ▼                  ▼
//!    └──────────── ReconnectScheduled ◀────────┘
//!                          │ timer
//!                          └──────▶ Connecting
//!
//!   close() from any state ──▶ Closing (while a handle is open) ──▶ ManuallyClosed
//! ```
//!
//! `ManuallyClosed` is terminal. The current state is published through a
//! `tokio::sync::watch` channel so observers always see the latest value.

use std::fmt;
use std::time::Duration;
use tokio::sync::watch;

/// Lifecycle state of a [`RealtimeClient`](crate::RealtimeClient)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No handle and no pending timers
    Idle,
    /// Handshake in flight
    Connecting,
    /// Handle live, heartbeat running
    Open,
    /// Manual close requested, waiting for the handle's close event
    Closing,
    /// Waiting for the reconnect timer
    ReconnectScheduled {
        /// 1-based attempt number since the last successful open
        attempt: u32,
        /// Delay the timer was armed with
        delay: Duration,
    },
    /// Closed by `close()`; no further transitions
    ManuallyClosed,
}

impl ConnectionState {
    /// Whether the state can never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::ManuallyClosed)
    }

    /// Numeric value recorded by the connection state gauge
    pub fn as_gauge(&self) -> i64 {
        match self {
            ConnectionState::Idle => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Open => 2,
            ConnectionState::Closing => 3,
            ConnectionState::ReconnectScheduled { .. } => 4,
            ConnectionState::ManuallyClosed => 5,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => f.write_str("idle"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Open => f.write_str("open"),
            ConnectionState::Closing => f.write_str("closing"),
            ConnectionState::ReconnectScheduled { attempt, delay } => {
                write!(f, "reconnect #{} in {}ms", attempt, delay.as_millis())
            }
            ConnectionState::ManuallyClosed => f.write_str("closed"),
        }
    }
}

/// Owner side of the state channel, held by the client's event loop
pub(crate) struct StateTracker {
    tx: watch::Sender<ConnectionState>,
}

impl StateTracker {
    pub(crate) fn new() -> (Self, watch::Receiver<ConnectionState>) {
        let (tx, rx) = watch::channel(ConnectionState::Idle);
        (Self { tx }, rx)
    }

    pub(crate) fn get(&self) -> ConnectionState {
        self.tx.borrow().clone()
    }

    /// Publish a new state; returns the previous one
    pub(crate) fn set(&self, new_state: ConnectionState) -> ConnectionState {
        let previous = self.tx.send_replace(new_state.clone());
        if previous != new_state {
            tracing::debug!(from = %previous, to = %new_state, "State changed");
        }
        previous
    }
}

//! Wire types for the match event channel
//!
//! Two layers live here:
//!
//! - **Transport layer**: [`Frame`] (what travels over the socket),
//!   [`Payload`] (what callers hand to `send`) and [`CloseInfo`] (how a
//!   connection ended).
//! - **Envelope layer**: [`Envelope`] and [`EventKind`], the JSON unit the
//!   game server emits. The client forwards envelopes opaquely; these types
//!   exist for servers and consumers that want a typed view.
//!
//! # Envelope format
//!
//! ```json
//! {"type":"turn_start","matchId":"m_42","timestamp":"2024-05-01T12:00:00.000Z","payload":{}}
//! ```

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Close code for a normal, clean shutdown
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code sent by a server that is going away
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Close code for a connection that ended without a close handshake
pub const CLOSE_ABNORMAL: u16 = 1006;

/// A single message as carried by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame
    Binary(Vec<u8>),
}

impl Frame {
    /// Returns the text content, if this is a text frame
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(text) => Some(text),
            Frame::Binary(_) => None,
        }
    }

    /// Whether this is a text frame
    pub fn is_text(&self) -> bool {
        matches!(self, Frame::Text(_))
    }

    /// Size of the frame body in bytes
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }

    /// Whether the frame body is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An outbound value handed to the client
///
/// Strings and bytes are sent untouched; JSON values are encoded first.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Sent verbatim as a text frame
    Text(String),
    /// Sent verbatim as a binary frame
    Binary(Vec<u8>),
    /// Encoded to JSON text before sending
    Json(serde_json::Value),
}

impl Payload {
    /// The default keep-alive payload, `{"type":"ping"}`
    pub fn ping() -> Self {
        Payload::Json(serde_json::json!({ "type": EventKind::Ping.as_str() }))
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::ping()
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(bytes)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        // A bare JSON string is still "a string" and goes out unquoted
        match value {
            serde_json::Value::String(text) => Payload::Text(text),
            other => Payload::Json(other),
        }
    }
}

/// How a connection ended, as reported to `on_close`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code
    pub code: u16,
    /// Close reason supplied by the peer (may be empty)
    pub reason: String,
    /// Whether the close handshake completed
    pub was_clean: bool,
}

impl CloseInfo {
    /// Create close info from its parts
    pub fn new(code: u16, reason: impl Into<String>, was_clean: bool) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean,
        }
    }

    /// A clean close with code 1000
    pub fn normal() -> Self {
        Self::new(CLOSE_NORMAL, "", true)
    }

    /// A connection lost without a close handshake (code 1006)
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(CLOSE_ABNORMAL, reason, false)
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "code {} (clean: {})", self.code, self.was_clean)
        } else {
            write!(
                f,
                "code {} \"{}\" (clean: {})",
                self.code, self.reason, self.was_clean
            )
        }
    }
}

/// Event types emitted by the match server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Match begins, roster and mode are announced
    MatchStart,
    /// A player's turn starts
    TurnStart,
    /// A player's move has been applied
    MoveCommitted,
    /// A player is close to losing for inactivity
    AfkWarning,
    /// A player lost for inactivity
    TechnicalLoss,
    /// Client keep-alive
    Ping,
}

impl EventKind {
    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MatchStart => "match_start",
            EventKind::TurnStart => "turn_start",
            EventKind::MoveCommitted => "move_committed",
            EventKind::AfkWarning => "afk_warning",
            EventKind::TechnicalLoss => "technical_loss",
            EventKind::Ping => "ping",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "match_start" => Ok(EventKind::MatchStart),
            "turn_start" => Ok(EventKind::TurnStart),
            "move_committed" => Ok(EventKind::MoveCommitted),
            "afk_warning" => Ok(EventKind::AfkWarning),
            "technical_loss" => Ok(EventKind::TechnicalLoss),
            "ping" => Ok(EventKind::Ping),
            other => Err(format!("unknown event type: {}", other)),
        }
    }
}

/// Server-to-client event envelope
///
/// `kind` stays a plain string so envelopes with types this crate does not
/// know about still round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Event type, e.g. `turn_start`
    #[serde(rename = "type")]
    pub kind: String,
    /// Match the event belongs to
    pub match_id: String,
    /// ISO-8601 emission time
    pub timestamp: String,
    /// Event-specific body
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Create an envelope stamped with the current UTC time
    pub fn new(kind: EventKind, match_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            match_id: match_id.into(),
            timestamp: now_iso8601(),
            payload,
        }
    }

    /// The event type, if it is one of the known kinds
    pub fn known_kind(&self) -> Option<EventKind> {
        self.kind.parse().ok()
    }
}

/// Current UTC time in the `2024-05-01T12:00:00.000Z` form used on the wire
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

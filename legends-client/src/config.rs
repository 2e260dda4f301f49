//! Client configuration
//!
//! Two representations exist:
//!
//! - [`ClientOptions`]: the loose, serde-friendly form matching the options
//!   object pages pass in (`autoReconnect`, `reconnectDelayMs`, ...). Every
//!   field is optional.
//! - [`ClientConfig`]: the typed, fully-defaulted configuration the client
//!   actually runs with. It is fixed for the client's lifetime.
//!
//! ```rust
//! use legends_client::{ClientConfig, ClientOptions};
//! use std::time::Duration;
//!
//! let options = ClientOptions::from_json(r#"{"heartbeatIntervalMs": 0, "reconnectDelayMs": 500}"#).unwrap();
//! let config = ClientConfig::from(options);
//! assert_eq!(config.heartbeat_interval, None);
//! assert_eq!(config.initial_retry_delay, Duration::from_millis(500));
//! ```

use legends_core::{Error, Payload, Result};
use serde::Deserialize;
use std::time::Duration;

/// Default first reconnect delay in milliseconds
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
/// Default reconnect delay ceiling in milliseconds
pub const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 15000;
/// Default heartbeat period in milliseconds
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: i64 = 15000;
/// Default label attached to the client's log span
pub const DEFAULT_LOG_PREFIX: &str = "ws-client";

/// Options object as supplied by application code or a JSON document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientOptions {
    /// Reconnect after unplanned closes (default true)
    pub auto_reconnect: Option<bool>,
    /// First reconnect delay; 0 means default
    pub reconnect_delay_ms: Option<u64>,
    /// Reconnect delay ceiling; 0 means default
    pub max_reconnect_delay_ms: Option<u64>,
    /// Heartbeat period; 0 or negative disables the heartbeat
    pub heartbeat_interval_ms: Option<i64>,
    /// Heartbeat value; strings are sent verbatim, anything else as JSON
    pub heartbeat_payload: Option<serde_json::Value>,
    /// Decode text frames as JSON before delivery (default true)
    pub parse_json: Option<bool>,
    /// Label for log output
    pub log_prefix: Option<String>,
}

impl ClientOptions {
    /// Parse options from a JSON document
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

/// Typed client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Reconnect after unplanned closes
    pub auto_reconnect: bool,
    /// First reconnect delay, restored after every successful open
    pub initial_retry_delay: Duration,
    /// Ceiling for the exponential backoff
    pub max_retry_delay: Duration,
    /// Heartbeat period; `None` disables the heartbeat
    pub heartbeat_interval: Option<Duration>,
    /// Value sent on every heartbeat tick
    pub heartbeat_payload: Payload,
    /// Decode text frames as JSON before delivery
    pub parse_json: bool,
    /// How long a manual close waits for the transport's close event
    pub close_timeout: Duration,
    /// Label for log output
    pub log_prefix: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientOptions::default().into()
    }
}

impl From<ClientOptions> for ClientConfig {
    fn from(options: ClientOptions) -> Self {
        let non_zero = |value: Option<u64>, default: u64| match value {
            Some(0) | None => Duration::from_millis(default),
            Some(ms) => Duration::from_millis(ms),
        };

        let heartbeat_ms = options
            .heartbeat_interval_ms
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_MS);

        Self {
            auto_reconnect: options.auto_reconnect.unwrap_or(true),
            initial_retry_delay: non_zero(options.reconnect_delay_ms, DEFAULT_RECONNECT_DELAY_MS),
            max_retry_delay: non_zero(
                options.max_reconnect_delay_ms,
                DEFAULT_MAX_RECONNECT_DELAY_MS,
            ),
            heartbeat_interval: (heartbeat_ms > 0).then(|| Duration::from_millis(heartbeat_ms as u64)),
            heartbeat_payload: options
                .heartbeat_payload
                .map(Payload::from)
                .unwrap_or_default(),
            parse_json: options.parse_json.unwrap_or(true),
            close_timeout: Duration::from_secs(5),
            log_prefix: options
                .log_prefix
                .filter(|prefix| !prefix.is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_PREFIX.to_string()),
        }
    }
}

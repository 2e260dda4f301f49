//! Core types for the City Legends real-time event channel
//!
//! This crate holds everything the client and the mock match server share:
//!
//! - **Types**: transport frames, outbound payloads, close information and
//!   the server's event envelope
//! - **Codec**: inbound frame classification and outbound encoding
//! - **Error handling**: the workspace-wide error type
//! - **Observability**: `tracing` subscriber and OpenTelemetry bootstrap
//!
//! # Example
//!
//! ```rust
//! use legends_core::{codec, Envelope, EventKind};
//!
//! let envelope = Envelope::new(EventKind::MatchStart, "m_demo_1", serde_json::json!({"roomId": "1"}));
//! let frame = codec::encode_serializable(&envelope).unwrap();
//!
//! match codec::decode_frame(frame) {
//!     codec::Decoded::Json(value) => assert_eq!(value["type"], "match_start"),
//!     _ => unreachable!(),
//! }
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use error::{Error, Result};
pub use observability::{init_observability, shutdown_observability, LogFormat, ObservabilityConfig};
pub use types::{
    now_iso8601, CloseInfo, Envelope, EventKind, Frame, Payload, CLOSE_ABNORMAL, CLOSE_GOING_AWAY,
    CLOSE_NORMAL,
};

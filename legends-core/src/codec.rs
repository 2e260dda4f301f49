//! Frame codec for the event channel
//!
//! Inbound frames are classified into exactly one of three shapes before
//! delivery, see [`Decoded`]. Outbound payloads are turned into frames by
//! [`encode_payload`]; strings and bytes pass through untouched and JSON
//! values are serialized.
//!
//! # Examples
//!
//! ```rust
//! use legends_core::codec::{self, Decoded};
//! use legends_core::{Frame, Payload};
//!
//! match codec::decode_frame(Frame::Text(r#"{"type":"ping"}"#.into())) {
//!     Decoded::Json(value) => assert_eq!(value["type"], "ping"),
//!     other => panic!("unexpected {:?}", other),
//! }
//!
//! let frame = codec::encode_payload(&Payload::ping());
//! assert_eq!(frame, Frame::Text(r#"{"type":"ping"}"#.into()));
//! ```

use crate::error::{Error, Result};
use crate::types::{Frame, Payload};
use serde::Serialize;

/// Classification of an inbound frame
#[derive(Debug)]
pub enum Decoded {
    /// Text frame holding valid JSON
    Json(serde_json::Value),
    /// Text frame that is not valid JSON; dropped by the client
    Malformed {
        /// The original text
        raw: String,
        /// Why decoding failed
        error: Error,
    },
    /// Binary frame; never JSON-decoded
    Binary(Vec<u8>),
}

/// Classify an inbound frame
pub fn decode_frame(frame: Frame) -> Decoded {
    match frame {
        Frame::Text(text) => match serde_json::from_str(&text) {
            Ok(value) => Decoded::Json(value),
            Err(e) => Decoded::Malformed {
                raw: text,
                error: Error::Decode(e.to_string()),
            },
        },
        Frame::Binary(bytes) => Decoded::Binary(bytes),
    }
}

/// Turn an outbound payload into a frame
pub fn encode_payload(payload: &Payload) -> Frame {
    match payload {
        Payload::Text(text) => Frame::Text(text.clone()),
        Payload::Binary(bytes) => Frame::Binary(bytes.clone()),
        Payload::Json(value) => Frame::Text(value.to_string()),
    }
}

/// Serialize any value to a JSON text frame
///
/// # Errors
///
/// Returns `Error::Serialization` if the value cannot be represented as
/// JSON (for example a map with non-string keys).
pub fn encode_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Frame> {
    serde_json::to_string(value)
        .map(Frame::Text)
        .map_err(|e| Error::Serialization(e.to_string()))
}

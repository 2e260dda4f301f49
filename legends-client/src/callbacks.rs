//! Callback surface of the client
//!
//! Every lifecycle and message outcome reaches the application through a
//! [`ChannelHandler`]. All methods have no-op defaults, so a handler only
//! implements what it cares about and the client never checks whether a
//! callback "is configured".
//!
//! Handlers run on the client's event loop task, one call at a time and in
//! order: at most one `on_open`, then any number of `on_raw_message` /
//! `on_event` / `on_error`, then exactly one `on_close` per connection
//! attempt. A slow handler delays the loop, including heartbeats.
//!
//! # Examples
//!
//! Implementing the trait:
//!
//! ```rust
//! use legends_client::{ChannelHandler, InboundEvent};
//!
//! struct TurnTracker {
//!     turns: u32,
//! }
//!
//! impl ChannelHandler for TurnTracker {
//!     fn on_event(&mut self, event: InboundEvent) {
//!         if event.event_type() == Some("turn_start") {
//!             self.turns += 1;
//!         }
//!     }
//! }
//! ```
//!
//! Or with closures:
//!
//! ```rust
//! use legends_client::Callbacks;
//!
//! let callbacks = Callbacks::new()
//!     .on_open(|| println!("connected"))
//!     .on_event(|event| println!("event: {:?}", event.envelope()));
//! ```

use legends_core::{CloseInfo, Envelope, Error, Frame};

/// Receiver of client lifecycle and message callbacks
pub trait ChannelHandler: Send + 'static {
    /// The connection opened
    fn on_open(&mut self) {}

    /// A message was delivered (decoded JSON, or the untouched frame)
    fn on_event(&mut self, _event: InboundEvent) {}

    /// Every inbound frame, before any decoding
    fn on_raw_message(&mut self, _raw: &Frame) {}

    /// A transport or send failure occurred; the connection is not closed by this
    fn on_error(&mut self, _error: &Error) {}

    /// The connection closed
    fn on_close(&mut self, _info: &CloseInfo) {}
}

/// A message delivered to `on_event`
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A text frame decoded as JSON
    Json(serde_json::Value),
    /// A frame forwarded without decoding (binary, or JSON parsing disabled)
    Raw(Frame),
}

impl InboundEvent {
    /// The decoded JSON value, if any
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            InboundEvent::Json(value) => Some(value),
            InboundEvent::Raw(_) => None,
        }
    }

    /// The `type` field of a decoded JSON object
    pub fn event_type(&self) -> Option<&str> {
        self.as_json()?.get("type")?.as_str()
    }

    /// View the event as a match envelope
    ///
    /// The client does not validate envelopes; this returns `None` for
    /// anything that does not have the envelope shape.
    pub fn envelope(&self) -> Option<Envelope> {
        serde_json::from_value(self.as_json()?.clone()).ok()
    }
}

type OpenFn = Box<dyn FnMut() + Send>;
type EventFn = Box<dyn FnMut(InboundEvent) + Send>;
type RawFn = Box<dyn FnMut(&Frame) + Send>;
type ErrorFn = Box<dyn FnMut(&Error) + Send>;
type CloseFn = Box<dyn FnMut(&CloseInfo) + Send>;

/// Closure-based handler; unset callbacks do nothing
#[derive(Default)]
pub struct Callbacks {
    open: Option<OpenFn>,
    event: Option<EventFn>,
    raw: Option<RawFn>,
    error: Option<ErrorFn>,
    close: Option<CloseFn>,
}

impl Callbacks {
    /// Create an empty callback set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the open callback
    pub fn on_open(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.open = Some(Box::new(f));
        self
    }

    /// Set the event callback
    pub fn on_event(mut self, f: impl FnMut(InboundEvent) + Send + 'static) -> Self {
        self.event = Some(Box::new(f));
        self
    }

    /// Set the raw message callback
    pub fn on_raw_message(mut self, f: impl FnMut(&Frame) + Send + 'static) -> Self {
        self.raw = Some(Box::new(f));
        self
    }

    /// Set the error callback
    pub fn on_error(mut self, f: impl FnMut(&Error) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// Set the close callback
    pub fn on_close(mut self, f: impl FnMut(&CloseInfo) + Send + 'static) -> Self {
        self.close = Some(Box::new(f));
        self
    }
}

impl ChannelHandler for Callbacks {
    fn on_open(&mut self) {
        if let Some(f) = self.open.as_mut() {
            f();
        }
    }

    fn on_event(&mut self, event: InboundEvent) {
        if let Some(f) = self.event.as_mut() {
            f(event);
        }
    }

    fn on_raw_message(&mut self, raw: &Frame) {
        if let Some(f) = self.raw.as_mut() {
            f(raw);
        }
    }

    fn on_error(&mut self, error: &Error) {
        if let Some(f) = self.error.as_mut() {
            f(error);
        }
    }

    fn on_close(&mut self, info: &CloseInfo) {
        if let Some(f) = self.close.as_mut() {
            f(info);
        }
    }
}

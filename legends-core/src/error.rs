//! Error types for the City Legends event channel
//!
//! Only one failure is fatal to a caller: constructing a client without an
//! endpoint address. Everything else (transport failures, undecodable
//! frames, sends while disconnected) is recovered locally by the client and
//! surfaced through logging or the `on_error` callback, so these variants
//! mostly travel as values rather than as `Err` returns.
//!
//! # Examples
//!
//! ```rust
//! use legends_core::Error;
//!
//! let error = Error::WebSocket("connection refused".into());
//! assert_eq!(error.kind(), "websocket");
//! assert_eq!(error.to_string(), "WebSocket error: connection refused");
//! ```

use thiserror::Error;

/// Result type for event channel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for the event channel
///
/// # Error Categories
///
/// - **Construction errors**: MissingEndpoint, Runtime, InvalidConfig
/// - **Transport errors**: WebSocket, Io, ConnectionClosed
/// - **Payload errors**: Serialization, Decode
/// - **Usage errors**: NotOpen
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The client was constructed without a target address
    ///
    /// This is the only error that aborts construction; a client that could
    /// never connect is rejected up front.
    #[error("endpoint address is required")]
    MissingEndpoint,

    /// No Tokio runtime was available to host the client's event loop
    #[error("runtime unavailable: {0}")]
    Runtime(String),

    /// A configuration document could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// WebSocket transport layer error
    ///
    /// Covers failed handshakes, protocol violations and broken streams.
    /// Always followed by a close of the affected connection.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Low-level I/O error from the operating system
    #[error("IO error: {0}")]
    Io(String),

    /// An outbound value could not be encoded as JSON
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An inbound text frame was not valid JSON
    #[error("Decode error: {0}")]
    Decode(String),

    /// `send` was called while no connection was open
    #[error("connection is not open")]
    NotOpen,

    /// The connection was closed underneath an operation
    #[error("Connection closed")]
    ConnectionClosed,
}

impl Error {
    /// Short, stable label for this error, used as a metrics attribute
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingEndpoint => "missing_endpoint",
            Error::Runtime(_) => "runtime",
            Error::InvalidConfig(_) => "invalid_config",
            Error::WebSocket(_) => "websocket",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Decode(_) => "decode",
            Error::NotOpen => "not_open",
            Error::ConnectionClosed => "connection_closed",
        }
    }

    /// Whether this error must abort client construction
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::MissingEndpoint | Error::Runtime(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

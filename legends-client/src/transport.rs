//! Transport abstraction
//!
//! The client talks to the network only through two traits:
//!
//! - [`Connector`] establishes a new handle for a URL
//! - [`Transport`] is one live duplex handle
//!
//! The production implementation is [`WsConnector`], built on
//! tokio-tungstenite. Tests drive the client with in-memory transports.
//!
//! # Event semantics
//!
//! [`Transport::recv`] reports what a browser socket would report: frames,
//! errors, and finally exactly one [`TransportEvent::Closed`]. An error is
//! never the last event; it is always followed by a close (code 1006 when
//! the stream broke without a handshake).

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use legends_core::{CloseInfo, Error, Frame, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Close code reported when the peer sent a close frame without a status
const CLOSE_NO_STATUS: u16 = 1005;

/// Something observed on a live transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// An inbound message
    Frame(Frame),
    /// A transport failure; a `Closed` event follows
    Error(Error),
    /// The handle is finished; nothing else will be reported
    Closed(CloseInfo),
}

/// One live duplex connection
///
/// The client shares the handle between its read side and a single
/// in-flight write, so every method takes `&self`. At most one `send` or
/// `close` runs at a time.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send one frame
    ///
    /// May wait as long as the peer applies back-pressure.
    async fn send(&self, frame: Frame) -> Result<()>;

    /// Wait for the next event
    ///
    /// Must be cancel-safe: the client polls it inside `tokio::select!`.
    async fn recv(&self) -> TransportEvent;

    /// Start the close handshake; the matching `Closed` event arrives via `recv`
    async fn close(&self) -> Result<()>;
}

/// Factory for transports
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new handle to `url`
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>>;
}

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        tracing::debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WsTransport::new(ws_stream)))
    }
}

/// A tokio-tungstenite WebSocket connection
pub struct WsTransport {
    sink: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<Reader>,
    close_sent: AtomicBool,
}

struct Reader {
    stream: SplitStream<WsStream>,
    pending_close: Option<CloseInfo>,
}

impl WsTransport {
    fn new(ws_stream: WsStream) -> Self {
        let (sink, stream) = ws_stream.split();
        Self {
            sink: Mutex::new(sink),
            reader: Mutex::new(Reader {
                stream,
                pending_close: None,
            }),
            close_sent: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, frame: Frame) -> Result<()> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes),
        };
        self.sink
            .lock()
            .await
            .send(message)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    async fn recv(&self) -> TransportEvent {
        let mut reader = self.reader.lock().await;
        if let Some(info) = reader.pending_close.take() {
            return TransportEvent::Closed(info);
        }

        loop {
            match reader.stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Frame(Frame::Text(text)),
                Some(Ok(Message::Binary(bytes))) => {
                    return TransportEvent::Frame(Frame::Binary(bytes))
                }
                Some(Ok(Message::Close(frame))) => {
                    let info = match frame {
                        Some(frame) => CloseInfo::new(u16::from(frame.code), frame.reason, true),
                        None => CloseInfo::new(CLOSE_NO_STATUS, "", true),
                    };
                    return TransportEvent::Closed(info);
                }
                // Ping/pong are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    reader.pending_close = Some(CloseInfo::abnormal(e.to_string()));
                    return TransportEvent::Error(Error::WebSocket(e.to_string()));
                }
                // The stream also ends right after our own close handshake completes
                None if self.close_sent.load(Ordering::SeqCst) => {
                    return TransportEvent::Closed(CloseInfo::normal())
                }
                None => return TransportEvent::Closed(CloseInfo::abnormal("connection lost")),
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.close_sent.store(true, Ordering::SeqCst);
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        self.sink
            .lock()
            .await
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused_is_websocket_error() {
        // Bind then drop a listener to get a port nothing is serving on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WsConnector.connect(&format!("ws://{}", addr)).await;
        assert!(matches!(result, Err(Error::WebSocket(_))));
    }

    #[tokio::test]
    async fn test_connect_bad_url_is_websocket_error() {
        let result = WsConnector.connect("not a url").await;
        assert!(matches!(result, Err(Error::WebSocket(_))));
    }
}

//! Per-connection task of the mock match server
//!
//! # Connection Lifecycle
//!
//! 1. **Upgrade**: WebSocket handshake; the request target names the match
//!    and the player
//! 2. **Play**: push the script's envelopes at their offsets while logging
//!    whatever the client sends
//! 3. **End**: the client closes, the stream breaks, or the server asks
//!    every connection to go away; pending pushes are dropped with the task

use crate::script::MatchContext;
use crate::{ClientMessage, MessageBody, Shared};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use legends_core::{Error, Result, CLOSE_GOING_AWAY};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

/// How long a server-initiated close waits for the client's reply
const CLOSE_GRACE: Duration = Duration::from_secs(1);

pub(crate) async fn handle_connection(
    stream: TcpStream,
    conn_id: u64,
    shared: Arc<Shared>,
) -> Result<()> {
    // Subscribe before the handshake so a disconnect request is never missed
    let mut disconnect = shared.disconnect.subscribe();

    let mut target = String::from("/");
    let ws_stream = accept_hdr_async(
        stream,
        |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
            target = request.uri().to_string();
            Ok(response)
        },
    )
    .await
    .map_err(|e| Error::WebSocket(e.to_string()))?;

    let ctx = MatchContext::from_request_target(&target);
    tracing::info!(
        conn_id,
        match_id = %ctx.match_id,
        player_id = %ctx.player_id,
        "Client connected"
    );
    shared.connection_opened();

    let result = play(ws_stream, &ctx, &shared, &mut disconnect).await;

    shared.connection_closed();
    tracing::info!(conn_id, match_id = %ctx.match_id, "Client disconnected");
    result
}

async fn play(
    ws_stream: WebSocketStream<TcpStream>,
    ctx: &MatchContext,
    shared: &Shared,
    disconnect: &mut broadcast::Receiver<u16>,
) -> Result<()> {
    let (mut sink, mut stream) = ws_stream.split();
    let started = Instant::now();
    let steps = shared.script.steps();
    let mut next = 0;

    loop {
        let due = steps.get(next).map(|step| started + step.at);

        tokio::select! {
            _ = sleep_until(due) => {
                let Some(step) = steps.get(next) else { continue };
                next += 1;

                let envelope = step.envelope(ctx);
                let text = serde_json::to_string(&envelope)
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                tracing::debug!(kind = %envelope.kind, match_id = %ctx.match_id, "Pushing scripted event");
                sink.send(Message::Text(text))
                    .await
                    .map_err(|e| Error::WebSocket(e.to_string()))?;
            }
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => shared.record(ctx, MessageBody::from_text(text)),
                Some(Ok(Message::Binary(bytes))) => shared.record(ctx, MessageBody::Binary(bytes)),
                Some(Ok(Message::Close(_))) => {
                    // Reading on flushes our close reply and completes the handshake
                    let _ = tokio::time::timeout(CLOSE_GRACE, drain(&mut stream)).await;
                    return Ok(());
                }
                None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(Error::WebSocket(e.to_string())),
            },
            code = disconnect.recv() => {
                let code = code.unwrap_or(CLOSE_GOING_AWAY);
                tracing::info!(code, match_id = %ctx.match_id, "Disconnecting client");

                let frame = CloseFrame {
                    code: CloseCode::from(code),
                    reason: "server restart".into(),
                };
                sink.send(Message::Close(Some(frame)))
                    .await
                    .map_err(|e| Error::WebSocket(e.to_string()))?;

                // Let the client answer the close before the socket goes away
                let _ = tokio::time::timeout(CLOSE_GRACE, drain(&mut stream)).await;
                return Ok(());
            }
        }
    }
}

async fn drain(stream: &mut SplitStream<WebSocketStream<TcpStream>>) {
    while let Some(Ok(_)) = stream.next().await {}
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl MessageBody {
    fn from_text(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => MessageBody::Json(value),
            Err(_) => MessageBody::Text(text),
        }
    }
}

impl Shared {
    fn record(&self, ctx: &MatchContext, body: MessageBody) {
        match &body {
            MessageBody::Json(value) => {
                tracing::info!(match_id = %ctx.match_id, body = %value, "Client message")
            }
            MessageBody::Text(text) => {
                tracing::info!(match_id = %ctx.match_id, raw = %text, "Client message (raw)")
            }
            MessageBody::Binary(bytes) => {
                tracing::info!(match_id = %ctx.match_id, len = bytes.len(), "Client message (binary)")
            }
        }

        if let Ok(mut received) = self.received.lock() {
            received.push(ClientMessage {
                match_id: ctx.match_id.clone(),
                player_id: ctx.player_id.clone(),
                body,
            });
        }
        self.changed.notify_waiters();
    }
}

//! Real-time event channel client
//!
//! This module provides [`RealtimeClient`], which keeps one persistent
//! connection to a match server alive: it reconnects with exponential
//! backoff after unplanned closes, sends a heartbeat while the connection is
//! open, and hands every inbound message to a [`ChannelHandler`].
//!
//! # Client Lifecycle
//!
//! 1. **Create**: `RealtimeClient::new` / `ClientBuilder::build` validate the
//!    address and start the client's event loop (nothing is dialled yet)
//! 2. **Connect**: `connect()` starts the first handshake
//! 3. **Use**: `send()` while open; callbacks fire as things happen
//! 4. **Reconnect**: automatic after unplanned closes
//! 5. **Close**: `close()` ends the instance for good
//!
//! # Concurrency
//!
//! All state (the transport handle, the heartbeat interval, the reconnect
//! timer) is owned by a single task. `connect`, `send` and `close` only
//! enqueue a command and return immediately; outcomes arrive through the
//! handler, in order, from that task. Outbound frames are written one at a
//! time alongside everything else the task waits on, so a peer that stops
//! reading holds back later writes only; commands, inbound frames and the
//! close deadline keep being served. The handle is cheap to clone and
//! every clone drives the same connection. Dropping the last clone closes
//! the connection as if `close()` had been called.

use crate::callbacks::{ChannelHandler, InboundEvent};
use crate::config::ClientConfig;
use crate::connection_state::{ConnectionState, StateTracker};
use crate::reconnect::{ExponentialBackoff, NoReconnect, ReconnectionStrategy};
use crate::transport::{Connector, Transport, TransportEvent, WsConnector};
use crate::{ClientBuilder, ClientMetrics};
use futures::future::BoxFuture;
use legends_core::codec::{self, Decoded};
use legends_core::{CloseInfo, Error, Frame, Payload, Result};
use serde::Serialize;
use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tracing::Instrument;

/// Requests from client handles to the event loop
enum Command {
    Connect,
    Send(Frame),
    Close,
}

/// Everything needed to start a client
pub(crate) struct ClientParts {
    pub(crate) url: String,
    pub(crate) config: ClientConfig,
    pub(crate) handler: Box<dyn ChannelHandler>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) strategy: Option<Box<dyn ReconnectionStrategy>>,
    pub(crate) metrics: Option<Arc<ClientMetrics>>,
}

/// Handle to a reconnecting event channel
#[derive(Clone)]
pub struct RealtimeClient {
    url: Arc<str>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl RealtimeClient {
    /// Create a client for `url` using the WebSocket transport
    ///
    /// Must be called from within a Tokio runtime. The client starts idle;
    /// call [`connect`](Self::connect) to dial.
    ///
    /// # Errors
    ///
    /// - `Error::MissingEndpoint` if `url` is empty
    /// - `Error::Runtime` if there is no current Tokio runtime
    pub fn new(
        url: impl Into<String>,
        config: ClientConfig,
        handler: impl ChannelHandler,
    ) -> Result<Self> {
        Self::with_connector(url, config, handler, Arc::new(WsConnector))
    }

    /// Create a client that dials through a custom [`Connector`]
    pub fn with_connector(
        url: impl Into<String>,
        config: ClientConfig,
        handler: impl ChannelHandler,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        Self::start(ClientParts {
            url: url.into(),
            config,
            handler: Box::new(handler),
            connector,
            strategy: None,
            metrics: None,
        })
    }

    /// Start configuring a client
    pub fn builder(url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    pub(crate) fn start(parts: ClientParts) -> Result<Self> {
        let url = parts.url.trim().to_string();
        if url.is_empty() {
            return Err(Error::MissingEndpoint);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(e.to_string()))?;

        let strategy: Box<dyn ReconnectionStrategy> = match (parts.config.auto_reconnect, parts.strategy) {
            (false, _) => Box::new(NoReconnect),
            (true, Some(strategy)) => strategy,
            (true, None) => Box::new(ExponentialBackoff::new(
                parts.config.initial_retry_delay,
                parts.config.max_retry_delay,
            )),
        };

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state, state_rx) = StateTracker::new();
        let span = tracing::info_span!("realtime_client", client = %parts.config.log_prefix, url = %url);

        let event_loop = EventLoop {
            url: url.clone(),
            config: parts.config,
            handler: parts.handler,
            connector: parts.connector,
            strategy,
            metrics: parts.metrics,
            state,
            commands: commands_rx,
            commands_open: true,
            connecting: None,
            transport: None,
            outbound: VecDeque::new(),
            writing: None,
            heartbeat: None,
            reconnect_timer: None,
            close_deadline: None,
            manual_close: false,
        };
        runtime.spawn(event_loop.run().instrument(span));

        Ok(Self {
            url: url.into(),
            commands: commands_tx,
            state: state_rx,
        })
    }

    /// Open the connection
    ///
    /// No-op while a connection is open or a handshake is in flight. A
    /// pending reconnect timer is cancelled and replaced by an immediate
    /// attempt. Ignored after [`close`](Self::close).
    pub fn connect(&self) {
        self.dispatch(Command::Connect);
    }

    /// Send a payload over the open connection
    ///
    /// Strings and bytes are sent verbatim, JSON values are encoded. When
    /// no connection is open the payload is dropped and a warning logged;
    /// delivery is never guaranteed.
    pub fn send(&self, payload: impl Into<Payload>) {
        let frame = codec::encode_payload(&payload.into());
        self.dispatch(Command::Send(frame));
    }

    /// Serialize a value to JSON and send it
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if the value has no JSON form; nothing
    /// is sent in that case.
    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        match codec::encode_serializable(value) {
            Ok(frame) => {
                self.dispatch(Command::Send(frame));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode outbound payload");
                Err(e)
            }
        }
    }

    /// Close the connection and stop reconnecting, permanently
    ///
    /// Idempotent. A handshake in flight is abandoned without callbacks; an
    /// open connection is shut down and its `on_close` still fires.
    pub fn close(&self) {
        self.dispatch(Command::Close);
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Watch connection state changes
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Whether the connection is currently open
    pub fn is_open(&self) -> bool {
        matches!(*self.state.borrow(), ConnectionState::Open)
    }

    /// The endpoint this client dials
    pub fn url(&self) -> &str {
        &self.url
    }

    fn dispatch(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!(url = %self.url, "Client already shut down, command ignored");
        }
    }
}

/// Why the event loop woke up
enum Wake {
    Command(Option<Command>),
    Connected(Result<Box<dyn Transport>>),
    Transport(TransportEvent),
    Written(WriteKind, Result<()>),
    Heartbeat,
    ReconnectDue,
    CloseTimeout,
}

/// Outbound work, performed one item at a time
enum Write {
    Frame(Frame),
    Heartbeat(Frame),
    Close,
}

#[derive(Debug, Clone, Copy)]
enum WriteKind {
    Frame,
    Heartbeat,
    Close,
}

impl Write {
    fn kind(&self) -> WriteKind {
        match self {
            Write::Frame(_) => WriteKind::Frame,
            Write::Heartbeat(_) => WriteKind::Heartbeat,
            Write::Close => WriteKind::Close,
        }
    }
}

type WriteFuture = BoxFuture<'static, (WriteKind, Result<()>)>;

/// Single owner of the connection and its timers
struct EventLoop {
    url: String,
    config: ClientConfig,
    handler: Box<dyn ChannelHandler>,
    connector: Arc<dyn Connector>,
    strategy: Box<dyn ReconnectionStrategy>,
    metrics: Option<Arc<ClientMetrics>>,
    state: StateTracker,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_open: bool,
    connecting: Option<BoxFuture<'static, Result<Box<dyn Transport>>>>,
    transport: Option<Arc<dyn Transport>>,
    outbound: VecDeque<Write>,
    writing: Option<WriteFuture>,
    heartbeat: Option<Interval>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    close_deadline: Option<Pin<Box<Sleep>>>,
    manual_close: bool,
}

impl EventLoop {
    async fn run(mut self) {
        tracing::debug!("Event loop started");

        while !self.state.get().is_terminal() {
            let wake = tokio::select! {
                command = next_command(&mut self.commands, self.commands_open) => Wake::Command(command),
                result = finish_connect(&mut self.connecting) => Wake::Connected(result),
                event = next_transport_event(&self.transport) => Wake::Transport(event),
                (kind, result) = finish_write(&mut self.writing) => Wake::Written(kind, result),
                _ = next_tick(&mut self.heartbeat) => Wake::Heartbeat,
                _ = fire(&mut self.reconnect_timer) => Wake::ReconnectDue,
                _ = fire(&mut self.close_deadline) => Wake::CloseTimeout,
            };

            match wake {
                Wake::Command(Some(Command::Connect)) => self.connect(),
                Wake::Command(Some(Command::Send(frame))) => self.send(frame),
                Wake::Command(Some(Command::Close)) => self.close(),
                Wake::Command(None) => {
                    tracing::debug!("All client handles dropped, closing");
                    self.commands_open = false;
                    self.close();
                }
                Wake::Connected(result) => self.on_connect_result(result),
                Wake::Transport(event) => self.on_transport_event(event),
                Wake::Written(kind, result) => self.on_written(kind, result),
                Wake::Heartbeat => self.send_heartbeat(),
                Wake::ReconnectDue => {
                    self.reconnect_timer = None;
                    self.connect();
                }
                Wake::CloseTimeout => {
                    self.close_deadline = None;
                    tracing::warn!(
                        timeout_ms = self.config.close_timeout.as_millis() as u64,
                        "Close handshake timed out"
                    );
                    self.on_closed(CloseInfo::abnormal("close handshake timed out"));
                }
            }
        }

        tracing::debug!("Event loop stopped");
    }

    fn connect(&mut self) {
        if self.manual_close {
            tracing::warn!("connect() called on a closed client; create a new client instead");
            return;
        }
        if self.transport.is_some() || self.connecting.is_some() {
            tracing::debug!("connect() called but connection already open or connecting");
            return;
        }

        // A manual connect supersedes a scheduled retry
        self.reconnect_timer = None;

        tracing::info!("Connecting");
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        self.connecting = Some(Box::pin(async move { connector.connect(&url).await }));
        self.set_state(ConnectionState::Connecting);

        if let Some(ref m) = self.metrics {
            m.record_connect_attempt();
        }
    }

    fn on_connect_result(&mut self, result: Result<Box<dyn Transport>>) {
        self.connecting = None;

        match result {
            Ok(transport) => {
                self.transport = Some(Arc::from(transport));
                self.strategy.reset();
                self.start_heartbeat();
                self.set_state(ConnectionState::Open);
                tracing::info!("Connection open");

                if let Some(ref m) = self.metrics {
                    m.record_open();
                }
                self.handler.on_open();
            }
            Err(error) => {
                // Reported the way a failed browser handshake is: error, then close
                tracing::warn!(error = %error, "Connection attempt failed");
                self.report_error(&error);
                self.handler.on_close(&CloseInfo::abnormal(error.to_string()));
                self.after_close();
            }
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(frame) => self.deliver(frame),
            TransportEvent::Error(error) => {
                tracing::error!(error = %error, "Transport error");
                self.report_error(&error);
            }
            TransportEvent::Closed(info) => self.on_closed(info),
        }
    }

    fn on_closed(&mut self, info: CloseInfo) {
        self.stop_heartbeat();
        self.transport = None;
        self.writing = None;
        self.close_deadline = None;
        if !self.outbound.is_empty() {
            tracing::debug!(dropped = self.outbound.len(), "Unsent frames dropped with the connection");
            self.outbound.clear();
        }

        tracing::info!(
            code = info.code,
            reason = %info.reason,
            was_clean = info.was_clean,
            "Connection closed"
        );
        self.handler.on_close(&info);
        self.after_close();
    }

    fn after_close(&mut self) {
        if self.manual_close {
            self.set_state(ConnectionState::ManuallyClosed);
        } else {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        self.reconnect_timer = None;

        match self.strategy.next_delay() {
            Some(delay) => {
                let attempt = self.strategy.attempts();
                tracing::info!(delay_ms = delay.as_millis() as u64, attempt, "Scheduling reconnect");

                self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));
                self.set_state(ConnectionState::ReconnectScheduled { attempt, delay });

                if let Some(ref m) = self.metrics {
                    m.record_reconnect_scheduled(delay);
                }
            }
            None => {
                if self.config.auto_reconnect {
                    tracing::warn!(
                        attempts = self.strategy.attempts(),
                        "Reconnection abandoned (max attempts reached)"
                    );
                } else {
                    tracing::debug!("Auto-reconnect disabled, staying idle");
                }
                self.set_state(ConnectionState::Idle);
            }
        }
    }

    fn deliver(&mut self, frame: Frame) {
        if self.manual_close {
            tracing::debug!("Frame received while closing, dropped");
            return;
        }

        if let Some(ref m) = self.metrics {
            m.record_frame_received(frame.is_text());
        }
        self.handler.on_raw_message(&frame);

        if !self.config.parse_json {
            self.emit(InboundEvent::Raw(frame));
            return;
        }

        match codec::decode_frame(frame) {
            Decoded::Json(value) => self.emit(InboundEvent::Json(value)),
            Decoded::Binary(bytes) => self.emit(InboundEvent::Raw(Frame::Binary(bytes))),
            Decoded::Malformed { raw, error } => {
                tracing::warn!(error = %error, len = raw.len(), "Failed to parse message as JSON, dropped");
                if let Some(ref m) = self.metrics {
                    m.record_decode_failure();
                }
            }
        }
    }

    fn emit(&mut self, event: InboundEvent) {
        if let Some(ref m) = self.metrics {
            m.record_event_delivered();
        }
        self.handler.on_event(event);
    }

    fn send(&mut self, frame: Frame) {
        if self.transport.is_none() || self.manual_close {
            tracing::warn!(state = %self.state.get(), "send() called while connection not open, payload dropped");
            if let Some(ref m) = self.metrics {
                m.record_error(Error::NotOpen.kind());
            }
            return;
        }

        self.queue_write(Write::Frame(frame));
    }

    /// Queue outbound work; it runs after everything queued before it
    fn queue_write(&mut self, write: Write) {
        self.outbound.push_back(write);
        self.start_next_write();
    }

    fn start_next_write(&mut self) {
        if self.writing.is_some() {
            return;
        }
        let Some(transport) = self.transport.clone() else {
            return;
        };
        let Some(write) = self.outbound.pop_front() else {
            return;
        };

        let kind = write.kind();
        self.writing = Some(Box::pin(async move {
            let result = match write {
                Write::Frame(frame) | Write::Heartbeat(frame) => transport.send(frame).await,
                Write::Close => transport.close().await,
            };
            (kind, result)
        }));
    }

    fn on_written(&mut self, kind: WriteKind, result: Result<()>) {
        self.writing = None;

        match (kind, result) {
            (WriteKind::Frame, Ok(())) => {
                if let Some(ref m) = self.metrics {
                    m.record_frame_sent();
                }
            }
            (WriteKind::Frame, Err(error)) => {
                tracing::error!(error = %error, "Failed to send frame");
                self.report_error(&error);
            }
            (WriteKind::Heartbeat, Ok(())) => {
                tracing::trace!("Heartbeat sent");
                if let Some(ref m) = self.metrics {
                    m.record_heartbeat();
                }
            }
            (WriteKind::Heartbeat, Err(error)) => {
                // The transport's own close event is what stops the heartbeat
                tracing::warn!(error = %error, "Failed to send heartbeat");
                self.report_error(&error);
            }
            (WriteKind::Close, Ok(())) => tracing::debug!("Close frame sent"),
            (WriteKind::Close, Err(error)) => {
                tracing::warn!(error = %error, "Error while closing connection");
            }
        }

        self.start_next_write();
    }

    fn start_heartbeat(&mut self) {
        self.stop_heartbeat();

        if let Some(period) = self.config.heartbeat_interval {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.heartbeat = Some(interval);
        }
    }

    fn stop_heartbeat(&mut self) {
        self.heartbeat = None;
    }

    fn send_heartbeat(&mut self) {
        if self.transport.is_none() {
            self.stop_heartbeat();
            return;
        }
        if self.writing.is_some() {
            // A heartbeat behind a stalled write would only pile up
            tracing::debug!(queued = self.outbound.len(), "Previous write still pending, heartbeat skipped");
            return;
        }

        let frame = codec::encode_payload(&self.config.heartbeat_payload);
        self.queue_write(Write::Heartbeat(frame));
    }

    fn close(&mut self) {
        if self.manual_close {
            tracing::debug!("close() already requested");
            return;
        }

        self.manual_close = true;
        self.reconnect_timer = None;
        self.stop_heartbeat();

        if self.connecting.take().is_some() {
            tracing::debug!("Abandoning connection attempt in flight");
        }

        if self.transport.is_none() {
            tracing::info!("Client closed");
            self.set_state(ConnectionState::ManuallyClosed);
            return;
        }

        // The deadline also covers writes still queued ahead of the close frame
        tracing::info!(queued = self.outbound.len(), "Closing connection");
        self.set_state(ConnectionState::Closing);
        self.close_deadline = Some(Box::pin(tokio::time::sleep(self.config.close_timeout)));
        self.queue_write(Write::Close);
    }

    fn report_error(&mut self, error: &Error) {
        if let Some(ref m) = self.metrics {
            m.record_error(error.kind());
        }
        self.handler.on_error(error);
    }

    fn set_state(&self, new_state: ConnectionState) {
        if let Some(ref m) = self.metrics {
            m.update_connection_state(&new_state);
        }
        self.state.set(new_state);
    }
}

async fn next_command(
    commands: &mut mpsc::UnboundedReceiver<Command>,
    open: bool,
) -> Option<Command> {
    if open {
        commands.recv().await
    } else {
        pending().await
    }
}

async fn finish_connect(
    connecting: &mut Option<BoxFuture<'static, Result<Box<dyn Transport>>>>,
) -> Result<Box<dyn Transport>> {
    match connecting {
        Some(attempt) => attempt.await,
        None => pending().await,
    }
}

async fn next_transport_event(transport: &Option<Arc<dyn Transport>>) -> TransportEvent {
    match transport {
        Some(transport) => transport.recv().await,
        None => pending().await,
    }
}

async fn finish_write(writing: &mut Option<WriteFuture>) -> (WriteKind, Result<()>) {
    match writing {
        Some(write) => write.await,
        None => pending().await,
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn fire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

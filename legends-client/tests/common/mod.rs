//! Common test utilities for legends-client integration tests
//!
//! [`MockConnector`] stands in for the network: each connection attempt
//! follows a script (refuse, accept, hang) and every accepted connection is
//! handed to the test as a [`MockPeer`] that can push frames, break the
//! stream or close it. [`Recorder`] captures handler callbacks in order.
//!
//! Everything here is driven by Tokio's clock, so tests can run with
//! `start_paused = true` and assert exact virtual-time delays.

#![allow(dead_code)]

use async_trait::async_trait;
use legends_client::{
    ChannelHandler, CloseInfo, Connector, Error, Frame, InboundEvent, Result, Transport,
    TransportEvent,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// How a single connection attempt behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Fail the handshake
    Refuse,
    /// Complete the handshake; `close()` is acknowledged at once
    Accept,
    /// Complete the handshake; `close()` is never acknowledged
    Unresponsive,
    /// Never complete the handshake
    Hang,
    /// Complete the handshake; every send blocks forever, as with a peer
    /// that stopped reading
    StallSends,
}

/// Scripted connector
pub struct MockConnector {
    script: Mutex<VecDeque<Attempt>>,
    fallback: Attempt,
    attempts: Mutex<Vec<Instant>>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

impl MockConnector {
    /// Attempts follow `script`, then `fallback` forever
    pub fn new(
        script: impl IntoIterator<Item = Attempt>,
        fallback: Attempt,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            attempts: Mutex::new(Vec::new()),
            peers,
        });
        (connector, peers_rx)
    }

    /// Every attempt accepted
    pub fn accepting() -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeer>) {
        Self::new([], Attempt::Accept)
    }

    /// When each attempt started
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    /// Gaps between consecutive attempts
    pub fn attempt_gaps(&self) -> Vec<Duration> {
        self.attempt_times()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn Transport>> {
        self.attempts.lock().unwrap().push(Instant::now());
        let attempt = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        match attempt {
            Attempt::Refuse => Err(Error::WebSocket("connection refused".into())),
            Attempt::Hang => std::future::pending().await,
            Attempt::Accept | Attempt::Unresponsive | Attempt::StallSends => {
                let (transport, peer) = MockTransport::pair(
                    attempt != Attempt::Unresponsive,
                    attempt == Attempt::StallSends,
                );
                let _ = self.peers.send(peer);
                Ok(Box::new(transport))
            }
        }
    }
}

struct MockTransport {
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
    loopback: mpsc::UnboundedSender<TransportEvent>,
    sent: Arc<Mutex<Vec<(Instant, Frame)>>>,
    fail_sends: Arc<AtomicBool>,
    close_requested: Arc<AtomicBool>,
    acknowledge_close: bool,
    stall_sends: bool,
}

impl MockTransport {
    fn pair(acknowledge_close: bool, stall_sends: bool) -> (Self, MockPeer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let fail_sends = Arc::new(AtomicBool::new(false));
        let close_requested = Arc::new(AtomicBool::new(false));

        let transport = Self {
            events: tokio::sync::Mutex::new(rx),
            loopback: tx.clone(),
            sent: sent.clone(),
            fail_sends: fail_sends.clone(),
            close_requested: close_requested.clone(),
            acknowledge_close,
            stall_sends,
        };
        let peer = MockPeer {
            events: tx,
            sent,
            fail_sends,
            close_requested,
        };
        (transport, peer)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, frame: Frame) -> Result<()> {
        if self.stall_sends {
            return std::future::pending().await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::WebSocket("broken pipe".into()));
        }
        self.sent.lock().unwrap().push((Instant::now(), frame));
        Ok(())
    }

    async fn recv(&self) -> TransportEvent {
        match self.events.lock().await.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn close(&self) -> Result<()> {
        self.close_requested.store(true, Ordering::SeqCst);
        if self.acknowledge_close {
            let _ = self.loopback.send(TransportEvent::Closed(CloseInfo::normal()));
        }
        Ok(())
    }
}

/// Server side of an accepted mock connection
pub struct MockPeer {
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: Arc<Mutex<Vec<(Instant, Frame)>>>,
    fail_sends: Arc<AtomicBool>,
    close_requested: Arc<AtomicBool>,
}

impl MockPeer {
    pub fn push_text(&self, text: &str) {
        let _ = self
            .events
            .send(TransportEvent::Frame(Frame::Text(text.to_string())));
    }

    pub fn push_binary(&self, bytes: &[u8]) {
        let _ = self
            .events
            .send(TransportEvent::Frame(Frame::Binary(bytes.to_vec())));
    }

    /// Close from the server side
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self
            .events
            .send(TransportEvent::Closed(CloseInfo::new(code, reason, true)));
    }

    /// Break the stream: an error followed by an abnormal close
    pub fn fail(&self, message: &str) {
        let _ = self
            .events
            .send(TransportEvent::Error(Error::WebSocket(message.to_string())));
        let _ = self
            .events
            .send(TransportEvent::Closed(CloseInfo::abnormal(message)));
    }

    /// Make every further client send fail
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Frames the client sent on this connection
    pub fn sent(&self) -> Vec<Frame> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    /// When each frame was sent
    pub fn sent_times(&self) -> Vec<Instant> {
        self.sent.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::SeqCst)
    }
}

/// A callback observed by [`Recorder`]
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Open,
    Event(InboundEvent),
    Raw(Frame),
    Error(String),
    Close(CloseInfo),
}

/// Handler that forwards every callback to the test
pub struct Recorder {
    tx: mpsc::UnboundedSender<Seen>,
}

impl Recorder {
    pub fn new() -> (Self, Observed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, Observed { rx })
    }
}

impl ChannelHandler for Recorder {
    fn on_open(&mut self) {
        let _ = self.tx.send(Seen::Open);
    }

    fn on_event(&mut self, event: InboundEvent) {
        let _ = self.tx.send(Seen::Event(event));
    }

    fn on_raw_message(&mut self, raw: &Frame) {
        let _ = self.tx.send(Seen::Raw(raw.clone()));
    }

    fn on_error(&mut self, error: &Error) {
        let _ = self.tx.send(Seen::Error(error.kind().to_string()));
    }

    fn on_close(&mut self, info: &CloseInfo) {
        let _ = self.tx.send(Seen::Close(info.clone()));
    }
}

/// Test side of a [`Recorder`]
pub struct Observed {
    rx: mpsc::UnboundedReceiver<Seen>,
}

impl Observed {
    /// Next callback, waiting up to a minute of (possibly virtual) time
    pub async fn next(&mut self) -> Seen {
        tokio::time::timeout(Duration::from_secs(60), self.rx.recv())
            .await
            .expect("timed out waiting for a callback")
            .expect("client dropped its handler")
    }

    /// Skip callbacks until one matches
    pub async fn until(&mut self, mut predicate: impl FnMut(&Seen) -> bool) -> Seen {
        loop {
            let seen = self.next().await;
            if predicate(&seen) {
                return seen;
            }
        }
    }

    /// Callbacks delivered so far, without waiting
    pub fn drain(&mut self) -> Vec<Seen> {
        let mut seen = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            seen.push(item);
        }
        seen
    }
}

/// Wait for the next accepted connection
pub async fn next_peer(peers: &mut mpsc::UnboundedReceiver<MockPeer>) -> MockPeer {
    tokio::time::timeout(Duration::from_secs(60), peers.recv())
        .await
        .expect("timed out waiting for a connection")
        .expect("connector dropped")
}

/// Let the client's event loop run without moving the clock much
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

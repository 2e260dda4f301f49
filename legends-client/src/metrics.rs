//! Client metrics
//!
//! OpenTelemetry instruments describing the health of an event channel.
//! Recording is a no-op until a meter provider is installed (see
//! `legends_core::init_observability`).
//!
//! # Metrics Collected
//!
//! - **connection.state**: current [`ConnectionState`](crate::ConnectionState) (gauge)
//! - **connect.attempts** / **opens**: handshakes started and completed
//! - **reconnect.delay**: delay of every armed reconnect timer (histogram)
//! - **frames.received** / **events.delivered** / **decode.failures**
//! - **frames.sent** / **heartbeats.sent**
//! - **errors.total**: by error kind

use crate::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    InstrumentationScope, KeyValue,
};
use std::time::Duration;

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state (see `ConnectionState::as_gauge`)
    pub connection_state: Gauge<i64>,
    /// Handshakes started
    pub connect_attempts: Counter<u64>,
    /// Handshakes completed
    pub opens: Counter<u64>,
    /// Reconnect delays handed out, in seconds
    pub reconnect_delay: Histogram<f64>,
    /// Inbound frames, by frame type
    pub frames_received: Counter<u64>,
    /// Values passed to `on_event`
    pub events_delivered: Counter<u64>,
    /// Text frames dropped because they were not JSON
    pub decode_failures: Counter<u64>,
    /// Outbound frames
    pub frames_sent: Counter<u64>,
    /// Heartbeats sent
    pub heartbeats_sent: Counter<u64>,
    /// Errors, by kind
    pub errors_total: Counter<u64>,
}

impl ClientMetrics {
    /// Create metrics on the global meter provider
    pub fn new(service_name: impl Into<String>) -> Self {
        let scope = InstrumentationScope::builder(service_name.into()).build();
        Self::new_with_meter(&global::meter_with_scope(scope))
    }

    /// Create metrics on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("legends.client.connection.state")
                .with_description("Connection state (0=idle, 1=connecting, 2=open, 3=closing, 4=reconnect scheduled, 5=closed)")
                .build(),
            connect_attempts: meter
                .u64_counter("legends.client.connect.attempts")
                .with_description("Connection handshakes started")
                .build(),
            opens: meter
                .u64_counter("legends.client.opens")
                .with_description("Connection handshakes completed")
                .build(),
            reconnect_delay: meter
                .f64_histogram("legends.client.reconnect.delay")
                .with_description("Reconnect delay in seconds")
                .build(),
            frames_received: meter
                .u64_counter("legends.client.frames.received")
                .with_description("Inbound frames")
                .build(),
            events_delivered: meter
                .u64_counter("legends.client.events.delivered")
                .with_description("Values delivered to the event callback")
                .build(),
            decode_failures: meter
                .u64_counter("legends.client.decode.failures")
                .with_description("Text frames dropped because they were not valid JSON")
                .build(),
            frames_sent: meter
                .u64_counter("legends.client.frames.sent")
                .with_description("Outbound frames")
                .build(),
            heartbeats_sent: meter
                .u64_counter("legends.client.heartbeats.sent")
                .with_description("Heartbeat frames sent")
                .build(),
            errors_total: meter
                .u64_counter("legends.client.errors.total")
                .with_description("Errors reported by the client")
                .build(),
        }
    }

    /// Record the current connection state
    pub fn update_connection_state(&self, state: &ConnectionState) {
        self.connection_state.record(state.as_gauge(), &[]);
    }

    /// Record a handshake start
    pub fn record_connect_attempt(&self) {
        self.connect_attempts.add(1, &[]);
    }

    /// Record a completed handshake
    pub fn record_open(&self) {
        self.opens.add(1, &[]);
    }

    /// Record an armed reconnect timer
    pub fn record_reconnect_scheduled(&self, delay: Duration) {
        self.reconnect_delay.record(delay.as_secs_f64(), &[]);
    }

    /// Record an inbound frame
    pub fn record_frame_received(&self, text: bool) {
        let kind = if text { "text" } else { "binary" };
        self.frames_received
            .add(1, &[KeyValue::new("frame_type", kind)]);
    }

    /// Record a value delivered to `on_event`
    pub fn record_event_delivered(&self) {
        self.events_delivered.add(1, &[]);
    }

    /// Record a dropped, undecodable frame
    pub fn record_decode_failure(&self) {
        self.decode_failures.add(1, &[]);
    }

    /// Record an outbound frame
    pub fn record_frame_sent(&self) {
        self.frames_sent.add(1, &[]);
    }

    /// Record a heartbeat
    pub fn record_heartbeat(&self) {
        self.heartbeats_sent.add(1, &[]);
    }

    /// Record an error
    pub fn record_error(&self, error_kind: &'static str) {
        self.errors_total
            .add(1, &[KeyValue::new("error_kind", error_kind)]);
    }
}

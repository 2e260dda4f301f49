//! Client builder for configuring reconnection, heartbeat and callbacks
//!
//! The `ClientBuilder` provides a fluent API for configuring a client
//! before it is started. It allows you to:
//! - Tune reconnection delays or plug in a custom strategy
//! - Configure the heartbeat and message decoding
//! - Register callbacks, as closures or as a [`ChannelHandler`]
//! - Configure observability (OpenTelemetry)
//!
//! # Examples
//!
//! ```rust,no_run
//! use legends_client::ClientBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> legends_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:8081/ws/match/m_demo_1?playerId=p_demo_you")
//!     .reconnect_delay(Duration::from_millis(500))
//!     .max_reconnect_delay(Duration::from_secs(10))
//!     .heartbeat_interval(Some(Duration::from_secs(15)))
//!     .on_open(|| println!("connected"))
//!     .on_event(|event| println!("event: {:?}", event.event_type()))
//!     .build()?;
//!
//! client.connect();
//! # Ok(())
//! # }
//! ```

use crate::callbacks::{Callbacks, ChannelHandler, InboundEvent};
use crate::client::{ClientParts, RealtimeClient};
use crate::config::{ClientConfig, ClientOptions};
use crate::reconnect::ReconnectionStrategy;
use crate::transport::{Connector, WsConnector};
use crate::ClientMetrics;
use legends_core::{CloseInfo, Error, Frame, ObservabilityConfig, Payload, Result};
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring and creating a [`RealtimeClient`]
pub struct ClientBuilder {
    url: String,
    config: ClientConfig,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    handler: Option<Box<dyn ChannelHandler>>,
    callbacks: Callbacks,
    connector: Option<Arc<dyn Connector>>,
    metrics: Option<Arc<ClientMetrics>>,
    enable_metrics: bool,
    observability_config: Option<ObservabilityConfig>,
}

impl ClientBuilder {
    /// Create a new client builder with default configuration
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            config: ClientConfig::default(),
            reconnect_strategy: None,
            handler: None,
            callbacks: Callbacks::new(),
            connector: None,
            metrics: None,
            enable_metrics: false,
            observability_config: None,
        }
    }

    /// Replace the configuration with one derived from an options object
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.config = options.into();
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable or disable automatic reconnection (default enabled)
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    /// First reconnect delay (default 1s); zero keeps the current value
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        if !delay.is_zero() {
            self.config.initial_retry_delay = delay;
        }
        self
    }

    /// Reconnect delay ceiling (default 15s); zero keeps the current value
    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        if !delay.is_zero() {
            self.config.max_retry_delay = delay;
        }
        self
    }

    /// Heartbeat period; `None` or zero disables the heartbeat
    pub fn heartbeat_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.heartbeat_interval = interval.filter(|period| !period.is_zero());
        self
    }

    /// Value sent on every heartbeat tick (default `{"type":"ping"}`)
    pub fn heartbeat_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.config.heartbeat_payload = payload.into();
        self
    }

    /// Decode text frames as JSON before delivery (default true)
    pub fn parse_json(mut self, enabled: bool) -> Self {
        self.config.parse_json = enabled;
        self
    }

    /// How long `close()` waits for the close handshake
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.config.close_timeout = timeout;
        self
    }

    /// Label attached to every log line of this client
    pub fn log_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_prefix = prefix.into();
        self
    }

    /// Use a custom reconnection strategy instead of exponential backoff
    ///
    /// Ignored when auto-reconnect is disabled.
    pub fn reconnect_strategy(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect_strategy = Some(strategy);
        self
    }

    /// Deliver callbacks to a handler object
    ///
    /// Takes precedence over closures registered with `on_*`.
    pub fn handler(mut self, handler: impl ChannelHandler) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Called when a connection opens
    pub fn on_open(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.callbacks = self.callbacks.on_open(f);
        self
    }

    /// Called with every delivered message
    pub fn on_event(mut self, f: impl FnMut(InboundEvent) + Send + 'static) -> Self {
        self.callbacks = self.callbacks.on_event(f);
        self
    }

    /// Called with every inbound frame before decoding
    pub fn on_raw_message(mut self, f: impl FnMut(&Frame) + Send + 'static) -> Self {
        self.callbacks = self.callbacks.on_raw_message(f);
        self
    }

    /// Called on transport and send failures
    pub fn on_error(mut self, f: impl FnMut(&Error) + Send + 'static) -> Self {
        self.callbacks = self.callbacks.on_error(f);
        self
    }

    /// Called when a connection closes
    pub fn on_close(mut self, f: impl FnMut(&CloseInfo) + Send + 'static) -> Self {
        self.callbacks = self.callbacks.on_close(f);
        self
    }

    /// Dial through a custom connector (default WebSocket)
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Record metrics on the given instruments
    pub fn with_metrics(mut self, metrics: ClientMetrics) -> Self {
        self.metrics = Some(Arc::new(metrics));
        self
    }

    /// Record metrics on the global meter provider
    pub fn with_default_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }

    /// Install OpenTelemetry observability when the client is built
    ///
    /// Implies metrics, named after the configured service.
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Validate the configuration and start the client
    ///
    /// The client is idle afterwards; call `connect()` to dial.
    ///
    /// # Errors
    ///
    /// - `Error::MissingEndpoint` if the URL is empty
    /// - `Error::Runtime` if called outside a Tokio runtime
    /// - `Error::InvalidConfig` if observability cannot be installed
    pub fn build(self) -> Result<RealtimeClient> {
        // Checked again by `start`; failing here keeps observability untouched
        if self.url.trim().is_empty() {
            return Err(Error::MissingEndpoint);
        }

        let metrics = if let Some(config) = self.observability_config {
            let service_name = config.service_name.clone();
            legends_core::init_observability(config).map_err(|e| {
                Error::InvalidConfig(format!("Failed to initialize observability: {}", e))
            })?;
            Some(Arc::new(ClientMetrics::new(service_name)))
        } else if self.metrics.is_some() {
            self.metrics
        } else if self.enable_metrics {
            Some(Arc::new(ClientMetrics::new(self.config.log_prefix.clone())))
        } else {
            None
        };

        let handler: Box<dyn ChannelHandler> = match self.handler {
            Some(handler) => handler,
            None => Box::new(self.callbacks),
        };
        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(WsConnector),
        };

        RealtimeClient::start(ClientParts {
            url: self.url,
            config: self.config,
            handler,
            connector,
            strategy: self.reconnect_strategy,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconnect::FixedDelay;
    use crate::ConnectionState;

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::new("ws://localhost:8081");

        assert_eq!(builder.url, "ws://localhost:8081");
        assert!(builder.config.auto_reconnect);
        assert_eq!(builder.config.initial_retry_delay, Duration::from_secs(1));
        assert!(builder.reconnect_strategy.is_none());
        assert!(builder.handler.is_none());
        assert!(builder.connector.is_none());
        assert!(builder.metrics.is_none());
        assert!(builder.observability_config.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let builder = ClientBuilder::new("ws://localhost:8081")
            .auto_reconnect(false)
            .reconnect_delay(Duration::from_millis(250))
            .max_reconnect_delay(Duration::from_secs(4))
            .heartbeat_interval(Some(Duration::from_secs(1)))
            .heartbeat_payload("ping")
            .parse_json(false)
            .close_timeout(Duration::from_secs(1))
            .log_prefix("[match]");

        assert!(!builder.config.auto_reconnect);
        assert_eq!(builder.config.initial_retry_delay, Duration::from_millis(250));
        assert_eq!(builder.config.max_retry_delay, Duration::from_secs(4));
        assert_eq!(builder.config.heartbeat_interval, Some(Duration::from_secs(1)));
        assert_eq!(builder.config.heartbeat_payload, Payload::Text("ping".into()));
        assert!(!builder.config.parse_json);
        assert_eq!(builder.config.close_timeout, Duration::from_secs(1));
        assert_eq!(builder.config.log_prefix, "[match]");
    }

    #[test]
    fn test_zero_values_keep_defaults() {
        let builder = ClientBuilder::new("ws://localhost:8081")
            .reconnect_delay(Duration::ZERO)
            .max_reconnect_delay(Duration::ZERO)
            .heartbeat_interval(Some(Duration::ZERO));

        assert_eq!(builder.config.initial_retry_delay, Duration::from_secs(1));
        assert_eq!(builder.config.max_retry_delay, Duration::from_secs(15));
        assert_eq!(builder.config.heartbeat_interval, None);
    }

    #[test]
    fn test_builder_from_options() {
        let options = ClientOptions {
            heartbeat_interval_ms: Some(-1),
            parse_json: Some(false),
            ..Default::default()
        };
        let builder = ClientBuilder::new("ws://localhost:8081").options(options);

        assert_eq!(builder.config.heartbeat_interval, None);
        assert!(!builder.config.parse_json);
    }

    #[test]
    fn test_builder_with_strategy() {
        let strategy = Box::new(FixedDelay::new(Duration::from_millis(500)).with_max_attempts(3));
        let builder = ClientBuilder::new("ws://localhost:8081").reconnect_strategy(strategy);
        assert!(builder.reconnect_strategy.is_some());
    }

    #[test]
    fn test_builder_observability_config() {
        let config = ObservabilityConfig::console("match-client").with_log_level("debug");
        let builder = ClientBuilder::new("ws://localhost:8081").with_observability(config);

        let obs_config = builder.observability_config.unwrap();
        assert_eq!(obs_config.service_name, "match-client");
        assert_eq!(obs_config.log_level, "debug");
    }

    #[test]
    fn test_build_requires_url() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();

        let result = ClientBuilder::new("").build();
        assert!(matches!(result, Err(Error::MissingEndpoint)));
    }

    #[tokio::test]
    async fn test_build_starts_idle() {
        let client = ClientBuilder::new("ws://localhost:8081/ws/match/m_1")
            .with_default_metrics()
            .build()
            .unwrap();

        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(client.url(), "ws://localhost:8081/ws/match/m_1");
    }
}

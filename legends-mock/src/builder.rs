//! Builder for the mock match server

use crate::{MatchScript, MockMatchServer};
use legends_core::{Error, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Default port, matching the front end's development setup
pub const DEFAULT_PORT: u16 = 8081;

/// Builder for configuring and creating a [`MockMatchServer`]
pub struct MockServerBuilder {
    addr: SocketAddr,
    script: MatchScript,
}

impl MockServerBuilder {
    /// Localhost on the default port, playing the demo match
    pub fn new() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            script: MatchScript::demo(),
        }
    }

    /// Set the bind address; port 0 picks a free port
    pub fn bind(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.addr = addr.into();
        self
    }

    /// Set the bind address from a string (e.g., "0.0.0.0:8081")
    pub fn bind_str(mut self, addr: &str) -> Result<Self> {
        self.addr = addr
            .parse()
            .map_err(|e| Error::InvalidConfig(format!("Invalid address: {}", e)))?;
        Ok(self)
    }

    /// Set the timeline played to each connection
    pub fn script(mut self, script: MatchScript) -> Self {
        self.script = script;
        self
    }

    /// Bind the listener
    pub async fn build(self) -> Result<MockMatchServer> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| Error::Io(format!("Failed to bind {}: {}", self.addr, e)))?;

        tracing::info!(addr = %self.addr, steps = self.script.len(), "Mock match server bound");
        Ok(MockMatchServer::new(listener, self.script))
    }
}

impl Default for MockServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

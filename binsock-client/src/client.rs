//! WebSocket client implementation for binsock
//!
//! A [`Client`] pairs a transport with a validated configuration and opens
//! sessions on demand. It is cheap to clone.

use crate::config::{AuthToken, ClientConfig};
use crate::session::Session;
use crate::source::{BinarySocketSource, TransferListener};
use binsock_core::transport::Transport;
use binsock_core::Result;
use std::sync::Arc;

/// WebSocket client
#[derive(Debug)]
pub struct Client<T> {
    transport: Arc<T>,
    config: Arc<ClientConfig>,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
        }
    }
}

impl<T: Transport> Client<T> {
    /// Create a client with the default configuration
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            config: Arc::new(ClientConfig::default()),
        }
    }

    /// Create a client with the given configuration
    pub fn with_config(transport: T, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport: Arc::new(transport),
            config: Arc::new(config),
        })
    }

    /// Start building a client
    pub fn builder(transport: T) -> ClientBuilder<T> {
        ClientBuilder::new(transport)
    }

    /// Open a session to `url`, sending the configured auth token if any
    pub fn connect(&self, url: &str) -> Result<Session<T::Stream>> {
        Session::open(&*self.transport, url, &self.config, self.config.auth.as_ref())
    }

    /// Create an unopened byte stream bound to this client
    pub fn data_source<L: TransferListener>(&self, listener: L) -> BinarySocketSource<T, L> {
        BinarySocketSource::new(self.clone(), listener)
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Client builder
#[derive(Debug)]
pub struct ClientBuilder<T> {
    transport: T,
    config: ClientConfig,
}

impl<T: Transport> ClientBuilder<T> {
    /// Create a new client builder
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: ClientConfig::default(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Set origin
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.config.origin = Some(origin.into());
        self
    }

    /// Add a subprotocol
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.config.protocols.push(protocol.into());
        self
    }

    /// Add a custom header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.push((name.into(), value.into()));
        self
    }

    /// Send this token as the first frame of every session
    pub fn auth(mut self, token: AuthToken) -> Self {
        self.config.auth = Some(token);
        self
    }

    /// Validate the configuration and build the client
    pub fn build(self) -> Result<Client<T>> {
        Client::with_config(self.transport, self.config)
    }
}

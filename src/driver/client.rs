//! Client
//!
//! Entry point for submitting scripts and bytecode traversals. A client
//! delegates every request to its [`ConnectionPool`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use super::error::{DriverError, DriverResult};
use super::pool::{ConnectionPool, PoolConfig, PoolMetrics};
use super::result_set::ResultSet;
use super::transport::TransportFactory;
use super::websocket::{WebSocketTransportFactory, DEFAULT_CONNECT_TIMEOUT};
use crate::graphbinary::message::DEFAULT_MIME_TYPE;
use crate::graphbinary::{Bytecode, GraphBinaryMessageCodec, GraphMap, Request, Value};

/// Default traversal source alias
pub const DEFAULT_TRAVERSAL_SOURCE: &str = "g";

// ============================================================================
// ClientConfig
// ============================================================================

/// Client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Traversal source bound to `g` on the server
    pub traversal_source: String,
    /// Server-side session id; `None` for sessionless requests
    pub session: Option<String>,
    /// Pool configuration
    pub pool: PoolConfig,
    /// Transport connect timeout
    pub connect_timeout: Duration,
    /// Mime type announced in request frames
    pub mime_type: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            traversal_source: DEFAULT_TRAVERSAL_SOURCE.to_string(),
            session: None,
            pool: PoolConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            mime_type: DEFAULT_MIME_TYPE.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a client configuration builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Client configuration builder
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the traversal source
    pub fn with_traversal_source(mut self, traversal_source: impl Into<String>) -> Self {
        self.config.traversal_source = traversal_source.into();
        self
    }

    /// Bind the client to a server-side session
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.config.session = Some(session.into());
        self
    }

    /// Set the pool configuration
    pub fn with_pool_config(mut self, pool: PoolConfig) -> Self {
        self.config.pool = pool;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the mime type
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.config.mime_type = mime_type.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Parse a server URL, accepting `ws` and `wss`.
pub fn parse_url(url: &str) -> DriverResult<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| DriverError::configuration(format!("Invalid URL '{}': {}", url, e)))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        scheme => Err(DriverError::configuration(format!(
            "Unsupported URL scheme '{}', expected ws or wss",
            scheme
        ))),
    }
}

// ============================================================================
// Client
// ============================================================================

/// Gremlin client
pub struct Client {
    url: Url,
    config: ClientConfig,
    pool: Arc<ConnectionPool>,
    open: AtomicBool,
}

impl Client {
    /// Create a client with the default configuration.
    pub fn new(url: &str) -> DriverResult<Self> {
        Self::with_config(url, ClientConfig::default())
    }

    /// Create a client with a configuration.
    pub fn with_config(url: &str, config: ClientConfig) -> DriverResult<Self> {
        let factory = Arc::new(WebSocketTransportFactory::new(config.connect_timeout));
        Self::with_transport_factory(url, config, factory)
    }

    /// Create a client whose connections use transports from `factory`.
    pub fn with_transport_factory(
        url: &str,
        mut config: ClientConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> DriverResult<Self> {
        let url = parse_url(url)?;
        if config.session.is_some() {
            config.pool = config.pool.session();
        }
        if config.pool.max_connections == 0 {
            return Err(DriverError::configuration("max_connections must be at least 1"));
        }

        let codec = GraphBinaryMessageCodec::with_mime_type(config.mime_type.clone());
        let pool = ConnectionPool::new(url.clone(), config.pool.clone(), codec, factory);
        info!(url = %url, session = ?config.session, "client created");

        Ok(Self {
            url,
            config,
            pool: Arc::new(pool),
            open: AtomicBool::new(true),
        })
    }

    /// Server URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session id, if the client is session-bound
    pub fn session(&self) -> Option<&str> {
        self.config.session.as_deref()
    }

    /// Submit a script.
    pub async fn submit(&self, gremlin: &str) -> DriverResult<ResultSet> {
        let request = Request::eval(gremlin, &self.config.traversal_source);
        self.submit_request(request).await
    }

    /// Submit a script with parameter bindings.
    pub async fn submit_with_bindings(&self, gremlin: &str, bindings: GraphMap) -> DriverResult<ResultSet> {
        let request =
            Request::eval(gremlin, &self.config.traversal_source).with_arg("bindings", Value::Map(bindings));
        self.submit_request(request).await
    }

    /// Submit a bytecode traversal.
    pub async fn submit_bytecode(&self, bytecode: &Bytecode) -> DriverResult<ResultSet> {
        let request = Request::bytecode(bytecode, &self.config.traversal_source);
        self.submit_request(request).await
    }

    async fn submit_request(&self, request: Request) -> DriverResult<ResultSet> {
        self.ensure_open()?;
        let request = match &self.config.session {
            Some(session) => request.in_session(session),
            None => request,
        };
        debug!(
            request_id = %request.request_id,
            op = %request.op,
            processor = %request.processor,
            "submitting request"
        );
        self.pool.write(&request).await
    }

    /// Close the client.
    ///
    /// A session-bound client first asks the server to close the session.
    /// Closing a closed client is a no-op.
    pub async fn close(&self) -> DriverResult<()> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        info!(url = %self.url, "closing client");

        if let Some(session) = &self.config.session {
            if let Err(e) = self.close_session(session).await {
                warn!(session = %session, error = %e, "error closing session");
            }
        }
        self.pool.close().await;
        Ok(())
    }

    async fn close_session(&self, session: &str) -> DriverResult<()> {
        let request = Request::close_session(session);
        let results = self.pool.write(&request).await?;
        results.all().await.map(|_| ())
    }

    /// Whether the client is closed
    pub fn is_closed(&self) -> bool {
        !self.open.load(Ordering::Acquire)
    }

    /// Pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        self.pool.metrics()
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DriverError::connection("Client is closed"))
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url.as_str())
            .field("session", &self.config.session)
            .field("open", &!self.is_closed())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Remote traversal connection
//!
//! [`DriverRemoteConnection`] submits bytecode traversals through a
//! [`Client`] and can spawn session-bound child connections.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::client::{Client, ClientConfig};
use super::error::{DriverError, DriverResult};
use super::result_set::ResultSet;
use super::transport::TransportFactory;
use super::websocket::WebSocketTransportFactory;
use crate::graphbinary::{Bytecode, Value};

// ============================================================================
// DriverRemoteConnection
// ============================================================================

/// Connection used by traversal sources to run bytecode remotely.
pub struct DriverRemoteConnection {
    client: Client,
    url: String,
    config: ClientConfig,
    factory: Arc<dyn TransportFactory>,
    spawned_sessions: Mutex<Vec<Arc<DriverRemoteConnection>>>,
}

impl DriverRemoteConnection {
    /// Create a remote connection.
    pub fn new(url: &str, config: ClientConfig) -> DriverResult<Self> {
        let factory = Arc::new(WebSocketTransportFactory::new(config.connect_timeout));
        Self::with_transport_factory(url, config, factory)
    }

    /// Create a remote connection whose transports come from `factory`.
    pub fn with_transport_factory(
        url: &str,
        config: ClientConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> DriverResult<Self> {
        let client = Client::with_transport_factory(url, config.clone(), Arc::clone(&factory))?;
        Ok(Self {
            client,
            url: url.to_string(),
            config,
            factory,
            spawned_sessions: Mutex::new(Vec::new()),
        })
    }

    /// Underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Submit a bytecode traversal.
    pub async fn submit(&self, bytecode: &Bytecode) -> DriverResult<ResultSet> {
        self.client.submit_bytecode(bytecode).await
    }

    /// Whether this connection is bound to a server-side session.
    pub fn is_session_bound(&self) -> bool {
        self.config.session.is_some()
    }

    /// Spawn a session-bound connection to the same server.
    ///
    /// A fresh session id is generated when none is given. Fails on a
    /// connection that is itself session-bound.
    pub fn create_session(&self, session_id: Option<String>) -> DriverResult<Arc<DriverRemoteConnection>> {
        if self.is_session_bound() {
            return Err(DriverError::session(
                "connection is already bound to a session; child sessions are not supported",
            ));
        }

        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut config = self.config.clone();
        config.session = Some(session_id.clone());

        let session = Arc::new(Self::with_transport_factory(
            &self.url,
            config,
            Arc::clone(&self.factory),
        )?);
        self.spawned_sessions.lock().push(Arc::clone(&session));
        debug!(session = %session_id, "spawned session connection");
        Ok(session)
    }

    /// Close spawned sessions, then this connection.
    pub async fn close(&self) -> DriverResult<()> {
        let sessions: Vec<Arc<DriverRemoteConnection>> = self.spawned_sessions.lock().drain(..).collect();
        for session in sessions {
            if let Err(e) = session.client.close().await {
                warn!(session = ?session.config.session, error = %e, "error closing session");
            }
        }
        self.client.close().await
    }

    /// Whether the connection is closed
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

impl fmt::Debug for DriverRemoteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRemoteConnection")
            .field("url", &self.url)
            .field("session", &self.config.session)
            .field("spawned_sessions", &self.spawned_sessions.lock().len())
            .finish()
    }
}

// ============================================================================
// Traversal results
// ============================================================================

/// Drain a traversal result set into plain values.
///
/// Traversers are unwrapped and their value repeated `bulk` times; list
/// chunks sent by the server in batches are flattened.
pub async fn to_list(result_set: ResultSet) -> DriverResult<Vec<Value>> {
    let mut traversal = Traversal::new(result_set);
    let mut values = Vec::new();
    while let Some(value) = traversal.next().await? {
        values.push(value);
    }
    Ok(values)
}

/// Iterator over the values of a traversal result set.
///
/// Batches and traverser bulks are expanded lazily, one value per call.
#[derive(Debug)]
pub struct Traversal {
    result_set: ResultSet,
    /// Expanded values not yet returned, in reverse order
    buffered: Vec<Value>,
    /// Traverser value still owed and how many more copies
    repeat: Option<(Value, i64)>,
}

impl Traversal {
    /// Wrap a result set.
    pub fn new(result_set: ResultSet) -> Self {
        Self {
            result_set,
            buffered: Vec::new(),
            repeat: None,
        }
    }

    /// Whether another value is available, waiting for it if necessary.
    pub async fn has_next(&mut self) -> DriverResult<bool> {
        loop {
            if self.repeat.is_some() {
                return Ok(true);
            }
            if let Some(item) = self.buffered.pop() {
                self.expand(item);
                continue;
            }
            match self.result_set.one().await? {
                Some(chunk) => self.buffer_chunk(chunk),
                None => return Ok(false),
            }
        }
    }

    /// Next value; `None` once the traversal is exhausted.
    pub async fn next(&mut self) -> DriverResult<Option<Value>> {
        if !self.has_next().await? {
            return Ok(None);
        }
        Ok(self.repeat.take().map(|(value, remaining)| {
            if remaining > 1 {
                self.repeat = Some((value.clone(), remaining - 1));
            }
            value
        }))
    }

    /// Underlying result set
    pub fn result_set(&self) -> &ResultSet {
        &self.result_set
    }

    fn buffer_chunk(&mut self, chunk: Value) {
        match chunk {
            Value::List(items) => self.buffered.extend(items.into_iter().rev()),
            other => self.buffered.push(other),
        }
    }

    fn expand(&mut self, item: Value) {
        match item {
            Value::Traverser(traverser) if traverser.bulk > 0 => {
                self.repeat = Some((*traverser.value, traverser.bulk));
            }
            Value::Traverser(_) => {}
            other => self.repeat = Some((other, 1)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Connection Pool
//!
//! Load-balancing pool: every write goes to the connection with the fewest
//! pending requests, growing the pool when that connection is busy and
//! evicting surplus idle connections.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use url::Url;

use super::connection::{Connection, ConnectionState};
use super::error::{DriverError, DriverResult};
use super::result_set::{ResultSet, DEFAULT_RESULT_BUFFER_SIZE};
use super::transport::TransportFactory;
use crate::graphbinary::{GraphBinaryMessageCodec, Request};

// ============================================================================
// PoolConfig
// ============================================================================

/// Connection pool configuration
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `max_connections` | 8 | Maximum number of connections |
/// | `new_connection_threshold` | 4 | Pending requests on the least used connection that trigger a new one |
/// | `result_buffer_size` | 1000 | Values buffered per result set |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of connections
    pub max_connections: usize,
    /// Load at which another connection is opened
    pub new_connection_threshold: usize,
    /// Values buffered per result set
    pub result_buffer_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 8,
            new_connection_threshold: 4,
            result_buffer_size: DEFAULT_RESULT_BUFFER_SIZE,
        }
    }
}

impl PoolConfig {
    /// Create a pool configuration builder
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Single-connection variant for session-bound clients.
    pub fn session(mut self) -> Self {
        self.max_connections = 1;
        self
    }
}

/// Pool configuration builder
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Set the maximum number of connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Set the new connection threshold
    pub fn new_connection_threshold(mut self, threshold: usize) -> Self {
        self.config.new_connection_threshold = threshold;
        self
    }

    /// Set the result set buffer size
    pub fn result_buffer_size(mut self, size: usize) -> Self {
        self.config.result_buffer_size = size;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PoolConfig {
        self.config
    }
}

// ============================================================================
// PoolMetrics
// ============================================================================

/// Pool metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Connections currently held
    pub size: usize,
    /// Requests pending across all connections
    pub active_results: usize,
    /// Connections created
    pub total_created: u64,
    /// Connections closed or purged
    pub total_closed: u64,
    /// Writes routed through the pool
    pub total_writes: u64,
}

// ============================================================================
// ConnectionPool
// ============================================================================

struct PoolState {
    connections: Vec<Arc<Connection>>,
    /// Connections being opened outside the lock
    opening: usize,
}

enum Selection {
    Reuse(Arc<Connection>),
    Create,
}

/// Slot reserved in `PoolState::opening` while a connection is opened
/// outside the lock. Released on drop, so a cancelled open gives it back.
struct OpeningReservation<'a> {
    state: &'a Mutex<PoolState>,
}

impl OpeningReservation<'_> {
    /// Add the opened connection; the slot is released when `self` drops.
    fn fill(self, connection: Arc<Connection>) {
        self.state.lock().connections.push(connection);
    }
}

impl Drop for OpeningReservation<'_> {
    fn drop(&mut self) {
        self.state.lock().opening -= 1;
    }
}

/// Load-balancing connection pool
pub struct ConnectionPool {
    url: Url,
    config: PoolConfig,
    codec: GraphBinaryMessageCodec,
    factory: Arc<dyn TransportFactory>,
    state: Mutex<PoolState>,
    total_created: AtomicU64,
    total_closed: AtomicU64,
    total_writes: AtomicU64,
    open: AtomicBool,
}

impl ConnectionPool {
    /// Create an empty pool. Connections are opened on demand.
    pub fn new(
        url: Url,
        config: PoolConfig,
        codec: GraphBinaryMessageCodec,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            url,
            config,
            codec,
            factory,
            state: Mutex::new(PoolState {
                connections: Vec::new(),
                opening: 0,
            }),
            total_created: AtomicU64::new(0),
            total_closed: AtomicU64::new(0),
            total_writes: AtomicU64::new(0),
            open: AtomicBool::new(true),
        }
    }

    /// Server URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Send a request over the least used connection.
    pub async fn write(&self, request: &Request) -> DriverResult<ResultSet> {
        let connection = self.get_least_used_connection().await?;
        self.total_writes.fetch_add(1, Ordering::Relaxed);
        connection.write(request).await
    }

    /// Pick the connection for the next request.
    ///
    /// Connections that are not established are purged. Of several idle
    /// connections only the first is kept; the rest are closed in the
    /// background. A new connection is opened when none is usable, or when
    /// the least used one has reached `new_connection_threshold` and the pool
    /// is below `max_connections`. Ties go to the earliest connection.
    pub async fn get_least_used_connection(&self) -> DriverResult<Arc<Connection>> {
        if !self.open.load(Ordering::Acquire) {
            return Err(DriverError::pool("Pool is closed"));
        }

        match self.select() {
            Selection::Reuse(connection) => Ok(connection),
            Selection::Create => {
                let reservation = OpeningReservation { state: &self.state };
                let connection = self.new_connection().await?;
                reservation.fill(Arc::clone(&connection));
                Ok(connection)
            }
        }
    }

    fn select(&self) -> Selection {
        let mut state = self.state.lock();

        let mut least_used: Option<(Arc<Connection>, usize)> = None;
        let mut retained = Vec::with_capacity(state.connections.len());
        for connection in state.connections.drain(..) {
            if connection.state() != ConnectionState::Established {
                warn!(connection_id = connection.id(), state = %connection.state(), "purging dead connection from pool");
                self.total_closed.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let active = connection.active_results();
            match least_used.as_ref().map(|(_, least)| *least) {
                Some(0) if active == 0 => {
                    self.evict_idle(connection);
                    continue;
                }
                Some(least) if active >= least => {}
                _ => least_used = Some((Arc::clone(&connection), active)),
            }
            retained.push(connection);
        }
        state.connections = retained;

        let create = match &least_used {
            None => true,
            Some((_, active)) => {
                *active >= self.config.new_connection_threshold
                    && state.connections.len() + state.opening < self.config.max_connections
            }
        };

        match least_used {
            Some((connection, _)) if !create => Selection::Reuse(connection),
            _ => {
                state.opening += 1;
                Selection::Create
            }
        }
    }

    fn evict_idle(&self, connection: Arc<Connection>) {
        debug!(connection_id = connection.id(), "closing surplus idle connection");
        self.total_closed.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(async move {
            if let Err(e) = connection.close().await {
                warn!(connection_id = connection.id(), error = %e, "error closing idle connection");
            }
        });
    }

    async fn new_connection(&self) -> DriverResult<Arc<Connection>> {
        let transport = self.factory.create(&self.url);
        let connection = Connection::open(
            self.url.clone(),
            transport,
            self.codec.clone(),
            self.config.result_buffer_size,
        )
        .await?;
        self.total_created.fetch_add(1, Ordering::Relaxed);
        debug!(connection_id = connection.id(), url = %self.url, "opened pool connection");
        Ok(Arc::new(connection))
    }

    /// Close every connection. Errors are logged and do not stop the rest
    /// from being closed.
    pub async fn close(&self) {
        self.open.store(false, Ordering::Release);
        let connections: Vec<Arc<Connection>> = self.state.lock().connections.drain(..).collect();

        for connection in connections {
            if let Err(e) = connection.close().await {
                warn!(connection_id = connection.id(), error = %e, "error closing connection");
            }
            self.total_closed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Whether [`ConnectionPool::close`] was called.
    pub fn is_closed(&self) -> bool {
        !self.open.load(Ordering::Acquire)
    }

    /// Number of connections held
    pub fn size(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Metrics snapshot
    pub fn metrics(&self) -> PoolMetrics {
        let state = self.state.lock();
        PoolMetrics {
            size: state.connections.len(),
            active_results: state.connections.iter().map(|c| c.active_results()).sum(),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_closed: self.total_closed.load(Ordering::Relaxed),
            total_writes: self.total_writes.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    fn insert_connection(&self, connection: Arc<Connection>) {
        self.state.lock().connections.push(connection);
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("url", &self.url.as_str())
            .field("size", &self.size())
            .field("config", &self.config)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

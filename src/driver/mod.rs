//! Driver Module
//!
//! Async client for Gremlin servers speaking GraphBinary over WebSocket.
//!
//! # Layers
//!
//! - [`transport`]: framed binary transport abstraction ([`WebSocketTransport`])
//! - [`connection`]: one transport plus its in-flight request table
//! - [`result_set`]: streamed results of a single request
//! - [`pool`]: least-used connection selection with on-demand growth
//! - [`client`]: script and bytecode submission, optional session binding
//! - [`remote`]: remote connection used by traversal sources
//!
//! # Example
//!
//! ```ignore
//! use gremlin_driver::driver::Client;
//!
//! let client = Client::new("ws://localhost:8182/gremlin")?;
//!
//! let results = client.submit("g.V().count()").await?;
//! for value in results.all().await? {
//!     println!("{:?}", value);
//! }
//!
//! client.close().await?;
//! ```
//!
//! # Session Example
//!
//! ```ignore
//! use gremlin_driver::driver::{Client, ClientConfig};
//!
//! let config = ClientConfig::builder()
//!     .with_session("my-session")
//!     .build();
//! let client = Client::with_config("ws://localhost:8182/gremlin", config)?;
//!
//! client.submit("x = 1").await?.all().await?;
//! client.submit("x + 1").await?.all().await?;
//!
//! // Closes the server-side session too
//! client.close().await?;
//! ```

pub mod client;
pub mod connection;
pub mod error;
pub mod pool;
pub(crate) mod protocol;
pub mod remote;
pub mod result_set;
pub mod transport;
pub mod websocket;

// Re-exports
pub use client::{parse_url, Client, ClientConfig, ClientConfigBuilder, DEFAULT_TRAVERSAL_SOURCE};
pub use connection::{Connection, ConnectionState};
pub use error::{DriverError, DriverResult};
pub use pool::{ConnectionPool, PoolConfig, PoolConfigBuilder, PoolMetrics};
pub use remote::{to_list, DriverRemoteConnection, Traversal};
pub use result_set::{ResultSet, ResultSetSender, DEFAULT_RESULT_BUFFER_SIZE};
pub use transport::{Transport, TransportFactory};
pub use websocket::{WebSocketTransport, WebSocketTransportFactory, DEFAULT_CONNECT_TIMEOUT};

//! # Gremlin Driver
//!
//! An async Rust client for Gremlin graph servers speaking the GraphBinary
//! serialization format over WebSocket.
//!
//! ## Features
//!
//! - **GraphBinary** - Type-tagged binary codec for values, graph elements and bytecode
//! - **Async/Await** - Built on Tokio; results stream in as the server sends them
//! - **Connection Pooling** - Least-used selection with on-demand growth
//! - **Sessions** - Optional binding of a client to a server-side session
//! - **Backpressure** - Bounded result buffers pause the connection reader
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use gremlin_driver::{Client, GraphMap};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("ws://localhost:8182/gremlin")?;
//!
//!     // Script with bindings
//!     let mut bindings = GraphMap::new();
//!     bindings.insert("name", "marko");
//!     let results = client
//!         .submit_with_bindings("g.V().has('name', name).values('age')", bindings)
//!         .await?;
//!
//!     for value in results.all().await? {
//!         println!("{:?}", value);
//!     }
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming Results
//!
//! A [`ResultSet`] yields values as response chunks arrive:
//!
//! ```rust,no_run
//! # use gremlin_driver::Client;
//! # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
//! let mut results = client.submit("g.V()").await?;
//! while let Some(value) = results.one().await? {
//!     println!("{:?}", value);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Bytecode Traversals
//!
//! ```rust,no_run
//! use gremlin_driver::{to_list, Bytecode, ClientConfig, DriverRemoteConnection, Value};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let remote = DriverRemoteConnection::new("ws://localhost:8182/gremlin", ClientConfig::default())?;
//!
//! let bytecode = Bytecode::new()
//!     .with_step("V", vec![])
//!     .with_step("values", vec![Value::from("name")]);
//! let names = to_list(remote.submit(&bytecode).await?).await?;
//!
//! remote.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use gremlin_driver::{ClientConfig, PoolConfig};
//! use std::time::Duration;
//!
//! let config = ClientConfig::builder()
//!     .with_traversal_source("g")
//!     .with_connect_timeout(Duration::from_secs(10))
//!     .with_pool_config(
//!         PoolConfig::builder()
//!             .max_connections(4)
//!             .new_connection_threshold(2)
//!             .build(),
//!     )
//!     .build();
//! assert_eq!(config.pool.max_connections, 4);
//! ```
//!
//! ## Modules
//!
//! - [`graphbinary`] - GraphBinary data model, codec and message framing
//! - [`driver`] - Transport, connections, pool, client and result sets

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod driver;
pub mod graphbinary;

// Re-exports for convenience
pub use driver::{
    to_list, Client, ClientConfig, ClientConfigBuilder, ConnectionPool, DriverError,
    DriverRemoteConnection, DriverResult, PoolConfig, PoolConfigBuilder, PoolMetrics, ResultSet,
    Traversal,
};

pub use graphbinary::{
    Bytecode, Edge, GraphBinaryError, GraphMap, Path, Traverser, Value, Vertex,
};

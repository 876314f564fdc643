//! Driver Error Types

use std::io;

use thiserror::Error;

use crate::graphbinary::GraphBinaryError;

// ============================================================================
// DriverError
// ============================================================================

/// Driver error
#[derive(Error, Debug)]
pub enum DriverError {
    /// Failed to connect or the transport failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation on a connection that is already closed
    #[error("Connection is closed")]
    ConnectionClosed,

    /// Server asked for authentication, which this driver does not perform
    #[error("Server requires authentication, which is not supported")]
    AuthenticationUnsupported,

    /// Non-success status code in a response
    #[error("Server returned status {code}: {message}")]
    Status { code: i32, message: String },

    /// Protocol violation
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Codec failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] GraphBinaryError),

    /// Pool error
    #[error("Pool error: {0}")]
    Pool(String),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DriverError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a status error
    pub fn status(code: i32, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a pool error
    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }

    /// Create a session error
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Whether retrying the operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::ConnectionClosed | Self::Timeout(_) | Self::Io(_) => true,
            Self::Status { code, .. } => is_retryable_status(*code),
            _ => false,
        }
    }
}

/// Server timeout (598) and temporary failure (500) may succeed on retry.
fn is_retryable_status(code: i32) -> bool {
    code == 500 || code == 598
}

// ============================================================================
// Result Type
// ============================================================================

/// Driver result type
pub type DriverResult<T> = Result<T, DriverError>;

// ============================================================================
// Tests
// ============================================================================

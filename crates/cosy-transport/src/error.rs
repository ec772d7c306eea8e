//! Error types for the transport layer.

use thiserror::Error;

/// Errors raised while binding or serving.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The requested address.
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure on a bound listener.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

//! Status server errors.

use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias for status server operations.
pub type StatusResult<T> = Result<T, StatusError>;

/// Errors that stop the status server.
#[derive(Debug, Error)]
pub enum StatusError {
    /// Failed to bind to the listen address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    /// The server stopped with an I/O error.
    #[error("status server failed: {0}")]
    Serve(String),
}

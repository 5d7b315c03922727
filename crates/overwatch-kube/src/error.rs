//! Error types for the overwatch-kube crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building a cluster connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// A required environment variable is not set.
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    /// A service-account file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        /// The file that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The CA bundle is not a valid PEM certificate.
    #[error("invalid CA certificate: {0}")]
    Certificate(String),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Result type for connection setup.
pub type Result<T> = std::result::Result<T, ConnectError>;

//! Error types for the overwatch-core crate.

use thiserror::Error;

/// A string could not be parsed as a [`Level`](crate::Level).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown level: {input}")]
pub struct LevelParseError {
    /// The rejected input.
    pub input: String,
}

/// Errors reported by an [`EventSource`](crate::EventSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with an unexpected status.
    #[error("unexpected status {status} from {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The referenced object does not exist.
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
    },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The resource kind cannot be looked up.
    #[error("unsupported resource kind: {0}")]
    UnsupportedKind(String),
}

/// Errors reported by a [`Notifier`](crate::Notifier).
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The request never reached the channel.
    #[error("transport error: {0}")]
    Transport(String),

    /// The channel rejected the notification.
    #[error("rejected by channel: {0}")]
    Rejected(String),

    /// The delivery did not complete in time.
    #[error("delivery timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The notification could not be encoded for the channel.
    #[error("encode error: {0}")]
    Encode(String),
}

/// Conditions that end the watch loop.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The watch stream could not be opened or reported an error.
    #[error("event watch failed: {0}")]
    Watch(#[source] SourceError),

    /// Listing the current events failed.
    #[error("event list failed: {0}")]
    List(#[source] SourceError),

    /// The event source closed its signal stream.
    #[error("event watching has ended")]
    StreamClosed,

    /// A channel failed to deliver and the failure policy is fatal.
    #[error("{channel} delivery failed: {source}")]
    Delivery {
        /// Channel name.
        channel: String,
        /// Underlying failure.
        #[source]
        source: NotifyError,
    },

    /// A delivery task panicked.
    #[error("delivery task failed: {0}")]
    Task(String),
}

/// Result type for watch loop operations.
pub type Result<T> = std::result::Result<T, WatchError>;

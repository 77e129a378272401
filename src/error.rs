//! Error and completion types shared by lookups and watches.

use http::StatusCode;

/// Boxed error produced by a [`Transport`](crate::Transport).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for discovery failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The deadline passed or the transport gave up before a response arrived.
    #[error("request to the Kubernetes API server timed out")]
    Timeout,

    /// The API server answered with a non-success status.
    #[error("Kubernetes API server unavailable: {0}")]
    Unavailable(StatusCode),

    /// The response body was not the expected JSON shape.
    #[error("failed to decode Kubernetes API response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The operation was cancelled, either directly or by a shutdown.
    #[error("service discovery cancelled")]
    Cancelled,

    /// Discovery could not be configured.
    #[error("invalid discovery configuration: {0}")]
    Config(String),

    /// A request could not be built.
    #[error("invalid request: {0}")]
    Request(#[from] http::Error),
}

/// Why a watch stopped. Reported exactly once through the completion callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompletionReason {
    /// The API server ended the response body.
    Completed,
    /// The API server rejected the watch or the connection failed mid-stream.
    Unavailable,
    /// The watch was cancelled through its handle or by a shutdown.
    Cancelled,
}

impl std::fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::Completed => "completed",
            Self::Unavailable => "unavailable",
            Self::Cancelled => "cancelled",
        };

        f.write_str(reason)
    }
}

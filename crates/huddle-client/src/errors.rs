//! Client-side controller error types.

use thiserror::Error;

/// Errors surfaced to callers of the session controller handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The server did not answer the request within the deadline.
    #[error("Request timed out")]
    Timeout,

    /// The server answered with an `error` event.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The signaling connection (or the controller itself) is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation needs a transport that is not set up yet.
    #[error("Transport not ready")]
    TransportNotReady,

    /// A join is already in flight; duplicate joins are suppressed.
    #[error("Join already in progress")]
    JoinInProgress,
}

//! Error types for the facade.

use crate::policy::{Action, ActionPolicy};

/// Result type alias for facade operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when going through the facade.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation's action category is not in this instance's allow-list.
    #[error("action [{action}] is not allowed on this instance; allowed actions [{allowed}]")]
    AuthorizationDenied {
        /// The rejected action.
        action: Action,
        /// The configured allow-list.
        allowed: ActionPolicy,
    },

    /// No pool is configured for the requested routing.
    #[error("connection unavailable: {0}")]
    ConnectionUnavailable(&'static str),

    /// The pool has been closed.
    #[error("connection pool is closed")]
    PoolClosed,

    /// An I/O error occurred during communication.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The server returned a RESP error response.
    #[error("server error: {0}")]
    Server(String),

    /// The RESP protocol data was malformed or unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The response type did not match what was expected.
    #[error("unexpected response type: expected {expected}, got {actual}")]
    UnexpectedResponse {
        /// The expected type description.
        expected: &'static str,
        /// The actual type description.
        actual: String,
    },

    /// The connection to the server was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// A timeout occurred waiting for a connection or response.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// An invalid argument was provided to a command.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// The list serializer failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error leaves the underlying connection in an unknown state.
    ///
    /// Server replies and decoding mismatches do not; transport failures do.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::ConnectionClosed | Error::Timeout(_) | Error::Protocol(_)
        )
    }
}

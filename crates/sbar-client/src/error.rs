//! Error types for the service client.
//!
//! Errors split into two groups. Transport failures (`Io`, `Protocol`,
//! `Parse`, `Connect`) leave the connection unbound. `Service` errors are
//! answers from a healthy service and keep the binding intact.

use std::io;
use std::path::PathBuf;

use sbar_protocol::VersionError;
use thiserror::Error;

/// Client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A call was made without a live binding.
    ///
    /// Either `bind()` was never called or an earlier failure dropped
    /// the stream. Call `bind()` again to reconnect.
    #[error("Not bound to the service")]
    NotBound,

    /// The socket could not be reached.
    ///
    /// Usually means the daemon is not running. Start it with `sbard start`.
    #[error("Failed to connect to service at {path}: {error}")]
    Connect { path: PathBuf, error: String },

    /// The service refused the handshake.
    #[error("Service rejected connection: {0}")]
    Rejected(String),

    /// The service speaks an incompatible protocol major version.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// The service answered with something other than what the request
    /// expects, or closed the stream mid-request.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The service reported a failure handling the request.
    #[error("Service error: {0}")]
    Service(String),

    /// I/O error passthrough.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON parse error passthrough.
    #[error("Failed to parse message: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns true when the failure invalidates the binding.
    pub fn breaks_binding(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::Parse(_)
                | ClientError::Protocol(_)
                | ClientError::Connect { .. }
                | ClientError::Rejected(_)
                | ClientError::Version(_)
        )
    }
}

/// Convenience Result alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

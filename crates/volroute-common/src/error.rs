//! Error types for VolRoute
//!
//! Connection-layer failures are absorbed by the master client's
//! supervisor; only lookup and RPC failures reach callers.

use crate::types::VolumeId;
use thiserror::Error;

/// Common result type for VolRoute operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for VolRoute
#[derive(Debug, Error)]
pub enum Error {
    // Connection-layer errors
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("failed to send handshake: {0}")]
    HandshakeSend(String),

    #[error("failed to receive: {0}")]
    Receive(String),

    #[error("stream closed by {0}")]
    StreamClosed(String),

    // Lookup errors
    #[error("invalid file id: {0}")]
    InvalidFileId(String),

    #[error("volume {0} not found")]
    VolumeNotFound(VolumeId),

    #[error("lookup failed for {id}: {message}")]
    Lookup { id: String, message: String },

    // RPC errors
    #[error("rpc error ({code}): {message}")]
    Rpc { code: String, message: String },

    #[error("request timeout")]
    Timeout,

    #[error("no leader known")]
    NoLeader,

    // Configuration errors
    #[error("invalid server address: {0}")]
    InvalidAddress(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create an RPC error from a status code name and message
    pub fn rpc(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rpc {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this is a transport-level error worth retrying
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectFailed(_)
            | Self::HandshakeSend(_)
            | Self::Receive(_)
            | Self::StreamClosed(_)
            | Self::Timeout
            | Self::NoLeader => true,
            Self::Rpc { code, .. } => code == "Unavailable" || code == "DeadlineExceeded",
            _ => false,
        }
    }

    /// Check if this is a lookup miss
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::VolumeNotFound(_) | Self::Lookup { .. })
    }
}

//! Runtime error types.

use parlor_core::ClientError;
use thiserror::Error;

/// Errors returned by [`RuntimeHandle`](crate::RuntimeHandle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The engine rejected the request.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// The event task has stopped.
    #[error("runtime stopped")]
    Stopped,

    /// The command queue is full.
    #[error("command queue full")]
    Busy,
}

impl RuntimeError {
    /// Returns true if no further request can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Errors from reading, writing or replaying callback traces.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Trace file could not be opened or written.
    #[error("trace I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Trace could not be encoded.
    #[error("trace encode error: {reason}")]
    Encode {
        /// Description of the encoder failure.
        reason: String,
    },

    /// Trace could not be decoded.
    #[error("trace decode error: {reason}")]
    Decode {
        /// Description of the decoder failure.
        reason: String,
    },

    /// Trace was written by an incompatible version.
    #[error("unsupported trace version {found}, expected {expected}")]
    UnsupportedVersion {
        /// Version in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// The engine rejected the replayed login.
    #[error("replay rejected: {0}")]
    Client(#[from] ClientError),
}

//! Error types for request dispatch failures.

use std::io;

use thiserror::Error;

use gizmo_protocol::EncodeError;

/// Infrastructure failures raised while serving a session.
///
/// Domain rejections are not errors at this level; they travel back to the
/// peer as responses with `success = false`.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A response could not be encoded.
    #[error("failed to encode response: {0}")]
    Encode(#[from] EncodeError),

    /// IO error while writing to a session.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (e.g., lock poisoned).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DispatchError {
    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

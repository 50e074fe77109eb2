//! Error types for the rustyblue-remote library
//!
//! Nothing here crosses the callback boundary; the transport only ever
//! reports a [`CompletionStatus`], which the accessor turns into one of
//! these once the caller has woken up.

use crate::gatt::status::CompletionStatus;
use crate::gatt::transport::IssueError;
use thiserror::Error;

/// Errors that can occur when accessing a remote attribute
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Device not connected")]
    NotConnected,

    #[error("Failed to issue request: {0}")]
    IssueFailed(#[from] IssueError),

    #[error("Insufficient security: {0}")]
    InsufficientSecurity(CompletionStatus),

    #[error("Long write not supported by peer")]
    NotLong,

    #[error("Operation released before completion")]
    Released,

    #[error("Operation failed: {0}")]
    Status(CompletionStatus),
}

impl RemoteError {
    /// Raw host status behind this error, if the peer or host produced one
    pub fn status(&self) -> Option<CompletionStatus> {
        match self {
            RemoteError::InsufficientSecurity(status) | RemoteError::Status(status) => {
                Some(*status)
            }
            RemoteError::Released => Some(CompletionStatus::Released),
            _ => None,
        }
    }
}

/// Remote attribute result type
pub type RemoteResult<T> = Result<T, RemoteError>;

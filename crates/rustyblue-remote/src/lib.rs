//! RustyBlue Remote - blocking access to attributes on a connected BLE peer
//!
//! The host stack delivers GATT client results through callbacks on its own
//! task. This library lets ordinary sequential code read and write a remote
//! descriptor or characteristic value with a single blocking call, while
//! handling long values, peers that refuse long procedures, and one
//! security-upgrade retry.

pub mod att;
pub mod error;
pub mod gatt;

// Re-export common types for convenience
pub use att::AttErrorCode;
pub use error::{RemoteError, RemoteResult};
pub use gatt::{
    AccessorConfig, AttributeKind, CompletionGate, CompletionStatus, ConnectionId,
    GattTransport, IssueError, ReadCallback, ReadEvent, RemoteAttribute, WriteCallback,
};

//! Transport seam used by the remote accessor
//!
//! The connection object that owns the link implements [`GattTransport`].
//! Requests are issued synchronously and complete through callbacks that
//! the transport invokes from its own execution context. Callbacks must
//! never block; the accessor's callbacks only append bytes or signal a
//! completion gate.

use super::status::CompletionStatus;
use std::fmt;
use thiserror::Error;

/// Identity of a connection
///
/// `epoch` changes every time the link is re-established, so a handle
/// reused by the controller after a reconnect is still told apart from
/// the connection a request was issued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    pub handle: u16,
    pub epoch: u32,
}

impl ConnectionId {
    pub fn new(handle: u16, epoch: u32) -> Self {
        Self { handle, epoch }
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}/{}", self.handle, self.epoch)
    }
}

/// Event delivered to a read callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEvent<'a> {
    /// Next fragment of the attribute value, in order
    Data(&'a [u8]),
    /// Terminal event; exactly one per request, after all data
    Complete(CompletionStatus),
}

/// Callback for a long read. Invoked zero or more times with data, then once
/// with the terminal status.
pub type ReadCallback = Box<dyn FnMut(ConnectionId, ReadEvent<'_>) + Send + 'static>;

/// Callback for an acknowledged or long write. Invoked once.
pub type WriteCallback = Box<dyn FnOnce(ConnectionId, CompletionStatus) + Send + 'static>;

/// Failure to submit a request to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IssueError {
    #[error("Out of transport resources")]
    OutOfResources,

    #[error("Connection not available")]
    NotConnected,

    #[error("Request rejected by transport: {0}")]
    Rejected(i32),
}

/// Issue-and-callback primitives supplied by the owning connection
///
/// A transport that drops a callback without invoking it releases the
/// waiting caller with [`CompletionStatus::Released`].
pub trait GattTransport: Send + Sync {
    /// Whether the link is currently up
    fn is_connected(&self) -> bool;

    /// Identity of the current connection
    fn connection_id(&self) -> ConnectionId;

    /// Negotiated ATT MTU
    fn mtu(&self) -> u16;

    /// Start a long read of `handle` from `offset`
    fn read_long(
        &self,
        conn: ConnectionId,
        handle: u16,
        offset: u16,
        callback: ReadCallback,
    ) -> Result<(), IssueError>;

    /// Send a write command; there is no completion
    fn write_no_response(
        &self,
        conn: ConnectionId,
        handle: u16,
        value: &[u8],
    ) -> Result<(), IssueError>;

    /// Send a single-frame write request
    fn write(
        &self,
        conn: ConnectionId,
        handle: u16,
        value: &[u8],
        callback: WriteCallback,
    ) -> Result<(), IssueError>;

    /// Start a long (prepared) write of `value` at `offset`
    fn write_long(
        &self,
        conn: ConnectionId,
        handle: u16,
        offset: u16,
        value: &[u8],
        callback: WriteCallback,
    ) -> Result<(), IssueError>;

    /// Whether the link's security can be raised
    fn can_upgrade_security(&self) -> bool;

    /// Raise the link's security (pair / encrypt). Blocks until done and
    /// reports whether the link is now secured.
    fn upgrade_security(&self) -> bool;
}

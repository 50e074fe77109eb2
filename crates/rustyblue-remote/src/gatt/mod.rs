//! Blocking access to remote GATT attributes
//!
//! This module provides the accessor that reads and writes descriptors and
//! characteristic values on a connected peer, on top of an asynchronous,
//! callback-driven transport.

pub mod fragment;
pub mod gate;
pub mod policy;
pub mod remote;
pub mod status;
pub mod transport;
pub mod types;


pub use fragment::{frame_mode, single_frame_ceiling, FrameMode};
pub use gate::{CompletionGate, GateTicket, Signaller};
pub use remote::RemoteAttribute;
pub use status::CompletionStatus;
pub use transport::{
    ConnectionId, GattTransport, IssueError, ReadCallback, ReadEvent, WriteCallback,
};
pub use types::{AccessorConfig, AttributeKind};

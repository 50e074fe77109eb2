//! Completion status handed from the transport callback back to the caller

use crate::att::{
    AttErrorCode, HOST_STATUS_ATT_BASE, HOST_STATUS_DONE, HOST_STATUS_RELEASED,
    HOST_STATUS_SUCCESS,
};
use std::fmt;

/// Terminal status of one transport request.
///
/// This is the only piece of information that crosses from the callback
/// context to the blocked caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// The request completed
    Success,
    /// A long procedure finished; treated the same as `Success`
    Done,
    /// The peer answered with an ATT error
    Att(AttErrorCode),
    /// Any other host or transport failure
    Host(i32),
    /// The waiter was released by teardown, not by the peer
    Released,
}

impl CompletionStatus {
    /// Decode a raw host status code
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            HOST_STATUS_SUCCESS => CompletionStatus::Success,
            HOST_STATUS_DONE => CompletionStatus::Done,
            HOST_STATUS_RELEASED => CompletionStatus::Released,
            r if (HOST_STATUS_ATT_BASE..HOST_STATUS_ATT_BASE + 0x100).contains(&r) => {
                CompletionStatus::Att(AttErrorCode::from((r - HOST_STATUS_ATT_BASE) as u8))
            }
            r => CompletionStatus::Host(r),
        }
    }

    /// Raw host status code, used for logging
    pub fn raw(&self) -> i32 {
        match self {
            CompletionStatus::Success => HOST_STATUS_SUCCESS,
            CompletionStatus::Done => HOST_STATUS_DONE,
            CompletionStatus::Released => HOST_STATUS_RELEASED,
            CompletionStatus::Att(code) => HOST_STATUS_ATT_BASE + u8::from(*code) as i32,
            CompletionStatus::Host(r) => *r,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CompletionStatus::Success | CompletionStatus::Done)
    }

    pub fn is_not_long(&self) -> bool {
        matches!(self, CompletionStatus::Att(code) if code.is_not_long())
    }

    pub fn is_insufficient_security(&self) -> bool {
        matches!(self, CompletionStatus::Att(code) if code.is_insufficient_security())
    }
}

impl From<AttErrorCode> for CompletionStatus {
    fn from(code: AttErrorCode) -> Self {
        CompletionStatus::Att(code)
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionStatus::Success => write!(f, "success"),
            CompletionStatus::Done => write!(f, "done"),
            CompletionStatus::Att(code) => write!(f, "ATT error {}", code),
            CompletionStatus::Host(r) => write!(f, "host error {}", r),
            CompletionStatus::Released => write!(f, "released"),
        }
    }
}

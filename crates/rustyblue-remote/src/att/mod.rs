//! Attribute Protocol (ATT) definitions
//!
//! The remote accessor does not frame ATT PDUs itself; it only needs the
//! error codes a peer may answer with and the MTU arithmetic used to decide
//! between single-frame and long procedures.

pub mod constants;
pub mod error;

pub use self::constants::*;
pub use self::error::AttErrorCode;

//! Single-frame vs long procedure selection

use crate::att::ATT_MTU_HEADER_SIZE;

/// How a value has to be moved over the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// The value fits in one ATT PDU
    Single,
    /// The value needs a long (blob / prepared write) procedure
    Long,
}

/// Largest value that fits in a single ATT PDU for the given MTU
pub fn single_frame_ceiling(mtu: u16) -> usize {
    (mtu as usize).saturating_sub(ATT_MTU_HEADER_SIZE)
}

/// Select the procedure for a value of `len` bytes over a link with `mtu`
pub fn frame_mode(len: usize, mtu: u16) -> FrameMode {
    if len > single_frame_ceiling(mtu) {
        FrameMode::Long
    } else {
        FrameMode::Single
    }
}

//! Wire protocol constants and frame header logic
//!
//! One connection carries exactly one request frame and at most one reply:
//!
//! ```text
//! client → server   [len: u32 big-endian][payload: len bytes]
//! server → client   "OK"            (success, then close)
//!                   <nothing>       (any failure, close only)
//! ```
//!
//! The payload is whatever the configured codec produced for a
//! `TransferContainer`. The reply has no length prefix and no terminator.

use crate::error::CodecError;

/// Confirmation token written after a successful delivery
pub const ACK_TOKEN: &[u8] = b"OK";

/// Size of the length prefix in bytes
pub const FRAME_HEADER_LEN: usize = 4;

/// Default upper bound for one transfer payload (16 MiB)
pub const DEFAULT_MAX_TRANSFER_BYTES: usize = 16 * 1024 * 1024;

/// Hard upper bound any configuration may choose (256 MiB)
pub const MAX_TRANSFER_BYTES_LIMIT: usize = 256 * 1024 * 1024;

/// Encode the length prefix for a payload
pub fn encode_header(payload_len: usize) -> Result<[u8; FRAME_HEADER_LEN], CodecError> {
    let len = u32::try_from(payload_len).map_err(|_| CodecError::FrameTooLarge {
        size: payload_len,
        max: u32::MAX as usize,
    })?;
    Ok(len.to_be_bytes())
}

/// Decode and validate a length prefix against `max_len`
pub fn decode_header(header: [u8; FRAME_HEADER_LEN], max_len: usize) -> Result<usize, CodecError> {
    let len = u32::from_be_bytes(header) as usize;
    if len == 0 {
        return Err(CodecError::EmptyFrame);
    }
    if len > max_len {
        return Err(CodecError::FrameTooLarge {
            size: len,
            max: max_len,
        });
    }
    Ok(len)
}

/// Whether a reply is the confirmation token
pub fn is_acknowledgement(reply: &[u8]) -> bool {
    reply == ACK_TOKEN
}

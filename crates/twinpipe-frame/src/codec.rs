use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FrameError, Result};

/// Frame header: a signed 32-bit little-endian payload length.
pub const HEADER_SIZE: usize = 4;

/// Largest payload a frame may declare: 1 MiB.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────┬──────────────────────┐
/// │ Length (4B, i32  │ Payload              │
/// │ little-endian)   │ (Length bytes, JSON) │
/// └──────────────────┴──────────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let declared = checked_length(payload.len())?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_i32_le(declared);
    dst.put_slice(payload);
    Ok(())
}

/// Validate a frame header and return the payload length it declares.
///
/// Negative, zero and oversized lengths are one error class.
pub fn decode_header(header: [u8; HEADER_SIZE]) -> Result<usize> {
    let declared = i32::from_le_bytes(header);
    match usize::try_from(declared) {
        Ok(len) if len > 0 && len <= MAX_FRAME_LEN => Ok(len),
        _ => Err(FrameError::InvalidLength(i64::from(declared))),
    }
}

/// Serialize `value` as JSON and frame it.
pub fn encode_message<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    let payload = serde_json::to_vec(value)?;
    let mut dst = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_frame(&payload, &mut dst)?;
    Ok(dst.freeze())
}

/// Parse a frame payload as JSON.
pub fn decode_message<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(payload)?)
}

fn checked_length(len: usize) -> Result<i32> {
    match i32::try_from(len) {
        Ok(declared) if len > 0 && len <= MAX_FRAME_LEN => Ok(declared),
        _ => Err(FrameError::InvalidLength(
            i64::try_from(len).unwrap_or(i64::MAX),
        )),
    }
}

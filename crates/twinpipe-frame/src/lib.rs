//! Length-prefixed JSON framing for twinpipe.
//!
//! Every message on either endpoint is one frame:
//! - a 4-byte signed little-endian payload length, `0 < length <= 1 MiB`
//! - the UTF-8 JSON payload
//!
//! Requests are [`CommandMessage`]s, command replies are bare JSON strings and
//! stream responses are [`StreamMessage`]s.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod sink;
pub mod writer;

pub use codec::{
    decode_header, decode_message, encode_frame, encode_message, HEADER_SIZE, MAX_FRAME_LEN,
};
pub use error::{FrameError, Result};
pub use message::{
    CommandMessage, MessageType, StreamMessage, ERROR_PREFIX, FAIL_PREFIX, UNKNOWN_COMMAND_PREFIX,
};
pub use reader::FrameReader;
pub use sink::{MessageWriter, WriteError};
pub use writer::FrameWriter;

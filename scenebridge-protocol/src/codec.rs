//! Message codec for socket framing
//!
//! Every frame is a 4-byte big-endian length prefix followed by that many
//! bytes of UTF-8 JSON. The prefix makes the stream self-delimiting, so a
//! partial read is always distinguishable from a malformed one.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::messages::{Command, Frame, Response};

/// Maximum frame body size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Length of the frame prefix
const PREFIX_LEN: usize = 4;

/// Protocol codec error
///
/// Every variant is terminal for the connection it occurred on: the protocol
/// has no way to resynchronise mid-stream.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Unexpected {got} frame (expected {expected})")]
    UnexpectedFrame {
        expected: &'static str,
        got: &'static str,
    },
}

impl CodecError {
    /// Whether this error came from the bytes on the wire rather than the socket
    pub fn is_decode_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Codec for Command (encoding) and Response (decoding)
/// Used by the bridge client
#[derive(Debug, Default)]
pub struct ClientCodec;

impl ClientCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for ClientCodec {
    type Item = Response;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match decode_frame(src)? {
            Some(Frame::Response(response)) => Ok(Some(response)),
            Some(other) => Err(CodecError::UnexpectedFrame {
                expected: "response",
                got: other.type_name(),
            }),
            None => Ok(None),
        }
    }
}

impl Encoder<Command> for ClientCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&Frame::Command(item), dst)
    }
}

/// Codec for Response (encoding) and Command (decoding)
/// Used by the socket backend inside the host
#[derive(Debug, Default)]
pub struct HostCodec;

impl HostCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for HostCodec {
    type Item = Command;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match decode_frame(src)? {
            Some(Frame::Command(command)) => Ok(Some(command)),
            Some(other) => Err(CodecError::UnexpectedFrame {
                expected: "command",
                got: other.type_name(),
            }),
            None => Ok(None),
        }
    }
}

impl Encoder<Response> for HostCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&Frame::Response(item), dst)
    }
}

/// Decode one length-prefixed frame
///
/// Returns `Ok(None)` when more bytes are needed. Nothing is consumed from
/// `src` until a complete frame is available.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
    // Need at least 4 bytes for length prefix
    if src.len() < PREFIX_LEN {
        return Ok(None);
    }

    // Peek at length without consuming
    let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(CodecError::MessageTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    if src.len() < PREFIX_LEN + len {
        src.reserve(PREFIX_LEN + len - src.len());
        return Ok(None);
    }

    src.advance(PREFIX_LEN);
    let data = src.split_to(len);

    let frame: Frame = serde_json::from_slice(&data)?;
    Ok(Some(frame))
}

/// Encode one length-prefixed frame
pub fn encode_frame(item: &Frame, dst: &mut BytesMut) -> Result<(), CodecError> {
    let data = serde_json::to_vec(item)?;

    if data.len() > MAX_FRAME_SIZE {
        return Err(CodecError::MessageTooLarge {
            size: data.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    dst.reserve(PREFIX_LEN + data.len());
    dst.put_u32(data.len() as u32);
    dst.put_slice(&data);
    Ok(())
}

//! scenebridge-protocol: the command bridge wire protocol
//!
//! This crate defines the request/response data model exchanged between the
//! agent-facing bridge client and the socket backend running inside the host
//! application, plus the length-prefixed JSON framing used on the socket.

pub mod codec;
pub mod messages;

// Re-export main types at crate root
pub use codec::{
    decode_frame, encode_frame, ClientCodec, CodecError, HostCodec, MAX_FRAME_SIZE,
};
pub use messages::{Command, ErrorKind, Frame, Params, Response};

/// Default backend port inside the host application
pub const DEFAULT_BACKEND_PORT: u16 = 9876;

/// Default backend host
pub const DEFAULT_BACKEND_HOST: &str = "127.0.0.1";

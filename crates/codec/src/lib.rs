//! ## The WebSocket Protocol (wire layer)
//!
//! [RFC6455]: https://tools.ietf.org/html/rfc6455
//! [Section 5]: https://tools.ietf.org/html/rfc6455#section-5
//!
//! The WebSocket Protocol enables two-way communication between a client
//! running untrusted code in a controlled environment to a remote host
//! that has opted-in to communications from that code. The protocol
//! consists of an opening handshake followed by basic message framing,
//! layered over TCP. Data is transmitted in a sequence of frames, each
//! carrying an opcode, an optional masking key and a payload whose length
//! is encoded in 7, 16 or 64 bits, see [Section 5] of [RFC6455].
//!
//! This crate is the pure wire layer: frame header encoding/decoding,
//! payload masking, the incremental UTF-8 validator used for text
//! payloads, close status codes and the handshake accept digest. It never
//! touches a socket.

pub mod crypto;
pub mod frame;
pub mod utf8;

use std::array::TryFromSliceError;

#[derive(Debug)]
pub enum Error {
    InvalidInput,
    InvalidCloseCode,
    TryFromSliceError(TryFromSliceError),
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Error::InvalidInput, Error::InvalidInput)
                | (Error::InvalidCloseCode, Error::InvalidCloseCode)
                | (Error::TryFromSliceError(_), Error::TryFromSliceError(_))
        )
    }
}

impl Eq for Error {}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<TryFromSliceError> for Error {
    fn from(value: TryFromSliceError) -> Self {
        Self::TryFromSliceError(value)
    }
}

/// Close status codes carried in the payload of a CLOSE frame.
///
/// 1004 is the pre-version-13 "frame too large" code, kept for sessions
/// negotiated with protocol version 7 or 8.
pub mod close_code {
    pub const NORMAL: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const PROTOCOL_ERROR: u16 = 1002;
    pub const RESERVED: u16 = 1004;
    pub const INVALID_UTF8: u16 = 1007;
    pub const POLICY_VIOLATION: u16 = 1008;
    pub const MESSAGE_TOO_LARGE: u16 = 1009;
    pub const INTERNAL_ERROR: u16 = 1011;
}

/// Extract the status code from the payload of a CLOSE frame.
///
/// An empty payload means a normal closure (1000). A one byte payload is
/// malformed, as are codes below 1000, the reserved codes 1005/1006 that
/// must never appear on the wire, and anything at or above 5000.
///
/// # Test
///
/// ```
/// use wsgate_server_codec::{close_code, decode_close_code, Error};
///
/// assert_eq!(decode_close_code(&[]).unwrap(), close_code::NORMAL);
/// assert_eq!(decode_close_code(&[0x03, 0xe9]).unwrap(), 1001);
/// assert_eq!(decode_close_code(&[0x03]), Err(Error::InvalidCloseCode));
/// assert_eq!(decode_close_code(&[0x03, 0xed]), Err(Error::InvalidCloseCode));
/// ```
pub fn decode_close_code(payload: &[u8]) -> Result<u16, Error> {
    if payload.is_empty() {
        return Ok(close_code::NORMAL);
    }

    if payload.len() < 2 {
        return Err(Error::InvalidCloseCode);
    }

    let code = u16::from_be_bytes(payload[..2].try_into()?);
    if code < 1000 || code == 1005 || code == 1006 || code >= 5000 {
        return Err(Error::InvalidCloseCode);
    }

    Ok(code)
}

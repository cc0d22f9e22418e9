//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |            (16/64)            |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Largest possible header the gateway emits: 2 fixed bytes plus the
/// 8-byte extended length. Server frames are never masked, so the 4 mask
/// bytes never appear on egress.
pub const MAX_HEADER_SIZE: usize = 10;

/// The 4-bit frame purpose field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    /// Opcodes 0x8 and above are control frames: unfragmented, payload
    /// capped at 125 bytes, allowed to interleave a fragmented message.
    pub const fn is_control(self) -> bool {
        (self as u8) >= 0x8
    }
}

/// Application-level message kinds.
///
/// This numbering is the gateway's internal one, distinct from the wire
/// opcodes; it survives in the relay queue and the host-facing API and is
/// translated with [`MessageType::opcode`] when a frame is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum MessageType {
    Text = 0,
    Binary = 128,
    Close = 255,
    Ping = 256,
    Pong = 257,
}

impl MessageType {
    /// Translate to the wire opcode.
    pub const fn opcode(self) -> Opcode {
        match self {
            Self::Text => Opcode::Text,
            Self::Binary => Opcode::Binary,
            Self::Close => Opcode::Close,
            Self::Ping => Opcode::Ping,
            Self::Pong => Opcode::Pong,
        }
    }
}

/// A decoded frame header.
///
/// The opcode is kept as the raw 4-bit value: reserved opcodes must flow
/// through the framing layer and fail with a close handshake, not a
/// decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub fin: bool,
    pub rsv: u8,
    pub opcode: u8,
    pub masked: bool,
    pub payload_length: u64,
    pub mask: [u8; 4],
}

impl FrameHeader {
    /// Decode a header from the front of `bytes`.
    ///
    /// Returns the header and the number of bytes it occupied, or `None`
    /// when the buffer does not yet hold a complete header. The 64-bit
    /// extended length is decoded in full on every architecture.
    ///
    /// # Test
    ///
    /// ```
    /// use wsgate_server_codec::frame::FrameHeader;
    ///
    /// // Unmasked text frame, FIN set, 5 byte payload.
    /// let (header, size) = FrameHeader::decode(&[0x81, 0x05]).unwrap();
    ///
    /// assert_eq!(size, 2);
    /// assert!(header.fin);
    /// assert_eq!(header.opcode, 0x1);
    /// assert!(!header.masked);
    /// assert_eq!(header.payload_length, 5);
    ///
    /// // Two bytes are not enough once the mask bit is set.
    /// assert_eq!(FrameHeader::decode(&[0x81, 0x85]), None);
    /// ```
    pub fn decode(bytes: &[u8]) -> Option<(Self, usize)> {
        if bytes.len() < 2 {
            return None;
        }

        let fin = (bytes[0] >> 7) & 0x1 == 1;
        let rsv = (bytes[0] >> 4) & 0x7;
        let opcode = bytes[0] & 0xF;
        let masked = (bytes[1] >> 7) & 0x1 == 1;
        let length7 = bytes[1] & 0x7F;

        let mut size = 2;
        let payload_length = match length7 {
            126 => {
                if bytes.len() < size + 2 {
                    return None;
                }

                size += 2;
                u16::from_be_bytes(bytes[2..4].try_into().ok()?) as u64
            }
            127 => {
                if bytes.len() < size + 8 {
                    return None;
                }

                size += 8;
                u64::from_be_bytes(bytes[2..10].try_into().ok()?)
            }
            _ => length7 as u64,
        };

        let mut mask = [0u8; 4];
        if masked {
            if bytes.len() < size + 4 {
                return None;
            }

            mask.copy_from_slice(&bytes[size..size + 4]);
            size += 4;
        }

        Some((
            Self {
                fin,
                rsv,
                opcode,
                masked,
                payload_length,
                mask,
            },
            size,
        ))
    }
}

/// An encoded header, a fixed-size value type to keep the per-frame write
/// path allocation free.
#[derive(Debug, Clone, Copy)]
pub struct EncodedHeader {
    bytes: [u8; MAX_HEADER_SIZE],
    size: usize,
}

impl std::ops::Deref for EncodedHeader {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes[..self.size]
    }
}

impl AsRef<[u8]> for EncodedHeader {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

/// Build the header for an outgoing frame.
///
/// Outgoing messages are never fragmented, so FIN is always set, and
/// server-to-client frames are never masked, so the mask bit is always
/// clear and no mask key is written. The payload length uses the smallest
/// encoding that fits: 7 bits below 126, 16 bits up to 65535, 64 bits
/// beyond.
///
/// # Test
///
/// ```
/// use wsgate_server_codec::frame::{encode_header, MessageType};
///
/// assert_eq!(&*encode_header(MessageType::Text, 5), &[0x81, 0x05]);
/// assert_eq!(
///     &*encode_header(MessageType::Binary, 126),
///     &[0x82, 126, 0x00, 0x7e],
/// );
/// assert_eq!(&*encode_header(MessageType::Pong, 0), &[0x8a, 0x00]);
/// ```
pub fn encode_header(kind: MessageType, payload_length: u64) -> EncodedHeader {
    let mut bytes = [0u8; MAX_HEADER_SIZE];
    bytes[0] = 0x80 | (kind.opcode() as u8);

    let size = if payload_length < 126 {
        bytes[1] = payload_length as u8;
        2
    } else if payload_length < 65536 {
        bytes[1] = 126;
        bytes[2..4].copy_from_slice(&(payload_length as u16).to_be_bytes());
        4
    } else {
        bytes[1] = 127;
        bytes[2..10].copy_from_slice(&payload_length.to_be_bytes());
        10
    };

    EncodedHeader { bytes, size }
}

/// XOR `data` in place with the 4-byte mask key, starting at `offset`
/// within the frame payload. Returns the offset after the chunk so the
/// caller can resume on the next chunk of the same frame. Masking is its
/// own inverse.
///
/// # Test
///
/// ```
/// use wsgate_server_codec::frame::apply_mask;
///
/// let key = [0xa1, 0xb2, 0xc3, 0xd4];
/// let mut data = *b"hello w";
///
/// let offset = apply_mask(&mut data[..3], key, 0);
/// apply_mask(&mut data[3..], key, offset);
/// assert_ne!(&data, b"hello w");
///
/// apply_mask(&mut data, key, 0);
/// assert_eq!(&data, b"hello w");
/// ```
pub fn apply_mask(data: &mut [u8], key: [u8; 4], offset: u64) -> u64 {
    for (index, byte) in data.iter_mut().enumerate() {
        *byte ^= key[((offset + index as u64) & 3) as usize];
    }

    offset + data.len() as u64
}

use codec::{
    close_code, decode_close_code,
    frame::{MessageType, Opcode},
    utf8::Utf8State,
};

/// Upper bound on a single message accepted from a client. Frames that
/// announce more than this are answered with a MESSAGE_TOO_LARGE close
/// before any of the payload is buffered.
pub const DEFAULT_PAYLOAD_LIMIT: u64 = 32 * 1024 * 1024;

/// States of the incoming frame parser. The parser is fed raw bytes in
/// whatever chunk sizes the transport produces and never assumes a whole
/// frame arrives in one read; every state can pause mid-way and resume on
/// the next chunk. `Close` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramingState {
    Start,
    Length,
    LengthExt,
    Mask,
    ExtensionData,
    ApplicationData,
    Close,
}

/// Which accumulator the frame currently being parsed belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Control,
    Message,
}

/// A complete unit recognized from the byte stream and handed to the
/// connection task.
#[derive(Debug, PartialEq, Eq)]
pub enum Incoming {
    /// A complete text or binary message, reassembled across continuation
    /// frames. Emitted exactly once, on the frame carrying FIN.
    Message {
        kind: MessageType,
        payload: Vec<u8>,
    },
    /// A PING arrived; the payload must be echoed back in a PONG.
    Ping(Vec<u8>),
    /// A PONG arrived; nothing to do beyond noting it.
    Pong(Vec<u8>),
}

/// Reassembly state spanning the frames of one message.
///
/// `fin: true` means no fragmented message is in progress (the previous
/// message finished), which is what makes starting a new data frame legal
/// and a bare continuation frame illegal.
struct Accumulator {
    opcode: u8,
    fin: bool,
    utf8: Utf8State,
    data: Vec<u8>,
}

impl Accumulator {
    fn new(opcode: u8) -> Self {
        Self {
            opcode,
            fin: true,
            utf8: Utf8State::VALID,
            data: Vec::new(),
        }
    }
}

/// The incoming frame state machine.
///
/// Two accumulators exist at all times: one for data messages, which may
/// stretch across many continuation frames, and one for control frames,
/// which are always a single frame and may legally arrive in the middle
/// of a fragmented message without touching it.
///
/// Any framing violation transitions to `Close` with the appropriate
/// status code; tearing down the socket is the connection task's job, the
/// parser itself never performs I/O.
pub struct FrameReader {
    state: FramingState,
    status_code: u16,
    fin: bool,
    opcode: u8,
    payload_length: u64,
    length_bytes_remaining: u8,
    extension_bytes_remaining: u64,
    masking: bool,
    mask: [u8; 4],
    mask_index: usize,
    mask_offset: u64,
    target: Target,
    control: Accumulator,
    message: Accumulator,
    payload_limit: u64,
    version: i32,
}

impl FrameReader {
    pub fn new(version: i32, payload_limit: u64) -> Self {
        Self {
            state: FramingState::Start,
            status_code: close_code::NORMAL,
            fin: false,
            opcode: 0xFF,
            payload_length: 0,
            length_bytes_remaining: 0,
            extension_bytes_remaining: 0,
            masking: false,
            mask: [0u8; 4],
            mask_index: 0,
            mask_offset: 0,
            target: Target::Control,
            control: Accumulator::new(Opcode::Close as u8),
            message: Accumulator::new(Opcode::Continuation as u8),
            payload_limit,
            version,
        }
    }

    /// Whether the parser has reached the terminal state. Once closed it
    /// consumes no further input.
    pub fn is_closed(&self) -> bool {
        self.state == FramingState::Close
    }

    /// Status code to send in the server-side close handshake.
    pub fn close_code(&self) -> u16 {
        self.status_code
    }

    /// Consume one chunk of raw bytes from the transport, appending any
    /// complete messages and control events to `out`.
    pub fn feed(&mut self, block: &[u8], out: &mut Vec<Incoming>) {
        let mut offset = 0;

        loop {
            match self.state {
                FramingState::Start => {
                    if offset >= block.len() {
                        break;
                    }

                    let byte = block[offset];
                    offset += 1;

                    // No extensions are negotiated, so the reserve bits
                    // must be zero.
                    if byte & 0x70 != 0 {
                        self.close(close_code::PROTOCOL_ERROR);
                        continue;
                    }

                    self.fin = (byte >> 7) & 0x1 == 1;
                    self.opcode = byte & 0xF;
                    self.payload_length = 0;
                    self.length_bytes_remaining = 0;
                    self.state = FramingState::Length;

                    if self.opcode >= 0x8 {
                        // Control frames may never be fragmented.
                        if !self.fin {
                            self.close(close_code::PROTOCOL_ERROR);
                            continue;
                        }

                        self.target = Target::Control;
                        self.control.opcode = self.opcode;
                        self.control.utf8 = Utf8State::VALID;
                    } else {
                        self.target = Target::Message;
                        if self.opcode != 0 {
                            // A new message may only start once the
                            // previous one has seen FIN.
                            if !self.message.fin {
                                self.close(close_code::PROTOCOL_ERROR);
                                continue;
                            }

                            self.message.opcode = self.opcode;
                            self.message.utf8 = Utf8State::VALID;
                        } else if self.message.fin || self.message.opcode == 0 {
                            // Continuation with no message in progress.
                            self.close(close_code::PROTOCOL_ERROR);
                            continue;
                        } else {
                            self.opcode = self.message.opcode;
                        }

                        self.message.fin = self.fin;
                    }
                }
                FramingState::Length => {
                    if offset >= block.len() {
                        break;
                    }

                    let byte = block[offset];
                    offset += 1;

                    self.masking = (byte >> 7) & 0x1 == 1;
                    match byte & 0x7F {
                        126 => self.length_bytes_remaining = 2,
                        127 => self.length_bytes_remaining = 8,
                        length => self.payload_length = length as u64,
                    }

                    // Client frames must be masked, and control frames
                    // cannot carry more than 125 bytes (an extended
                    // length field gives them away).
                    if !self.masking
                        || (self.opcode >= 0x8 && self.length_bytes_remaining != 0)
                    {
                        self.close(close_code::PROTOCOL_ERROR);
                        continue;
                    }

                    self.state = FramingState::LengthExt;
                }
                FramingState::LengthExt => {
                    while self.length_bytes_remaining > 0 && offset < block.len() {
                        self.payload_length =
                            (self.payload_length << 8) | block[offset] as u64;
                        self.length_bytes_remaining -= 1;
                        offset += 1;
                    }

                    if self.length_bytes_remaining > 0 {
                        break;
                    }

                    if self.payload_length > self.payload_limit {
                        self.close(if self.version >= 13 {
                            close_code::MESSAGE_TOO_LARGE
                        } else {
                            close_code::RESERVED
                        });
                        continue;
                    }

                    self.mask_index = 0;
                    self.state = FramingState::Mask;
                }
                FramingState::Mask => {
                    while self.mask_index < 4 && offset < block.len() {
                        self.mask[self.mask_index] = block[offset];
                        self.mask_index += 1;
                        offset += 1;
                    }

                    if self.mask_index < 4 {
                        break;
                    }

                    self.mask_index = 0;
                    self.mask_offset = 0;

                    // XOR with an all-zero key is the identity; take the
                    // plain copy path.
                    if self.mask == [0u8; 4] {
                        self.masking = false;
                    }

                    self.state = FramingState::ExtensionData;
                }
                FramingState::ExtensionData => {
                    if self.extension_bytes_remaining > 0 {
                        let skip = self
                            .extension_bytes_remaining
                            .min((block.len() - offset) as u64);
                        self.extension_bytes_remaining -= skip;
                        offset += skip as usize;

                        if self.extension_bytes_remaining > 0 {
                            break;
                        }
                    }

                    let length = self.payload_length as usize;
                    self.frame_mut().data.reserve(length);
                    self.state = FramingState::ApplicationData;
                }
                FramingState::ApplicationData => {
                    if self.payload_length > 0 && offset >= block.len() {
                        break;
                    }

                    let take = self.payload_length.min((block.len() - offset) as u64) as usize;
                    let chunk = &block[offset..offset + take];
                    let mask = self.mask;
                    let masking = self.masking;
                    let text = self.opcode == Opcode::Text as u8;
                    let mut mask_offset = self.mask_offset;
                    let mut truncated = false;

                    {
                        let frame = match self.target {
                            Target::Control => &mut self.control,
                            Target::Message => &mut self.message,
                        };

                        if masking {
                            if text {
                                let mut utf8 = frame.utf8;
                                for &byte in chunk {
                                    let plain = byte ^ mask[(mask_offset & 3) as usize];
                                    mask_offset += 1;
                                    utf8 = utf8.advance(plain);
                                    if utf8.is_invalid() {
                                        break;
                                    }

                                    frame.data.push(plain);
                                }

                                frame.utf8 = utf8;
                                truncated = utf8.is_invalid();
                            } else {
                                for &byte in chunk {
                                    frame.data.push(byte ^ mask[(mask_offset & 3) as usize]);
                                    mask_offset += 1;
                                }
                            }
                        } else if take > 0 {
                            frame.data.extend_from_slice(chunk);
                            if text {
                                let mut utf8 = frame.utf8;
                                for &byte in chunk {
                                    utf8 = utf8.advance(byte);
                                    if utf8.is_invalid() {
                                        break;
                                    }
                                }

                                frame.utf8 = utf8;
                                truncated = utf8.is_invalid();
                            }
                        }
                    }

                    self.mask_offset = mask_offset;
                    self.payload_length -= take as u64;
                    offset += take;

                    // Once the validator has rejected the payload there
                    // is no point buffering the rest of the frame; frame
                    // completion turns the rejection into a 1007 close.
                    if truncated {
                        self.payload_length = 0;
                    }

                    if self.payload_length == 0 {
                        self.complete_frame(out);
                    } else {
                        break;
                    }
                }
                FramingState::Close => {
                    break;
                }
            }
        }
    }

    fn frame_mut(&mut self) -> &mut Accumulator {
        match self.target {
            Target::Control => &mut self.control,
            Target::Message => &mut self.message,
        }
    }

    fn close(&mut self, status_code: u16) {
        self.state = FramingState::Close;
        self.status_code = status_code;
    }

    /// A whole frame has been consumed: classify it, emit whatever it
    /// completed and reset for the next frame.
    fn complete_frame(&mut self, out: &mut Vec<Incoming>) {
        let fin = self.fin;
        let mut message_kind = None;

        match Opcode::try_from(self.opcode) {
            Ok(Opcode::Text) => {
                let utf8 = self.frame_mut().utf8;
                if (fin && !utf8.is_valid()) || utf8.is_invalid() {
                    self.close(close_code::INVALID_UTF8);
                } else {
                    message_kind = Some(MessageType::Text);
                }
            }
            Ok(Opcode::Binary) => {
                message_kind = Some(MessageType::Binary);
            }
            Ok(Opcode::Close) => {
                match decode_close_code(&self.frame_mut().data) {
                    Ok(code) => self.close(code),
                    Err(_) => self.close(close_code::PROTOCOL_ERROR),
                }
            }
            Ok(Opcode::Ping) => {
                let payload = std::mem::take(&mut self.frame_mut().data);
                out.push(Incoming::Ping(payload));
            }
            Ok(Opcode::Pong) => {
                let payload = std::mem::take(&mut self.frame_mut().data);
                out.push(Incoming::Pong(payload));
            }
            Ok(Opcode::Continuation) | Err(_) => {
                self.close(close_code::PROTOCOL_ERROR);
            }
        }

        if fin {
            if let Some(kind) = message_kind {
                let frame = self.frame_mut();
                if !frame.data.is_empty() {
                    out.push(Incoming::Message {
                        kind,
                        payload: std::mem::take(&mut frame.data),
                    });
                }
            }
        }

        if self.state != FramingState::Close {
            self.state = FramingState::Start;
            if fin {
                // Drop the buffer rather than truncating it so a large
                // message does not pin its allocation for the rest of
                // the connection.
                self.frame_mut().data = Vec::new();
            }
        }
    }
}

use codec::frame::MessageType;
use wsgate_server_service::framing::{FrameReader, Incoming};

const KEY: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

/// Build a client-to-server frame the way a browser would: masked, with
/// the minimal length encoding.
fn client_frame(fin: bool, opcode: u8, key: [u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![((fin as u8) << 7) | opcode];

    match payload.len() {
        length @ 0..126 => frame.push(0x80 | length as u8),
        length @ 126..65536 => {
            frame.push(0x80 | 126);
            frame.extend((length as u16).to_be_bytes());
        }
        length => {
            frame.push(0x80 | 127);
            frame.extend((length as u64).to_be_bytes());
        }
    }

    frame.extend(key);
    frame.extend(
        payload
            .iter()
            .enumerate()
            .map(|(index, byte)| byte ^ key[index & 3]),
    );

    frame
}

fn reader() -> FrameReader {
    FrameReader::new(13, 32 * 1024 * 1024)
}

#[test]
fn test_single_text_message() {
    let mut reader = reader();
    let mut events = Vec::new();

    reader.feed(&client_frame(true, 0x1, KEY, b"hello"), &mut events);

    assert!(!reader.is_closed());
    assert_eq!(
        events,
        vec![Incoming::Message {
            kind: MessageType::Text,
            payload: b"hello".to_vec(),
        }],
    );
}

#[test]
fn test_message_reassembled_from_arbitrary_chunks() {
    let mut reader = reader();
    let mut events = Vec::new();

    // One byte at a time: every state must be able to pause and resume.
    for byte in client_frame(true, 0x2, KEY, &[0u8, 1, 2, 3, 4, 5, 6]) {
        reader.feed(&[byte], &mut events);
    }

    assert_eq!(
        events,
        vec![Incoming::Message {
            kind: MessageType::Binary,
            payload: vec![0, 1, 2, 3, 4, 5, 6],
        }],
    );
}

#[test]
fn test_extended_length_encodings() {
    for length in [126usize, 1000, 65536] {
        let payload = vec![0xabu8; length];
        let mut reader = reader();
        let mut events = Vec::new();

        reader.feed(&client_frame(true, 0x2, KEY, &payload), &mut events);

        assert_eq!(events.len(), 1, "length={}", length);
        assert_eq!(
            events.remove(0),
            Incoming::Message {
                kind: MessageType::Binary,
                payload,
            },
        );
    }
}

#[test]
fn test_fragmented_message_delivered_once() {
    let mut reader = reader();
    let mut events = Vec::new();

    reader.feed(&client_frame(false, 0x1, KEY, b"one "), &mut events);
    reader.feed(&client_frame(false, 0x0, KEY, b"two "), &mut events);
    assert!(events.is_empty());

    reader.feed(&client_frame(true, 0x0, KEY, b"three"), &mut events);

    assert_eq!(
        events,
        vec![Incoming::Message {
            kind: MessageType::Text,
            payload: b"one two three".to_vec(),
        }],
    );
}

#[test]
fn test_ping_interleaved_with_fragmented_message() {
    let mut reader = reader();
    let mut events = Vec::new();

    reader.feed(&client_frame(false, 0x1, KEY, b"first "), &mut events);
    reader.feed(&client_frame(true, 0x9, KEY, b"probe"), &mut events);
    reader.feed(&client_frame(true, 0x0, KEY, b"second"), &mut events);

    // The ping surfaces immediately, the message stays intact.
    assert_eq!(
        events,
        vec![
            Incoming::Ping(b"probe".to_vec()),
            Incoming::Message {
                kind: MessageType::Text,
                payload: b"first second".to_vec(),
            },
        ],
    );
}

#[test]
fn test_utf8_valid_across_fragment_boundary() {
    let mut reader = reader();
    let mut events = Vec::new();

    // The euro sign split in the middle of its 3-byte sequence.
    reader.feed(&client_frame(false, 0x1, KEY, &[0xe2, 0x82]), &mut events);
    reader.feed(&client_frame(true, 0x0, KEY, &[0xac]), &mut events);

    assert_eq!(
        events,
        vec![Incoming::Message {
            kind: MessageType::Text,
            payload: vec![0xe2, 0x82, 0xac],
        }],
    );
}

#[test]
fn test_fragmented_control_frame_is_a_protocol_error() {
    let mut reader = reader();
    let mut events = Vec::new();

    reader.feed(&client_frame(false, 0x9, KEY, b""), &mut events);

    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1002);
    assert!(events.is_empty());
}

#[test]
fn test_continuation_without_message_is_a_protocol_error() {
    let mut reader = reader();
    let mut events = Vec::new();

    reader.feed(&client_frame(true, 0x0, KEY, b"stray"), &mut events);

    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1002);
}

#[test]
fn test_new_message_inside_fragmented_message_is_a_protocol_error() {
    let mut reader = reader();
    let mut events = Vec::new();

    reader.feed(&client_frame(false, 0x1, KEY, b"open"), &mut events);
    reader.feed(&client_frame(true, 0x1, KEY, b"nested"), &mut events);

    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1002);
    assert!(events.is_empty());
}

#[test]
fn test_reserved_bits_are_a_protocol_error() {
    let mut reader = reader();
    let mut events = Vec::new();

    let mut frame = client_frame(true, 0x1, KEY, b"x");
    frame[0] |= 0x40; // RSV1

    reader.feed(&frame, &mut events);

    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1002);
}

#[test]
fn test_unmasked_client_frame_is_a_protocol_error() {
    let mut reader = reader();
    let mut events = Vec::new();

    reader.feed(&[0x81, 0x02, b'h', b'i'], &mut events);

    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1002);
}

#[test]
fn test_oversized_control_frame_is_a_protocol_error() {
    let mut reader = reader();
    let mut events = Vec::new();

    // A ping that announces a 16-bit extended length.
    reader.feed(&client_frame(true, 0x9, KEY, &[0u8; 126]), &mut events);

    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1002);
}

#[test]
fn test_unknown_opcode_is_a_protocol_error() {
    let mut reader = reader();
    let mut events = Vec::new();

    reader.feed(&client_frame(true, 0x3, KEY, b"??"), &mut events);

    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1002);
    assert!(events.is_empty());
}

#[test]
fn test_invalid_utf8_closes_with_1007() {
    let mut reader = reader();
    let mut events = Vec::new();

    reader.feed(&client_frame(true, 0x1, KEY, &[b'h', 0xc0, b'i']), &mut events);

    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1007);
    assert!(events.is_empty());
}

#[test]
fn test_truncated_utf8_at_message_end_closes_with_1007() {
    let mut reader = reader();
    let mut events = Vec::new();

    // A dangling 3-byte sequence; every byte is fine on its own but the
    // message must end on a sequence boundary.
    reader.feed(&client_frame(true, 0x1, KEY, &[0xe2, 0x82]), &mut events);

    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1007);
}

#[test]
fn test_close_frame_status_codes() {
    // Explicit code is extracted.
    let mut reader = reader();
    reader.feed(&client_frame(true, 0x8, KEY, &1001u16.to_be_bytes()), &mut Vec::new());
    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1001);

    // Absent code defaults to a normal closure.
    let mut reader = self::reader();
    reader.feed(&client_frame(true, 0x8, KEY, b""), &mut Vec::new());
    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1000);

    // A one byte payload cannot hold a code.
    let mut reader = self::reader();
    reader.feed(&client_frame(true, 0x8, KEY, &[0x03]), &mut Vec::new());
    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1002);
}

#[test]
fn test_payload_limit() {
    let mut reader = FrameReader::new(13, 8);
    reader.feed(&client_frame(true, 0x1, KEY, b"nine char"), &mut Vec::new());
    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1009);

    // Pre-13 sessions get the old reserved code.
    let mut reader = FrameReader::new(8, 8);
    reader.feed(&client_frame(true, 0x1, KEY, b"nine char"), &mut Vec::new());
    assert!(reader.is_closed());
    assert_eq!(reader.close_code(), 1004);
}

#[test]
fn test_zero_mask_key_is_identity() {
    let mut reader = reader();
    let mut events = Vec::new();

    reader.feed(&client_frame(true, 0x1, [0u8; 4], b"plain"), &mut events);

    assert_eq!(
        events,
        vec![Incoming::Message {
            kind: MessageType::Text,
            payload: b"plain".to_vec(),
        }],
    );
}

#[test]
fn test_empty_final_message_is_not_emitted() {
    let mut reader = reader();
    let mut events = Vec::new();

    reader.feed(&client_frame(true, 0x1, KEY, b""), &mut events);

    assert!(!reader.is_closed());
    assert!(events.is_empty());
}

#[test]
fn test_input_after_close_is_ignored() {
    let mut reader = reader();
    let mut events = Vec::new();

    reader.feed(&client_frame(true, 0x8, KEY, b""), &mut events);
    assert!(reader.is_closed());

    reader.feed(&client_frame(true, 0x1, KEY, b"late"), &mut events);
    assert!(events.is_empty());
    assert_eq!(reader.close_code(), 1000);
}

use std::{io, sync::Arc, time::Duration};

use bytes::Bytes;
use codec::frame::MessageType;
use parking_lot::Mutex;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream},
    time::{sleep, timeout},
};
use wsgate_server_service::{
    MessageForwarder, MessageSink, RelaySender, Session, SessionOptions, Status, relay,
};

const KEY: [u8; 4] = [0x11, 0x22, 0x33, 0x44];

fn session() -> Arc<Session> {
    Arc::new(Session::new(SessionOptions {
        binary: false,
        protocol: None,
        version: 13,
    }))
}

fn client_frame(fin: bool, opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![((fin as u8) << 7) | opcode, 0x80 | payload.len() as u8];
    frame.extend(KEY);
    frame.extend(
        payload
            .iter()
            .enumerate()
            .map(|(index, byte)| byte ^ KEY[index & 3]),
    );

    frame
}

/// Collects delivered messages instead of forwarding them to a database
/// server.
#[derive(Default, Clone)]
struct VecSink(Arc<Mutex<Vec<(MessageType, Vec<u8>)>>>);

impl MessageSink for VecSink {
    async fn deliver(&mut self, kind: MessageType, payload: &[u8]) -> io::Result<()> {
        self.0.lock().push((kind, payload.to_vec()));
        Ok(())
    }
}

struct Connection {
    session: Arc<Session>,
    relay: RelaySender,
    sink: VecSink,
    client: DuplexStream,
}

/// A running forwarder wired to an in-memory client socket.
fn connect() -> Connection {
    let session = session();
    let sink = VecSink::default();
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (relay, queue) = relay::channel(session.clone());

    let forwarder = MessageForwarder::new(
        session.clone(),
        server,
        sink.clone(),
        queue,
        32 * 1024 * 1024,
    );
    tokio::spawn(forwarder.run());

    Connection {
        session,
        relay,
        sink,
        client,
    }
}

#[tokio::test]
async fn test_messages_are_delivered_to_the_sink() {
    let mut connection = connect();

    connection
        .client
        .write_all(&client_frame(true, 0x1, b"hello"))
        .await
        .unwrap();

    sleep(Duration::from_millis(50)).await;
    assert_eq!(
        connection.sink.0.lock().as_slice(),
        &[(MessageType::Text, b"hello".to_vec())],
    );
}

#[tokio::test]
async fn test_ping_is_answered_with_pong() {
    let mut connection = connect();

    connection
        .client
        .write_all(&client_frame(true, 0x9, b"probe"))
        .await
        .unwrap();

    let mut frame = [0u8; 7];
    timeout(Duration::from_secs(1), connection.client.read_exact(&mut frame))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(&frame, &[0x8a, 0x05, b'p', b'r', b'o', b'b', b'e']);
}

#[tokio::test]
async fn test_relay_send_wakes_the_parked_forwarder() {
    let mut connection = connect();
    let relay = connection.relay.clone();

    // The forwarder is parked in its select with nothing to read. A send
    // from another task must wake it and be written to the wire.
    let written = tokio::spawn(async move {
        relay.send(MessageType::Text, Bytes::from_static(b"db row")).await
    });

    let mut frame = [0u8; 8];
    timeout(Duration::from_secs(1), connection.client.read_exact(&mut frame))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(&frame[..2], &[0x81, 0x06]);
    assert_eq!(&frame[2..], b"db row");
    assert_eq!(written.await.unwrap(), 6);
}

#[tokio::test]
async fn test_relay_sends_keep_fifo_order() {
    let mut connection = connect();

    for payload in [&b"one"[..], b"two", b"three"] {
        let written = connection
            .relay
            .send(MessageType::Binary, Bytes::copy_from_slice(payload))
            .await;
        assert_eq!(written, payload.len());
    }

    let mut bytes = vec![0u8; 2 + 3 + 2 + 3 + 2 + 5];
    timeout(Duration::from_secs(1), connection.client.read_exact(&mut bytes))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        bytes,
        [
            &[0x82, 0x03][..],
            b"one",
            &[0x82, 0x03],
            b"two",
            &[0x82, 0x05],
            b"three",
        ]
        .concat(),
    );
}

#[tokio::test]
async fn test_close_through_relay_is_idempotent() {
    let mut connection = connect();

    let written = connection
        .relay
        .send(MessageType::Close, Bytes::copy_from_slice(&1000u16.to_be_bytes()))
        .await;
    assert_eq!(written, 2);
    assert_eq!(connection.session.status(), Status::Closed);

    // The second close is a no-op before it even reaches the queue.
    let written = connection
        .relay
        .send(MessageType::Close, Bytes::copy_from_slice(&1000u16.to_be_bytes()))
        .await;
    assert_eq!(written, 0);

    let mut frame = [0u8; 4];
    timeout(Duration::from_secs(1), connection.client.read_exact(&mut frame))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&frame, &[0x88, 0x02, 0x03, 0xe8]);

    // Nothing else may follow the close on the wire.
    let mut rest = [0u8; 1];
    let outcome = timeout(Duration::from_millis(100), connection.client.read_exact(&mut rest)).await;
    assert!(outcome.is_err() || outcome.unwrap().is_err());
}

#[tokio::test]
async fn test_sends_after_close_write_nothing() {
    let connection = connect();

    connection
        .relay
        .send(MessageType::Close, Bytes::new())
        .await;

    let written = connection
        .relay
        .send(MessageType::Text, Bytes::from_static(b"late"))
        .await;
    assert_eq!(written, 0);
}

#[tokio::test]
async fn test_blocked_send_returns_when_connection_dies() {
    // No forwarder at all: the envelope is queued and the sender parks.
    let session = session();
    let (relay, _queue) = relay::channel(session.clone());

    let waiter = tokio::spawn({
        let relay = relay.clone();
        async move { relay.send(MessageType::Text, Bytes::from_static(b"stuck")).await }
    });

    sleep(Duration::from_millis(50)).await;
    session.shutdown();

    // The sender must come back promptly with nothing written rather
    // than hang on a dead connection.
    let written = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    assert_eq!(written, 0);
}

#[tokio::test]
async fn test_full_queue_fails_without_blocking() {
    let session = session();
    let (relay, _queue) = relay::channel(session.clone());

    // Saturate the bounded queue with parked senders.
    for _ in 0..16 {
        let relay = relay.clone();
        tokio::spawn(async move {
            relay.send(MessageType::Binary, Bytes::from_static(b"fill")).await
        });
    }
    sleep(Duration::from_millis(50)).await;

    // The push fails immediately, no waiting involved.
    let written = timeout(
        Duration::from_millis(100),
        relay.send(MessageType::Binary, Bytes::from_static(b"overflow")),
    )
    .await
    .unwrap();
    assert_eq!(written, 0);

    session.shutdown();
}

#[tokio::test]
async fn test_client_close_is_echoed_and_session_torn_down() {
    let mut connection = connect();

    connection
        .client
        .write_all(&client_frame(true, 0x8, &1001u16.to_be_bytes()))
        .await
        .unwrap();

    let mut frame = [0u8; 4];
    timeout(Duration::from_secs(1), connection.client.read_exact(&mut frame))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&frame, &[0x88, 0x02, 0x03, 0xe9]);

    let mut closed = connection.session.closed_signal();
    timeout(Duration::from_secs(1), closed.wait_for(|closed| *closed))
        .await
        .unwrap()
        .unwrap();
    assert!(connection.session.status().is_terminal());
}

#[tokio::test]
async fn test_protocol_error_is_answered_with_1002() {
    let mut connection = connect();

    // Unmasked frames are forbidden from clients.
    connection
        .client
        .write_all(&[0x81, 0x02, b'h', b'i'])
        .await
        .unwrap();

    let mut frame = [0u8; 4];
    timeout(Duration::from_secs(1), connection.client.read_exact(&mut frame))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&frame, &[0x88, 0x02, 0x03, 0xea]);
}

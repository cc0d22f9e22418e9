use crate::{
    framing::{FrameReader, Incoming},
    relay::Outbound,
    session::{Session, Status},
};

use std::{future::Future, io, sync::Arc};

use bytes::BytesMut;
use codec::{
    close_code,
    frame::{MessageType, encode_header},
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};

/// Consumer for completed client messages, the seam between the framing
/// engine and whatever sits behind the gateway. The production
/// implementation writes the payload to the database server connection.
pub trait MessageSink: Send {
    fn deliver(
        &mut self,
        kind: MessageType,
        payload: &[u8],
    ) -> impl Future<Output = io::Result<()>> + Send;
}

/// The per-connection engine, and the single owner of the client socket.
///
/// All socket writes happen on this task: incoming frames are parsed
/// here, pongs are answered here, and messages queued by other tasks are
/// drained from the relay queue and written here. The `select!` in the
/// main loop is what lets a queued message wake the task while it is
/// parked waiting for socket readability.
pub struct MessageForwarder<S, T> {
    session: Arc<Session>,
    stream: S,
    sink: T,
    reader: FrameReader,
    queue: mpsc::Receiver<Outbound>,
    initial: BytesMut,
}

impl<S, T> MessageForwarder<S, T>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    T: MessageSink,
{
    pub fn new(
        session: Arc<Session>,
        stream: S,
        sink: T,
        queue: mpsc::Receiver<Outbound>,
        payload_limit: u64,
    ) -> Self {
        let reader = FrameReader::new(session.version, payload_limit);

        Self {
            session,
            stream,
            sink,
            reader,
            queue,
            initial: BytesMut::new(),
        }
    }

    /// Bytes that were read together with the request head but belong to
    /// the frame stream. They are parsed before the first socket read.
    pub fn with_initial(mut self, initial: BytesMut) -> Self {
        self.initial = initial;
        self
    }

    /// Drive the connection until the close handshake or a connection
    /// loss, then tear the session down. Teardown always runs, also on
    /// the error paths, so no task stays parked on a dead connection.
    pub async fn run(mut self) -> io::Result<()> {
        let result = self.drive().await;

        // Best effort: a connection dying of an internal failure still
        // owes the client a close frame. A dead socket makes this a
        // no-op.
        if result.is_err() {
            let status_code = close_code::INTERNAL_ERROR.to_be_bytes();
            self.write_frame(MessageType::Close, &status_code).await;
        }

        self.session.shutdown();
        result
    }

    async fn drive(&mut self) -> io::Result<()> {
        self.session.set_status(Status::Connected);

        let mut buf = BytesMut::with_capacity(4096);
        let mut events = Vec::new();
        let mut queue_open = true;
        let mut peer_gone = false;

        if !self.initial.is_empty() {
            let block = self.initial.split();
            self.reader.feed(&block, &mut events);
            self.handle_events(&mut events).await?;
        }

        // Outcome of one wait: either the socket became readable or
        // another task queued an outbound message.
        enum Turn {
            Read(io::Result<usize>),
            Queued(Option<Outbound>),
        }

        while !self.reader.is_closed() && !peer_gone {
            let turn = tokio::select! {
                result = self.stream.read_buf(&mut buf) => Turn::Read(result),
                message = self.queue.recv(), if queue_open => Turn::Queued(message),
            };

            match turn {
                Turn::Read(Ok(0)) => {
                    self.session.set_status(Status::ClosedByClient);
                    peer_gone = true;
                }
                Turn::Read(Ok(size)) => {
                    log::trace!("websocket read: size={}", size);

                    let block = buf.split();
                    self.reader.feed(&block, &mut events);
                    self.handle_events(&mut events).await?;
                }
                Turn::Read(Err(err)) => {
                    self.session.set_status(Status::ClosedByClient);
                    return Err(err);
                }
                Turn::Queued(Some(outbound)) => {
                    let written = self.write_frame(outbound.kind, &outbound.payload).await;
                    let _ = outbound.done.send(written);
                }
                Turn::Queued(None) => queue_open = false,
            }
        }

        // Server side of the closing handshake, carrying the status code
        // the parser settled on. Nothing is sent when the client vanished
        // without one, or when a CLOSE already went out.
        if !peer_gone {
            let status_code = self.reader.close_code().to_be_bytes();
            self.write_frame(MessageType::Close, &status_code).await;
        }

        Ok(())
    }

    async fn handle_events(&mut self, events: &mut Vec<Incoming>) -> io::Result<()> {
        for event in events.drain(..) {
            match event {
                Incoming::Message { kind, payload } => {
                    log::trace!(
                        "websocket message: kind={:?}, size={}",
                        kind,
                        payload.len(),
                    );

                    self.sink.deliver(kind, &payload).await?;
                }
                Incoming::Ping(payload) => {
                    // This task owns the socket, so the pong needs no
                    // queue hop.
                    self.write_frame(MessageType::Pong, &payload).await;
                }
                Incoming::Pong(payload) => {
                    log::trace!("websocket pong: size={}", payload.len());
                }
            }
        }

        Ok(())
    }

    /// Encode and write one complete frame. Returns the number of payload
    /// bytes written; 0 means the write was suppressed (a CLOSE already
    /// went out) or failed. The first CLOSE locks the write path for good.
    async fn write_frame(&mut self, kind: MessageType, payload: &[u8]) -> usize {
        if self.session.is_closing() {
            return 0;
        }

        if kind == MessageType::Close {
            self.session.begin_close();
        }

        let header = encode_header(kind, payload.len() as u64);
        if self.stream.write_all(&header).await.is_err() {
            return 0;
        }

        if !payload.is_empty() && self.stream.write_all(payload).await.is_err() {
            return 0;
        }

        if self.stream.flush().await.is_err() {
            return 0;
        }

        payload.len()
    }
}

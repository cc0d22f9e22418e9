use crate::session::Session;

use std::sync::Arc;

use bytes::Bytes;
use codec::frame::MessageType;
use tokio::sync::{mpsc, oneshot};

/// Capacity of the queue carrying messages from other tasks to the
/// connection task that owns the socket.
pub const QUEUE_CAPACITY: usize = 16;

/// One queued outbound message: the payload travels to the owning task,
/// the written byte count travels back through the completion slot.
pub struct Outbound {
    pub kind: MessageType,
    pub payload: Bytes,
    pub done: oneshot::Sender<usize>,
}

/// Create the relay for one connection. The receiver half goes to the
/// connection task; the sender half is handed to whoever needs to push
/// frames from outside it, typically the database reader task.
pub fn channel(session: Arc<Session>) -> (RelaySender, mpsc::Receiver<Outbound>) {
    let (queue, receiver) = mpsc::channel(QUEUE_CAPACITY);
    (RelaySender { queue, session }, receiver)
}

/// Handle for sending client-bound messages from a task that does not own
/// the socket. All writes funnel through the owning task; this handle
/// never touches the connection itself.
#[derive(Clone)]
pub struct RelaySender {
    queue: mpsc::Sender<Outbound>,
    session: Arc<Session>,
}

impl RelaySender {
    /// Hand one message to the owning task and wait for it to be written.
    ///
    /// Returns the number of payload bytes that reached the wire, or 0
    /// when nothing was written: the queue was full or closed, the
    /// connection was already closing, or it died while we waited. The
    /// wait is always bounded by the connection lifetime; teardown wakes
    /// every parked sender.
    ///
    /// Sending CLOSE twice is a no-op: only the first call marks the
    /// session closed and gets a frame out.
    pub async fn send(&self, kind: MessageType, payload: Bytes) -> usize {
        if kind == MessageType::Close && !self.session.close_once() {
            return 0;
        }

        if self.session.is_closing() {
            return 0;
        }

        let (done, written) = oneshot::channel();
        let outbound = Outbound {
            kind,
            payload,
            done,
        };

        if self.queue.try_send(outbound).is_err() {
            return 0;
        }

        let mut closed = self.session.closed_signal();
        tokio::select! {
            result = written => result.unwrap_or(0),
            _ = closed.wait_for(|dead| *dead) => 0,
        }
    }
}

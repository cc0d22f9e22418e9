use parking_lot::Mutex;
use tokio::sync::watch;

/// Lifecycle of one upgraded connection.
///
/// `Closing` means this side has started the close handshake; the
/// `Closed*` variants are terminal and record which side ended the
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NoCon,
    HeadersSent,
    Connected,
    Closing,
    Closed,
    ClosedByServer,
    ClosedByClient,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Closed | Self::ClosedByServer | Self::ClosedByClient
        )
    }
}

pub struct SessionOptions {
    /// Relay database bytes to the client as BINARY frames instead of
    /// TEXT frames.
    pub binary: bool,
    /// Sub-protocol picked during the handshake, echoed back to the
    /// client.
    pub protocol: Option<String>,
    /// Negotiated `Sec-WebSocket-Version`.
    pub version: i32,
}

struct State {
    status: Status,
    /// Set once a CLOSE frame has been encoded for this direction. A
    /// CLOSE may be written at most once, and nothing may be written
    /// after it.
    closing: bool,
}

/// Shared per-connection state.
///
/// The mutex guards the status transitions; the watch channel is flipped
/// exactly once at teardown so that every task blocked on this session
/// wakes up and observes a dead connection.
pub struct Session {
    pub binary: bool,
    pub protocol: Option<String>,
    pub version: i32,
    state: Mutex<State>,
    closed: watch::Sender<bool>,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            binary: options.binary,
            protocol: options.protocol,
            version: options.version,
            state: Mutex::new(State {
                status: Status::NoCon,
                closing: false,
            }),
            closed: watch::Sender::new(false),
        }
    }

    pub fn status(&self) -> Status {
        self.state.lock().status
    }

    pub fn set_status(&self, status: Status) {
        self.state.lock().status = status;
    }

    /// Whether a CLOSE frame has already been sent to the client.
    pub fn is_closing(&self) -> bool {
        self.state.lock().closing
    }

    /// Claim the right to encode the CLOSE frame. Only the first caller
    /// gets it; the connection also leaves the open states here.
    pub fn begin_close(&self) -> bool {
        let mut state = self.state.lock();
        if state.closing {
            return false;
        }

        state.closing = true;
        if !state.status.is_terminal() {
            state.status = Status::Closing;
        }

        true
    }

    /// Bookkeeping for a CLOSE pushed through the relay: the first close
    /// marks the session closed and proceeds, any repeat is a no-op.
    pub fn close_once(&self) -> bool {
        let mut state = self.state.lock();
        if state.status == Status::Closed {
            return false;
        }

        if !state.status.is_terminal() {
            state.status = Status::Closed;
        }

        true
    }

    /// A receiver that resolves to `true` when the connection is torn
    /// down. Used to bound every cross-task wait by the connection
    /// lifetime.
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Final teardown: settle the status and wake all waiters. Terminal
    /// statuses recorded earlier (who closed the connection) are kept.
    pub fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            if !state.status.is_terminal() {
                state.status = Status::Closed;
            }
        }

        self.closed.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(SessionOptions {
            binary: false,
            protocol: None,
            version: 13,
        })
    }

    #[test]
    fn test_begin_close_claims_once() {
        let session = session();
        session.set_status(Status::Connected);

        assert!(session.begin_close());
        assert_eq!(session.status(), Status::Closing);
        assert!(!session.begin_close());
        assert!(session.is_closing());
    }

    #[test]
    fn test_close_once_is_idempotent() {
        let session = session();
        session.set_status(Status::Connected);

        assert!(session.close_once());
        assert_eq!(session.status(), Status::Closed);
        assert!(!session.close_once());
    }

    #[test]
    fn test_shutdown_keeps_terminal_status() {
        let session = session();
        session.set_status(Status::ClosedByServer);
        session.shutdown();

        assert_eq!(session.status(), Status::ClosedByServer);
        assert!(*session.closed_signal().borrow());
    }
}

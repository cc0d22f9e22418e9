//! The WebSocket connection engine.
//!
//! One connection is one [`session::Session`] (lifecycle state shared by
//! every task touching the connection), one
//! [`forwarding::MessageForwarder`] (the task owning the socket) and one
//! relay queue ([`relay`]) through which every other task sends
//! client-bound messages.
//!
//! The flow: the forwarder reads raw bytes from the client and feeds
//! them to the [`framing::FrameReader`], which reassembles messages and
//! hands them to the [`forwarding::MessageSink`]; the database reader
//! task pushes its bytes back through a [`relay::RelaySender`], which
//! wakes the forwarder to perform the actual write. Only the forwarder
//! ever writes to the socket.

pub mod forwarding;
pub mod framing;
pub mod handshake;
pub mod relay;
pub mod session;

pub use self::{
    forwarding::{MessageForwarder, MessageSink},
    framing::{FrameReader, Incoming},
    relay::RelaySender,
    session::{Session, SessionOptions, Status},
};

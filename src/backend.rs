use crate::{
    config,
    statistics::{Stats, StatisticsReporter},
};

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use codec::frame::MessageType;
use service::{MessageSink, RelaySender, Session, Status};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time::timeout,
};

/// Open the per-connection TCP connection to the database server.
pub async fn connect(config: &config::Backend) -> io::Result<TcpStream> {
    let stream = timeout(
        Duration::from_secs(config.connect_timeout),
        TcpStream::connect(config.address),
    )
    .await
    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "backend connect timed out"))??;

    // Relayed messages should reach the database server as soon as they
    // are written.
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// The database side of a connection: completed client messages are
/// written to the server verbatim, the framing has already been peeled
/// off.
pub struct BackendSink {
    writer: OwnedWriteHalf,
    reporter: StatisticsReporter,
    address: SocketAddr,
}

impl BackendSink {
    pub fn new(writer: OwnedWriteHalf, reporter: StatisticsReporter, address: SocketAddr) -> Self {
        Self {
            writer,
            reporter,
            address,
        }
    }
}

impl MessageSink for BackendSink {
    async fn deliver(&mut self, _kind: MessageType, payload: &[u8]) -> io::Result<()> {
        self.writer.write_all(payload).await?;
        self.reporter.send(
            &self.address,
            &[
                Stats::ReceivedBytes(payload.len() as u64),
                Stats::ReceivedMessages(1),
            ],
        );

        Ok(())
    }
}

/// Forward whatever the database server produces to the client.
///
/// This task never writes to the client socket itself: every chunk goes
/// through the relay and is written by the connection task that owns the
/// socket. On EOF or error from the database side it starts the closing
/// handshake towards the client and exits.
pub async fn read_loop(
    mut reader: OwnedReadHalf,
    relay: RelaySender,
    session: Arc<Session>,
    reporter: StatisticsReporter,
    address: SocketAddr,
) {
    let mut data = [0u8; 4096];

    loop {
        match reader.read(&mut data).await {
            Ok(0) => {
                relay.send(MessageType::Close, Bytes::new()).await;
                break;
            }
            Ok(size) => {
                let kind = if session.binary {
                    MessageType::Binary
                } else {
                    MessageType::Text
                };

                let written = relay
                    .send(kind, Bytes::copy_from_slice(&data[..size]))
                    .await;

                if written > 0 {
                    reporter.send(
                        &address,
                        &[Stats::SendBytes(written as u64), Stats::SendMessages(1)],
                    );
                } else if session.is_closing() {
                    break;
                }
            }
            Err(err) => {
                log::error!("backend read failed: addr={:?}, err={}", address, err);

                session.set_status(Status::ClosedByServer);
                reporter.send(&address, &[Stats::ErrorFrames(1)]);
                relay.send(MessageType::Close, Bytes::new()).await;
                break;
            }
        }
    }
}

use crate::{
    backend::{self, BackendSink},
    config::Config,
    statistics::Statistics,
};

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use bytes::BytesMut;
use service::{
    MessageForwarder, Session, SessionOptions, Status,
    handshake::{self, HandshakeError},
    relay,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

static BAD_REQUEST: &[u8] =
    b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";
static BAD_GATEWAY: &[u8] =
    b"HTTP/1.1 502 Bad Gateway\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";

/// An upgrade request head has no business being this large.
const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// Start the gateway.
///
/// Binds every configured listen interface and spawns an accept loop for
/// each.
pub async fn run(config: Arc<Config>, statistics: Statistics) -> Result<()> {
    for bind in config.server.listen.clone() {
        let listener = TcpListener::bind(bind).await?;
        tokio::spawn(accept_loop(listener, config.clone(), statistics.clone()));

        log::info!(
            "gateway listening: addr={}, backend={}",
            bind,
            config.backend.address,
        );
    }

    Ok(())
}

/// Accept connections on one listener, one task per connection.
///
/// Public so integration tests can run the gateway on a listener they
/// bound themselves.
pub async fn accept_loop(listener: TcpListener, config: Arc<Config>, statistics: Statistics) {
    let local_addr = listener
        .local_addr()
        .expect("get tcp listener local addr failed!");

    while let Ok((socket, addr)) = listener.accept().await {
        log::info!(
            "client accept: addr={:?}, interface={:?}",
            addr,
            local_addr,
        );

        // Frames should reach the client as soon as they are written.
        if let Err(e) = socket.set_nodelay(true) {
            log::error!("tcp socket set nodelay failed!: addr={}, err={}", addr, e);
        }

        let config = config.clone();
        let statistics = statistics.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(socket, addr, config, &statistics).await {
                log::error!("client connection failed: addr={:?}, err={}", addr, err);
            }

            statistics.delete(&addr);
            log::info!("client disconnect: addr={:?}", addr);
        });
    }

    log::error!("tcp server close: interface={:?}", local_addr);
}

async fn handle_connection(
    mut socket: TcpStream,
    addr: SocketAddr,
    config: Arc<Config>,
    statistics: &Statistics,
) -> Result<()> {
    let (head, initial) = read_request_head(&mut socket).await?;
    let request = match handshake::parse(&head) {
        Ok(request) => request,
        Err(HandshakeError::NotAnUpgrade) => {
            // The gateway serves upgrades only; plain HTTP has nowhere
            // to go.
            socket.write_all(BAD_REQUEST).await?;
            return Ok(());
        }
        Err(err) => {
            socket.write_all(BAD_REQUEST).await?;
            return Err(err.into());
        }
    };

    log::info!(
        "websocket upgrade: addr={:?}, path={}, version={}",
        addr,
        request.path,
        request.version,
    );

    // The client is only answered once the database side exists; a
    // refused backend connection must not leave an upgraded socket
    // behind.
    let upstream = match backend::connect(&config.backend).await {
        Ok(stream) => stream,
        Err(err) => {
            socket.write_all(BAD_GATEWAY).await?;
            return Err(err.into());
        }
    };

    let (response, protocol) = handshake::response(&request);
    let session = Arc::new(Session::new(SessionOptions {
        binary: config.backend.binary,
        protocol,
        version: request.version,
    }));

    socket.write_all(response.as_bytes()).await?;
    session.set_status(Status::HeadersSent);
    statistics.set(addr);

    let (upstream_reader, upstream_writer) = upstream.into_split();
    let (relay, queue) = relay::channel(session.clone());
    let reporter = statistics.get_reporter();

    let database_reader = tokio::spawn(backend::read_loop(
        upstream_reader,
        relay,
        session.clone(),
        reporter.clone(),
        addr,
    ));

    let sink = BackendSink::new(upstream_writer, reporter, addr);
    let forwarder = MessageForwarder::new(
        session,
        socket,
        sink,
        queue,
        config.server.max_payload_size,
    )
    .with_initial(initial);

    let result = forwarder.run().await;

    // The database reader would otherwise sit in its read until the
    // server next speaks on a connection nobody listens to anymore.
    database_reader.abort();

    Ok(result?)
}

/// Read the HTTP request head, up to and including the blank line. Bytes
/// past the head already read from the socket are returned alongside:
/// they belong to the frame stream.
async fn read_request_head(socket: &mut TcpStream) -> Result<(String, BytesMut)> {
    let mut buf = BytesMut::with_capacity(1024);

    loop {
        if let Some(end) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
            let head = buf.split_to(end + 4);
            return Ok((String::from_utf8_lossy(&head).into_owned(), buf));
        }

        if buf.len() > MAX_REQUEST_HEAD {
            anyhow::bail!("request head too large");
        }

        if socket.read_buf(&mut buf).await? == 0 {
            anyhow::bail!("connection closed before the request head completed");
        }
    }
}

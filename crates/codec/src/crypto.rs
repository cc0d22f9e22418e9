use aws_lc_rs::digest;
use base64::{Engine, engine::general_purpose::STANDARD};

/// Fixed GUID appended to the client key when computing the handshake
/// accept token, per RFC 6455 section 4.2.2.
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Compute the `Sec-WebSocket-Accept` token for a client key.
///
/// > Sec-WebSocket-Accept = base64(SHA-1(Sec-WebSocket-Key + GUID))
///
/// # Test
///
/// ```
/// use wsgate_server_codec::crypto::websocket_accept;
///
/// // The sample handshake from RFC 6455 section 1.3.
/// assert_eq!(
///     websocket_accept("dGhlIHNhbXBsZSBub25jZQ=="),
///     "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=",
/// );
/// ```
pub fn websocket_accept(key: &str) -> String {
    let mut ctx = digest::Context::new(&digest::SHA1_FOR_LEGACY_USE_ONLY);
    ctx.update(key.trim().as_bytes());
    ctx.update(WEBSOCKET_GUID.as_bytes());
    STANDARD.encode(ctx.finish().as_ref())
}

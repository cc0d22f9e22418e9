use wsgate_server_service::handshake::{HandshakeError, parse, response};

fn sample_head() -> String {
    [
        "GET /ws/chat HTTP/1.1",
        "Host: server.example.com",
        "Upgrade: websocket",
        "Connection: Upgrade",
        "Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==",
        "Sec-WebSocket-Version: 13",
        "",
    ]
    .join("\r\n")
}

#[test]
fn test_parse_upgrade_request() {
    let request = parse(&sample_head()).unwrap();

    assert_eq!(request.path, "/ws/chat");
    assert_eq!(request.host, "server.example.com");
    assert_eq!(request.key, "dGhlIHNhbXBsZSBub25jZQ==");
    assert_eq!(request.version, 13);
    assert!(request.protocols.is_empty());
}

#[test]
fn test_connection_header_token_list() {
    // Firefox style: upgrade is one token among several, mixed case.
    let head = sample_head().replace(
        "Connection: Upgrade",
        "Connection: keep-alive, Upgrade",
    );

    assert!(parse(&head).is_ok());
}

#[test]
fn test_plain_request_is_not_an_upgrade() {
    let head = "GET /status HTTP/1.1\r\nHost: server.example.com\r\n";
    assert_eq!(parse(head), Err(HandshakeError::NotAnUpgrade));

    let head = sample_head().replace("GET", "POST");
    assert_eq!(parse(&head), Err(HandshakeError::NotAnUpgrade));

    let head = sample_head().replace("Connection: Upgrade", "Connection: keep-alive");
    assert_eq!(parse(&head), Err(HandshakeError::NotAnUpgrade));
}

#[test]
fn test_missing_key_is_a_bad_request() {
    let head = sample_head().replace("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==", "X: y");
    assert_eq!(parse(&head), Err(HandshakeError::BadRequest));
}

#[test]
fn test_unsupported_version_is_rejected() {
    let head = sample_head().replace("Version: 13", "Version: 11");
    assert_eq!(parse(&head), Err(HandshakeError::UnsupportedVersion(11)));

    for version in ["7", "8"] {
        let head = sample_head().replace("Version: 13", &format!("Version: {}", version));
        assert!(parse(&head).is_ok(), "version={}", version);
    }
}

#[test]
fn test_first_offered_protocol_wins() {
    let head = sample_head().replace(
        "Sec-WebSocket-Version: 13",
        "Sec-WebSocket-Version: 13\r\nSec-WebSocket-Protocol: chat, superchat",
    );

    let request = parse(&head).unwrap();
    assert_eq!(request.protocols, vec!["chat", "superchat"]);
    assert_eq!(request.select_protocol(), Some("chat"));

    let (bytes, protocol) = response(&request);
    assert_eq!(protocol.as_deref(), Some("chat"));
    assert!(bytes.contains("Sec-WebSocket-Protocol: chat\r\n"));
}

#[test]
fn test_response_carries_the_accept_token() {
    let request = parse(&sample_head()).unwrap();
    let (bytes, protocol) = response(&request);

    // The worked example from RFC 6455 section 1.3.
    assert!(bytes.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(bytes.contains("Upgrade: websocket\r\n"));
    assert!(bytes.contains("Connection: Upgrade\r\n"));
    assert!(bytes.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
    assert!(bytes.ends_with("\r\n\r\n"));
    assert_eq!(protocol, None);
}

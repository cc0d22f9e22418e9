use codec::crypto::websocket_accept;

/// Protocol versions the gateway accepts, per the `Sec-WebSocket-Version`
/// header. 13 is the RFC 6455 version; 7 and 8 are the late drafts that
/// share its framing.
const SUPPORTED_VERSIONS: [i32; 3] = [7, 8, 13];

#[derive(Debug, PartialEq, Eq)]
pub enum HandshakeError {
    /// A plain HTTP request, not a WebSocket upgrade.
    NotAnUpgrade,
    /// An upgrade attempt with a malformed or incomplete header set.
    BadRequest,
    UnsupportedVersion(i32),
}

impl std::error::Error for HandshakeError {}

impl std::fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The upgrade request, reduced to the fields the gateway acts on.
#[derive(Debug, PartialEq, Eq)]
pub struct UpgradeRequest {
    pub path: String,
    pub host: String,
    pub key: String,
    pub protocols: Vec<String>,
    pub version: i32,
}

impl UpgradeRequest {
    /// The sub-protocol to accept. The first protocol the client offered
    /// wins; the gateway itself attaches no meaning to the name.
    pub fn select_protocol(&self) -> Option<&str> {
        self.protocols.first().map(|protocol| protocol.as_str())
    }
}

/// Parse an HTTP request head (everything up to the blank line) and
/// decide whether it is a WebSocket upgrade the gateway can accept.
pub fn parse(head: &str) -> Result<UpgradeRequest, HandshakeError> {
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or(HandshakeError::BadRequest)?;

    let mut parts = request_line.split_ascii_whitespace();
    let method = parts.next().ok_or(HandshakeError::BadRequest)?;
    let path = parts.next().ok_or(HandshakeError::BadRequest)?;
    if method != "GET" {
        return Err(HandshakeError::NotAnUpgrade);
    }

    let mut upgrade = None;
    let mut connection = None;
    let mut host = None;
    let mut key = None;
    let mut protocols = Vec::new();
    let mut version = 0;

    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };

        let value = value.trim();
        match name.to_ascii_lowercase().as_str() {
            "upgrade" => upgrade = Some(value.to_ascii_lowercase()),
            "connection" => connection = Some(value.to_ascii_lowercase()),
            "host" => host = Some(value.to_string()),
            "sec-websocket-key" => key = Some(value.to_string()),
            "sec-websocket-version" => version = value.parse().unwrap_or(0),
            "sec-websocket-protocol" => {
                protocols.extend(
                    value
                        .split([',', ' ', '\t'])
                        .filter(|protocol| !protocol.is_empty())
                        .map(|protocol| protocol.to_string()),
                );
            }
            _ => {}
        }
    }

    if upgrade.as_deref() != Some("websocket") {
        return Err(HandshakeError::NotAnUpgrade);
    }

    // `Connection` is a comma separated token list; "upgrade" has to be
    // one of the tokens, not necessarily the whole value.
    let upgrade_connection = connection
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(|token| {
            let token = token.trim();
            let token = token.split_once(' ').map(|(t, _)| t).unwrap_or(token);
            token.split_once(';').map(|(t, _)| t).unwrap_or(token)
        })
        .any(|token| token == "upgrade");

    if !upgrade_connection {
        return Err(HandshakeError::NotAnUpgrade);
    }

    let host = host.filter(|host| !host.is_empty());
    let key = key.filter(|key| !key.is_empty());
    let (Some(host), Some(key)) = (host, key) else {
        return Err(HandshakeError::BadRequest);
    };

    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(HandshakeError::UnsupportedVersion(version));
    }

    Ok(UpgradeRequest {
        path: path.to_string(),
        host,
        key,
        protocols,
        version,
    })
}

/// Build the `101 Switching Protocols` response for an accepted upgrade.
/// Returns the response bytes and the sub-protocol that was granted, if
/// any.
pub fn response(request: &UpgradeRequest) -> (String, Option<String>) {
    let accept = websocket_accept(&request.key);
    let protocol = request.select_protocol().map(|protocol| protocol.to_string());

    let mut response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n",
        accept,
    );

    if let Some(protocol) = &protocol {
        response.push_str("Sec-WebSocket-Protocol: ");
        response.push_str(protocol);
        response.push_str("\r\n");
    }

    response.push_str("\r\n");
    (response, protocol)
}

//! Wire format
//!
//! The protocol is unframed: one read on the socket is treated as one message.
//! The first client message is the handshake, `USERNAME` immediately followed
//! by the username bytes. Every later client message is relayed verbatim,
//! prefixed with the sender's username.

/// Literal that opens the handshake payload
pub const HANDSHAKE_MARKER: &[u8] = b"USERNAME";

/// Size of the per-connection read buffer
pub const READ_BUFFER_SIZE: usize = 1024;

/// Largest payload a single read may yield (one byte of the buffer stays reserved)
pub const MAX_READ: usize = READ_BUFFER_SIZE - 1;

/// Prefix for server-generated notices
const SYSTEM_PREFIX: &str = "system: ";

/// Build the handshake payload sent by a client right after connecting
pub fn encode_handshake(username: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(HANDSHAKE_MARKER.len() + username.len());
    payload.extend_from_slice(HANDSHAKE_MARKER);
    payload.extend_from_slice(username.as_bytes());
    payload
}

/// Extract the username from a handshake payload
///
/// Returns None if the payload does not start with the marker. The remainder
/// is taken verbatim; it may be empty.
pub fn parse_handshake(payload: &[u8]) -> Option<String> {
    payload
        .strip_prefix(HANDSHAKE_MARKER)
        .map(|name| String::from_utf8_lossy(name).into_owned())
}

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Chat payload relayed from another client
    Chat { from: String, content: Vec<u8> },
    /// A client completed the handshake
    Joined { username: String },
    /// A client that had completed the handshake disconnected
    Left { username: String },
}

impl ServerMessage {
    /// Encode to the bytes written on the wire
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ServerMessage::Chat { from, content } => {
                let mut bytes = Vec::with_capacity(from.len() + 2 + content.len());
                bytes.extend_from_slice(from.as_bytes());
                bytes.extend_from_slice(b": ");
                bytes.extend_from_slice(content);
                bytes
            }
            ServerMessage::Joined { username } => {
                format!("{SYSTEM_PREFIX}{username} joined the chat").into_bytes()
            }
            ServerMessage::Left { username } => {
                format!("{SYSTEM_PREFIX}{username} left the chat").into_bytes()
            }
        }
    }
}

impl std::fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.to_bytes()))
    }
}

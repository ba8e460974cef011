//! Client record
//!
//! Server-side state for one connected peer: its id, username and the
//! sending half of its outbound queue.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::ClientId;

/// Connected client information
///
/// The record holds the only sender for the client's outbound queue. Dropping
/// the record closes the queue, which lets the writer task shut down the
/// transport's write half.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this client
    pub id: ClientId,
    /// Username (empty until the handshake completes)
    pub username: String,
    /// Server → Client message channel
    sender: mpsc::Sender<ServerMessage>,
}

impl Client {
    /// Create a new client with the given ID and sender channel
    pub fn new(id: ClientId, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            username: String::new(),
            sender,
        }
    }

    /// Queue a message for this client
    ///
    /// Waits while the queue is full. Returns an error if the writer is gone.
    pub async fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Check if this client has completed the handshake with a name
    pub fn has_username(&self) -> bool {
        !self.username.is_empty()
    }

    /// Record the username from the handshake
    ///
    /// Only the first call takes effect; the name is fixed afterwards.
    pub fn set_username(&mut self, username: String) -> bool {
        if self.has_username() {
            return false;
        }
        self.username = username;
        true
    }
}

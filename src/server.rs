//! ChatServer Actor implementation
//!
//! The registry of connected clients and the broadcast engine.
//! All registry access goes through one task processing `ServerCommand`s in
//! order, so a broadcast never observes a half-applied connect or disconnect.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::client::Client;
use crate::message::ServerMessage;
use crate::types::ClientId;

/// Commands sent from the acceptor and session handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New client accepted
    Connect {
        client_id: ClientId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Handshake completed
    SetUsername {
        client_id: ClientId,
        username: String,
    },
    /// Relay a chat payload from a client to everyone else
    Chat {
        client_id: ClientId,
        content: Vec<u8>,
    },
    /// Deliver a message to every client except `exclude`
    Broadcast {
        message: ServerMessage,
        exclude: Option<ClientId>,
    },
    /// Session ended. A no-op if the client is already gone.
    Disconnect {
        client_id: ClientId,
    },
    /// Number of registered clients
    ClientCount {
        reply: oneshot::Sender<usize>,
    },
    /// Drop every registered client, replying with how many there were
    Shutdown {
        reply: oneshot::Sender<usize>,
    },
}

/// The main ChatServer actor
///
/// Owns every `Client` record. A record leaves the map exactly once, either
/// on `Disconnect` or on `Shutdown`, and dropping it closes that client's
/// outbound queue.
pub struct ChatServer {
    /// All connected clients: ClientId -> Client
    clients: HashMap<ClientId, Client>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            clients: HashMap::new(),
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { client_id, sender } => {
                self.handle_connect(client_id, sender);
            }
            ServerCommand::SetUsername { client_id, username } => {
                self.handle_set_username(client_id, username).await;
            }
            ServerCommand::Chat { client_id, content } => {
                self.handle_chat(client_id, content).await;
            }
            ServerCommand::Broadcast { message, exclude } => {
                self.broadcast(&message, exclude).await;
            }
            ServerCommand::Disconnect { client_id } => {
                self.handle_disconnect(client_id).await;
            }
            ServerCommand::ClientCount { reply } => {
                let _ = reply.send(self.clients.len());
            }
            ServerCommand::Shutdown { reply } => {
                let closed = self.handle_shutdown();
                let _ = reply.send(closed);
            }
        }
    }

    /// Handle new client connection
    fn handle_connect(&mut self, client_id: ClientId, sender: mpsc::Sender<ServerMessage>) {
        self.clients.insert(client_id, Client::new(client_id, sender));
        debug!(
            "Client {} registered, total clients: {}",
            client_id,
            self.clients.len()
        );
    }

    /// Handle a completed handshake: record the name and announce it to everyone
    async fn handle_set_username(&mut self, client_id: ClientId, username: String) {
        let Some(client) = self.clients.get_mut(&client_id) else {
            return;
        };

        if !client.set_username(username.clone()) {
            debug!("Client {} already named '{}'", client_id, client.username);
            return;
        }
        info!("Client {} set username to '{}'", client_id, username);

        let notice = ServerMessage::Joined { username };
        info!("{}", notice);
        self.broadcast(&notice, None).await;
    }

    /// Handle chat message
    async fn handle_chat(&mut self, client_id: ClientId, content: Vec<u8>) {
        let Some(client) = self.clients.get(&client_id) else {
            return;
        };

        let msg = ServerMessage::Chat {
            from: client.username.clone(),
            content,
        };
        info!("{}", msg);
        self.broadcast(&msg, Some(client_id)).await;
    }

    /// Handle client disconnection
    ///
    /// Dropping the removed record closes its queue. Only clients that
    /// completed the handshake get a leave notice.
    async fn handle_disconnect(&mut self, client_id: ClientId) {
        let Some(client) = self.clients.remove(&client_id) else {
            debug!("Client {} already unregistered", client_id);
            return;
        };

        info!(
            "Client {} ('{}') unregistered, total clients: {}",
            client_id,
            client.username,
            self.clients.len()
        );

        if client.has_username() {
            let notice = ServerMessage::Left {
                username: client.username.clone(),
            };
            drop(client);
            self.broadcast(&notice, None).await;
        }
    }

    /// Drop every record, closing all outbound queues
    fn handle_shutdown(&mut self) -> usize {
        let closed = self.clients.len();
        self.clients.clear();
        info!("Closed {} client connection(s) for shutdown", closed);
        closed
    }

    /// Queue `msg` for every registered client except `exclude`
    ///
    /// A closed queue does not stop delivery to the rest. Returns how many
    /// clients accepted the message.
    async fn broadcast(&self, msg: &ServerMessage, exclude: Option<ClientId>) -> usize {
        let mut delivered = 0;
        for (id, client) in &self.clients {
            if Some(*id) == exclude {
                continue;
            }
            match client.send(msg.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Dropping message for {}: {}", id, e),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    fn spawn_server() -> mpsc::Sender<ServerCommand> {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(ChatServer::new(rx).run());
        tx
    }

    async fn connect(
        cmd_tx: &mpsc::Sender<ServerCommand>,
    ) -> (ClientId, mpsc::Receiver<ServerMessage>) {
        let client_id = ClientId::new();
        let (sender, rx) = mpsc::channel(32);
        cmd_tx
            .send(ServerCommand::Connect { client_id, sender })
            .await
            .unwrap();
        (client_id, rx)
    }

    async fn count(cmd_tx: &mpsc::Sender<ServerCommand>) -> usize {
        let (reply, rx) = oneshot::channel();
        cmd_tx.send(ServerCommand::ClientCount { reply }).await.unwrap();
        rx.await.unwrap()
    }

    async fn next(rx: &mut mpsc::Receiver<ServerMessage>) -> Option<ServerMessage> {
        timeout(Duration::from_secs(1), rx.recv()).await.ok().flatten()
    }

    fn no_pending(rx: &mut mpsc::Receiver<ServerMessage>) -> bool {
        matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Empty))
    }

    #[tokio::test]
    async fn test_register_then_unregister_twice() {
        let cmd_tx = spawn_server();
        assert_eq!(count(&cmd_tx).await, 0);

        let (client_id, mut rx) = connect(&cmd_tx).await;
        assert_eq!(count(&cmd_tx).await, 1);

        cmd_tx.send(ServerCommand::Disconnect { client_id }).await.unwrap();
        cmd_tx.send(ServerCommand::Disconnect { client_id }).await.unwrap();
        assert_eq!(count(&cmd_tx).await, 0);

        // Record dropped: queue closed, nothing delivered
        assert_eq!(next(&mut rx).await, None);
    }

    #[tokio::test]
    async fn test_join_notice_reaches_everyone() {
        let cmd_tx = spawn_server();
        let (alice, mut alice_rx) = connect(&cmd_tx).await;
        let (_bob, mut bob_rx) = connect(&cmd_tx).await;

        cmd_tx
            .send(ServerCommand::SetUsername {
                client_id: alice,
                username: "alice".to_string(),
            })
            .await
            .unwrap();

        let expected = ServerMessage::Joined {
            username: "alice".to_string(),
        };
        assert_eq!(next(&mut alice_rx).await, Some(expected.clone()));
        assert_eq!(next(&mut bob_rx).await, Some(expected));
    }

    #[tokio::test]
    async fn test_chat_excludes_sender() {
        let cmd_tx = spawn_server();
        let (alice, mut alice_rx) = connect(&cmd_tx).await;
        let (_bob, mut bob_rx) = connect(&cmd_tx).await;
        let (_carol, mut carol_rx) = connect(&cmd_tx).await;

        cmd_tx
            .send(ServerCommand::SetUsername {
                client_id: alice,
                username: "alice".to_string(),
            })
            .await
            .unwrap();
        for rx in [&mut alice_rx, &mut bob_rx, &mut carol_rx] {
            assert!(matches!(next(rx).await, Some(ServerMessage::Joined { .. })));
        }

        cmd_tx
            .send(ServerCommand::Chat {
                client_id: alice,
                content: b"hi".to_vec(),
            })
            .await
            .unwrap();

        let expected = ServerMessage::Chat {
            from: "alice".to_string(),
            content: b"hi".to_vec(),
        };
        assert_eq!(next(&mut bob_rx).await, Some(expected.clone()));
        assert_eq!(next(&mut carol_rx).await, Some(expected));

        // Barrier: once the count is answered the chat command has been handled
        count(&cmd_tx).await;
        assert!(no_pending(&mut alice_rx));
    }

    #[tokio::test]
    async fn test_broadcast_excludes_exactly_one() {
        let cmd_tx = spawn_server();
        let mut clients = Vec::new();
        for _ in 0..5 {
            clients.push(connect(&cmd_tx).await);
        }
        let excluded = clients[2].0;

        let message = ServerMessage::Joined {
            username: "x".to_string(),
        };
        cmd_tx
            .send(ServerCommand::Broadcast {
                message: message.clone(),
                exclude: Some(excluded),
            })
            .await
            .unwrap();
        count(&cmd_tx).await;

        for (id, rx) in clients.iter_mut() {
            if *id == excluded {
                assert!(no_pending(rx));
            } else {
                assert_eq!(rx.try_recv().ok(), Some(message.clone()));
            }
        }
    }

    #[tokio::test]
    async fn test_closed_recipient_does_not_block_others() {
        let cmd_tx = spawn_server();
        let (_gone, gone_rx) = connect(&cmd_tx).await;
        let (_alive, mut alive_rx) = connect(&cmd_tx).await;
        drop(gone_rx);

        let message = ServerMessage::Left {
            username: "zed".to_string(),
        };
        cmd_tx
            .send(ServerCommand::Broadcast {
                message: message.clone(),
                exclude: None,
            })
            .await
            .unwrap();

        assert_eq!(next(&mut alive_rx).await, Some(message));
        // Failed delivery does not unregister the client
        assert_eq!(count(&cmd_tx).await, 2);
    }

    #[tokio::test]
    async fn test_leave_notice_only_after_handshake() {
        let cmd_tx = spawn_server();
        let (anon, _anon_rx) = connect(&cmd_tx).await;
        let (named, _named_rx) = connect(&cmd_tx).await;
        let (_watcher, mut watcher_rx) = connect(&cmd_tx).await;

        cmd_tx
            .send(ServerCommand::SetUsername {
                client_id: named,
                username: "bob".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(next(&mut watcher_rx).await, Some(ServerMessage::Joined { .. })));

        cmd_tx.send(ServerCommand::Disconnect { client_id: anon }).await.unwrap();
        count(&cmd_tx).await;
        assert!(no_pending(&mut watcher_rx));

        cmd_tx.send(ServerCommand::Disconnect { client_id: named }).await.unwrap();
        assert_eq!(
            next(&mut watcher_rx).await,
            Some(ServerMessage::Left {
                username: "bob".to_string()
            })
        );

        // A second disconnect produces no second notice
        cmd_tx.send(ServerCommand::Disconnect { client_id: named }).await.unwrap();
        count(&cmd_tx).await;
        assert!(no_pending(&mut watcher_rx));
    }

    #[tokio::test]
    async fn test_username_is_immutable() {
        let cmd_tx = spawn_server();
        let (alice, mut alice_rx) = connect(&cmd_tx).await;
        let (_bob, mut bob_rx) = connect(&cmd_tx).await;

        for name in ["alice", "mallory"] {
            cmd_tx
                .send(ServerCommand::SetUsername {
                    client_id: alice,
                    username: name.to_string(),
                })
                .await
                .unwrap();
        }
        assert!(matches!(next(&mut alice_rx).await, Some(ServerMessage::Joined { .. })));

        cmd_tx
            .send(ServerCommand::Chat {
                client_id: alice,
                content: b"hey".to_vec(),
            })
            .await
            .unwrap();

        assert!(matches!(next(&mut bob_rx).await, Some(ServerMessage::Joined { .. })));
        assert_eq!(
            next(&mut bob_rx).await,
            Some(ServerMessage::Chat {
                from: "alice".to_string(),
                content: b"hey".to_vec()
            })
        );
    }

    #[tokio::test]
    async fn test_shutdown_clears_registry() {
        let cmd_tx = spawn_server();
        let (_a, mut a_rx) = connect(&cmd_tx).await;
        let (_b, mut b_rx) = connect(&cmd_tx).await;

        let (reply, rx) = oneshot::channel();
        cmd_tx.send(ServerCommand::Shutdown { reply }).await.unwrap();
        assert_eq!(rx.await.unwrap(), 2);
        assert_eq!(count(&cmd_tx).await, 0);

        assert_eq!(next(&mut a_rx).await, None);
        assert_eq!(next(&mut b_rx).await, None);
    }

    #[tokio::test]
    async fn test_commands_for_unknown_client_are_ignored() {
        let cmd_tx = spawn_server();
        let (_watcher, mut watcher_rx) = connect(&cmd_tx).await;
        let ghost = ClientId::new();

        cmd_tx
            .send(ServerCommand::Chat {
                client_id: ghost,
                content: b"boo".to_vec(),
            })
            .await
            .unwrap();
        cmd_tx
            .send(ServerCommand::SetUsername {
                client_id: ghost,
                username: "ghost".to_string(),
            })
            .await
            .unwrap();
        count(&cmd_tx).await;

        assert!(no_pending(&mut watcher_rx));
    }
}

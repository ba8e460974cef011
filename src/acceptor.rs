//! Connection acceptor
//!
//! Binds the listening socket, spawns the ChatServer actor, and runs the
//! accept loop that registers each connection and hands it to its own
//! session task. `ServerHandle::stop` ends the loop and every session.

use std::net::SocketAddr;

use futures_util::future::join_all;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::lifecycle::Lifecycle;
use crate::server::{ChatServer, ServerCommand};
use crate::types::ClientId;

/// Cloneable control handle for a running server
#[derive(Debug, Clone)]
pub struct ServerHandle {
    cmd_tx: mpsc::Sender<ServerCommand>,
    lifecycle: Lifecycle,
    local_addr: SocketAddr,
}

impl ServerHandle {
    /// Stop accepting, then close every registered client
    ///
    /// Safe to call more than once and from any task.
    pub async fn stop(&self) {
        if self.lifecycle.stop() {
            info!("Stopping chat server");
        }

        let (reply, closed) = oneshot::channel();
        if self
            .cmd_tx
            .send(ServerCommand::Shutdown { reply })
            .await
            .is_err()
        {
            return;
        }
        if let Ok(count) = closed.await {
            debug!("Shutdown closed {} client(s)", count);
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Number of clients currently in the registry
    pub async fn client_count(&self) -> Result<usize, AppError> {
        let (reply, count) = oneshot::channel();
        self.cmd_tx
            .send(ServerCommand::ClientCount { reply })
            .await
            .map_err(|_| AppError::ChannelSend)?;
        count.await.map_err(|_| AppError::ChannelSend)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// The accept loop and everything it owns
pub struct Acceptor {
    listener: TcpListener,
    config: ServerConfig,
    cmd_tx: mpsc::Sender<ServerCommand>,
    lifecycle: Lifecycle,
    local_addr: SocketAddr,
}

impl Acceptor {
    /// Bind the listening socket and start the ChatServer actor
    pub async fn bind(config: ServerConfig) -> Result<Self, AppError> {
        let addr = config.bind_addr().await?;
        let listener =
            listen(addr, config.backlog).map_err(|source| AppError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        info!("Chat server listening on {}", local_addr);

        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity);
        tokio::spawn(ChatServer::new(cmd_rx).run());

        Ok(Self {
            listener,
            config,
            cmd_tx,
            lifecycle: Lifecycle::new(),
            local_addr,
        })
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            cmd_tx: self.cmd_tx.clone(),
            lifecycle: self.lifecycle.clone(),
            local_addr: self.local_addr,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the server is stopped
    ///
    /// Returns after the listener is closed and every session task finished.
    pub async fn run(self) -> Result<(), AppError> {
        if !self.lifecycle.start() {
            warn!("Chat server was stopped before it started");
            return Ok(());
        }
        info!("Chat server running");

        let mut sessions: Vec<JoinHandle<()>> = Vec::new();

        loop {
            let accepted = tokio::select! {
                _ = self.lifecycle.stopped() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer_addr)) => {
                    sessions.retain(|session| !session.is_finished());
                    match self.spawn_session(stream, peer_addr).await {
                        Ok(session) => sessions.push(session),
                        Err(e) => {
                            error!("Could not register {}: {}", peer_addr, e);
                            break;
                        }
                    }
                }
                Err(e) if self.lifecycle.is_running() => {
                    error!("Failed to accept connection: {}", e);
                }
                Err(_) => break,
            }
        }

        let Acceptor { listener, cmd_tx, .. } = self;
        drop(listener);
        drop(cmd_tx);
        info!("Listener closed, waiting for {} session(s)", sessions.len());

        join_all(sessions).await;
        info!("Chat server stopped");
        Ok(())
    }

    /// Register a freshly accepted connection and spawn its session
    async fn spawn_session(
        &self,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<JoinHandle<()>, AppError> {
        let client_id = ClientId::new();
        info!("New connection from {} as {}", peer_addr, client_id);

        let (sender, outbound) = mpsc::channel(self.config.queue_capacity);
        self.cmd_tx
            .send(ServerCommand::Connect { client_id, sender })
            .await
            .map_err(|_| AppError::ChannelSend)?;

        let cmd_tx = self.cmd_tx.clone();
        let lifecycle = self.lifecycle.clone();
        Ok(tokio::spawn(async move {
            let result = handle_connection(stream, client_id, outbound, cmd_tx, lifecycle).await;
            if let Err(e) = result {
                error!("Connection handler error for {}: {}", client_id, e);
            }
        }))
    }
}

/// Create a listening socket with SO_REUSEADDR and the given backlog
fn listen(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

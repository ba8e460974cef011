//! Error types for the chat server and client
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use std::net::SocketAddr;

use thiserror::Error;

/// Application-level errors
///
/// Startup errors (bind, resolve, connect) are fatal to the process.
/// Everything else is local to one connection and only ever logged.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error on an established transport
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not bind or listen on the configured address (fatal)
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Host name did not resolve to any address (fatal)
    #[error("Could not resolve address: {0}")]
    Resolve(String),

    /// Could not connect to the chat server (fatal)
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Registry command channel closed (fatal - registry task is gone)
    #[error("Channel send error")]
    ChannelSend,
}

/// Message send errors
///
/// Occurs when attempting to queue a message for a client whose writer is gone.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}

//! Multi-client TCP Chat Library
//!
//! A small chat relay over raw TCP. Clients connect, name themselves with a
//! `USERNAME<name>` handshake, and every later read is relayed to all other
//! clients as `<name>: <bytes>`.
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the actor owning the client registry and doing broadcasts
//! - `Acceptor` accepts connections and spawns one `handler` task per client
//! - A writer task per client drains its outbound queue to the socket
//! - `Lifecycle` is the shared run state; `ServerHandle::stop` ends everything
//!
//! # Example
//! ```ignore
//! use tcp_chat::{Acceptor, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tcp_chat::AppError> {
//!     let acceptor = Acceptor::bind(ServerConfig::default()).await?;
//!     let handle = acceptor.handle();
//!
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         handle.stop().await;
//!     });
//!
//!     acceptor.run().await
//! }
//! ```

pub mod acceptor;
pub mod chat_client;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod message;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use acceptor::{Acceptor, ServerHandle};
pub use chat_client::ChatClient;
pub use client::Client;
pub use config::{ClientConfig, ServerConfig};
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use lifecycle::{Lifecycle, RunState};
pub use message::ServerMessage;
pub use server::{ChatServer, ServerCommand};
pub use types::ClientId;

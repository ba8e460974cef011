//! Command line configuration for the server and client binaries

use std::net::SocketAddr;

use clap::Parser;

use crate::error::AppError;

/// Default chat port shared by server and client
pub const DEFAULT_PORT: u16 = 8080;

/// Server settings
#[derive(Debug, Clone, Parser)]
#[command(name = "tcp_chat_server")]
#[command(about = "Multi-client TCP chat relay")]
pub struct ServerConfig {
    /// Interface to listen on (all interfaces by default)
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// TCP port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Pending connection backlog passed to listen(2)
    #[arg(long, default_value_t = 10)]
    pub backlog: u32,

    /// Outbound messages buffered per client before broadcasts wait on it
    #[arg(long, default_value_t = 32)]
    pub queue_capacity: usize,

    /// Commands buffered for the registry task
    #[arg(long, default_value_t = 256)]
    pub command_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            backlog: 10,
            queue_capacity: 32,
            command_capacity: 256,
        }
    }
}

impl ServerConfig {
    /// Resolve `host:port` to the first matching socket address
    pub async fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        let target = format!("{}:{}", self.host, self.port);
        let mut addrs = tokio::net::lookup_host(target.clone())
            .await
            .map_err(|_| AppError::Resolve(target.clone()))?;
        addrs.next().ok_or(AppError::Resolve(target))
    }
}

/// Client settings
///
/// Server and username are prompted for on stdin when not given.
#[derive(Debug, Clone, Parser)]
#[command(name = "tcp_chat_client")]
#[command(about = "Terminal client for the TCP chat relay")]
pub struct ClientConfig {
    /// Server IP address
    #[arg(short, long)]
    pub server: Option<String>,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Name shown to other participants
    #[arg(short, long)]
    pub username: Option<String>,
}

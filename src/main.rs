//! TCP Chat Server - Entry Point
//!
//! Binds the listener, starts the ChatServer actor, and accepts connections
//! until Ctrl+C.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tcp_chat::{Acceptor, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=tcp_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tcp_chat=info")),
        )
        .init();

    let config = ServerConfig::parse();

    let acceptor = match Acceptor::bind(config).await {
        Ok(acceptor) => acceptor,
        Err(e) => {
            error!("Server startup failed: {}", e);
            return Err(e.into());
        }
    };
    info!(
        "Chat server ready on {}, press Ctrl+C to stop",
        acceptor.local_addr()
    );

    let handle = acceptor.handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping server");
                handle.stop().await;
            }
            Err(e) => error!("Could not listen for Ctrl+C: {}", e),
        }
    });

    acceptor.run().await?;
    info!("Server stopped");
    Ok(())
}

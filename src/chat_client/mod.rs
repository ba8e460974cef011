//! Chat client
//!
//! Connects to the server, sends the username handshake, then runs an
//! `OutputReceiver` task printing everything the server relays while an
//! `InputSender` forwards local input lines. Both stop once the shared
//! `connected` flag clears.

pub mod input_sender;
pub mod output_receiver;

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::AppError;
use crate::message::encode_handshake;

pub use input_sender::InputSender;
pub use output_receiver::OutputReceiver;

/// Line that ends the local session
pub const QUIT_COMMAND: &str = "quit";

pub struct ChatClient<R, W> {
    read: Option<R>,
    write: W,
    connected: Arc<watch::Sender<bool>>,
    receive_output: Option<JoinHandle<()>>,
}

impl ChatClient<OwnedReadHalf, OwnedWriteHalf> {
    /// Open a TCP connection to the chat server
    pub async fn connect(server: &str, port: u16) -> Result<Self, AppError> {
        let stream = TcpStream::connect((server, port))
            .await
            .map_err(|source| AppError::Connect {
                addr: format!("{server}:{port}"),
                source,
            })?;
        info!("Connected to server {}:{}", server, port);

        let (read, write) = stream.into_split();
        Ok(Self::new(read, write))
    }
}

impl<R, W> ChatClient<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    pub fn new(read: R, write: W) -> Self {
        let (connected, _) = watch::channel(true);
        Self {
            read: Some(read),
            write,
            connected: Arc::new(connected),
            receive_output: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Send the handshake that names this client
    pub async fn set_username(&mut self, username: &str) -> Result<(), AppError> {
        self.write.write_all(&encode_handshake(username)).await?;
        debug!("Sent handshake for '{}'", username);
        Ok(())
    }

    /// Chat until the user quits, input ends, or the server goes away
    ///
    /// Received messages are written to `output`; local lines come from `input`.
    pub async fn run<I, O>(&mut self, input: I, output: O) -> Result<(), AppError>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin + Send + 'static,
    {
        if let Some(read) = self.read.take() {
            let receiver = OutputReceiver::new(read, output, Arc::clone(&self.connected));
            self.receive_output = Some(tokio::spawn(receiver.run()));
        }

        let sender = InputSender::new(&mut self.write, self.connected.subscribe());
        let result = sender.run(input).await;

        self.disconnect().await;
        result
    }

    /// Close the connection and wait for the receiver to stop
    ///
    /// Calling it again is a no-op.
    pub async fn disconnect(&mut self) {
        self.connected.send_replace(false);
        let _ = self.write.shutdown().await;

        if let Some(receive_output) = self.receive_output.take() {
            let _ = receive_output.await;
        }
    }
}

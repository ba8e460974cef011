//! Keyboard side of the chat client: forwards typed lines to the server

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::QUIT_COMMAND;
use crate::error::AppError;

/// Reads local lines and sends each one to the server as a single write
pub struct InputSender<'a, W> {
    write: &'a mut W,
    connected: watch::Receiver<bool>,
}

impl<'a, W> InputSender<'a, W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(write: &'a mut W, connected: watch::Receiver<bool>) -> Self {
        Self { write, connected }
    }

    /// Forward lines until `quit`, end of input, or disconnect
    pub async fn run<I>(mut self, input: I) -> Result<(), AppError>
    where
        I: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            let line = select! {
                _ = self.connected.wait_for(|connected| !*connected) => {
                    debug!("Connection lost, input stopped");
                    return Ok(());
                }
                line = lines.next_line() => line?,
            };

            let Some(line) = line else {
                debug!("Input closed");
                return Ok(());
            };
            if line == QUIT_COMMAND {
                return Ok(());
            }
            if line.is_empty() {
                continue;
            }

            if let Err(e) = self.write.write_all(line.as_bytes()).await {
                warn!("Could not send message: {}", e);
                return Ok(());
            }
        }
    }
}

//! Network side of the chat client: prints whatever the server relays

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::sync::watch;
use tracing::debug;

use crate::message::{MAX_READ, READ_BUFFER_SIZE};

const DISCONNECTED: &[u8] = b"Disconnected from server\n";

/// Background reader that shows everything the server sends
///
/// Each read is written out verbatim followed by a newline. When the server
/// closes the connection it clears the shared `connected` flag.
pub struct OutputReceiver<R, O> {
    read: R,
    output: O,
    connected: Arc<watch::Sender<bool>>,
}

impl<R, O> OutputReceiver<R, O>
where
    R: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    pub fn new(read: R, output: O, connected: Arc<watch::Sender<bool>>) -> Self {
        OutputReceiver {
            read,
            output,
            connected,
        }
    }

    pub async fn run(mut self) {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut connected = self.connected.subscribe();

        loop {
            let result = select! {
                _ = connected.wait_for(|connected| !*connected) => break,
                result = self.read.read(&mut buf[..MAX_READ]) => result,
            };

            match result {
                Ok(n) if n > 0 => {
                    if self.show(&buf[..n]).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {
                    let _ = self.show_disconnected().await;
                    break;
                }
                Err(e) => {
                    debug!("Error receiving message: {}", e);
                    let _ = self.show_disconnected().await;
                    break;
                }
            }
        }

        self.connected.send_replace(false);
        let _ = self.output.shutdown().await;
    }

    async fn show(&mut self, message: &[u8]) -> std::io::Result<()> {
        self.output.write_all(message).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await
    }

    async fn show_disconnected(&mut self) -> std::io::Result<()> {
        self.output.write_all(DISCONNECTED).await?;
        self.output.flush().await
    }
}

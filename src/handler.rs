//! Client session handler
//!
//! Drives one connection through `AwaitingUsername -> Active -> Closed`:
//! reads the handshake, relays every later read to the ChatServer, and
//! unregisters the client when the peer goes away or the server stops.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::lifecycle::Lifecycle;
use crate::message::{parse_handshake, ServerMessage, MAX_READ, READ_BUFFER_SIZE};
use crate::server::ServerCommand;
use crate::types::ClientId;

/// Outcome of one read on the session's transport
#[derive(Debug, PartialEq, Eq)]
enum ReadOutcome {
    /// Bytes received
    Data(usize),
    /// Peer closed, read failed, or the server is stopping
    Closed,
}

/// Handle an accepted, already-registered connection
///
/// Splits the stream, spawns the writer task that drains `outbound`, and runs
/// the session until it closes. Teardown always sends exactly one
/// `Disconnect` for `client_id`.
pub async fn handle_connection(
    stream: TcpStream,
    client_id: ClientId,
    outbound: mpsc::Receiver<ServerMessage>,
    cmd_tx: mpsc::Sender<ServerCommand>,
    lifecycle: Lifecycle,
) -> Result<(), AppError> {
    let (reader, writer) = stream.into_split();

    let write_task = tokio::spawn(write_outbound(
        writer,
        outbound,
        client_id,
        lifecycle.clone(),
    ));

    let result = run_session(reader, client_id, &cmd_tx, &lifecycle).await;

    // Closed: unregister. The registry drops the record, closing the queue,
    // so the writer task drains what is left and shuts the write half down.
    if cmd_tx
        .send(ServerCommand::Disconnect { client_id })
        .await
        .is_err()
    {
        debug!("Registry gone before {} could unregister", client_id);
    }
    if let Err(e) = write_task.await {
        warn!("Writer task for {} failed: {}", client_id, e);
    }

    info!("Client {} disconnected", client_id);
    result
}

/// Handshake and read loop. Returns once the session should close.
async fn run_session<R>(
    mut reader: R,
    client_id: ClientId,
    cmd_tx: &mpsc::Sender<ServerCommand>,
    lifecycle: &Lifecycle,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    // AwaitingUsername
    let ReadOutcome::Data(n) = read_or_stop(&mut reader, &mut buf, lifecycle, client_id).await
    else {
        debug!("Client {} closed before handshake", client_id);
        return Ok(());
    };

    match parse_handshake(&buf[..n]) {
        Some(username) => {
            cmd_tx
                .send(ServerCommand::SetUsername {
                    client_id,
                    username,
                })
                .await
                .map_err(|_| AppError::ChannelSend)?;
        }
        None => {
            warn!(
                "Client {} sent no handshake marker, continuing without a username",
                client_id
            );
        }
    }

    // Active
    while lifecycle.is_running() {
        let ReadOutcome::Data(n) = read_or_stop(&mut reader, &mut buf, lifecycle, client_id).await
        else {
            break;
        };

        cmd_tx
            .send(ServerCommand::Chat {
                client_id,
                content: buf[..n].to_vec(),
            })
            .await
            .map_err(|_| AppError::ChannelSend)?;
    }

    Ok(())
}

/// One read of at most `MAX_READ` bytes, abandoned if the server stops first
async fn read_or_stop<R>(
    reader: &mut R,
    buf: &mut [u8],
    lifecycle: &Lifecycle,
    client_id: ClientId,
) -> ReadOutcome
where
    R: AsyncRead + Unpin,
{
    tokio::select! {
        _ = lifecycle.stopped() => {
            debug!("Server stopping, closing session {}", client_id);
            ReadOutcome::Closed
        }
        result = reader.read(&mut buf[..MAX_READ]) => match result {
            Ok(0) => ReadOutcome::Closed,
            Ok(n) => ReadOutcome::Data(n),
            Err(e) => {
                debug!("Read error for {}: {}", client_id, e);
                ReadOutcome::Closed
            }
        },
    }
}

/// Writer task: one `write_all` per queued message
///
/// Runs until the queue closes or the server stops. A failed write stops the
/// task; the peer's own session notices the broken transport on its next read.
/// On stop the queue is dropped without draining, so a broadcast waiting on a
/// full queue fails instead of waiting on a peer that never reads.
async fn write_outbound<W>(
    mut writer: W,
    mut outbound: mpsc::Receiver<ServerMessage>,
    client_id: ClientId,
    lifecycle: Lifecycle,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let msg = tokio::select! {
            _ = lifecycle.stopped() => break,
            msg = outbound.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let bytes = msg.to_bytes();
        tokio::select! {
            _ = lifecycle.stopped() => break,
            result = writer.write_all(&bytes) => {
                if let Err(e) = result {
                    debug!("Write to {} failed: {}", client_id, e);
                    break;
                }
            }
        }
    }

    drop(outbound);
    let _ = writer.shutdown().await;
    debug!("Write task ended for {}", client_id);
}

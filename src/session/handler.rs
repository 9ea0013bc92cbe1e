//! Line-delimited JSON driver
//!
//! Reads [`ClientMsg`] lines, routes them to rooms through the registry and
//! writes every room's broadcast back out as [`ServerMsg`] lines.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::game::{GameRoom, RoomInput, RoomRegistry};
use crate::util::time::unix_millis;
use crate::session::protocol::{
    encode_server_msg, parse_client_msg, ClientMsg, ProtocolError, ServerMsg,
};

/// Serve stdin/stdout until stdin closes
pub async fn run_stdio(registry: Arc<RoomRegistry>, config: Arc<Config>) -> io::Result<()> {
    serve(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        registry,
        config,
    )
    .await
}

/// Serve one line stream. Returns once input is exhausted and every room it
/// opened has shut down.
pub async fn serve<R, W>(
    reader: R,
    writer: W,
    registry: Arc<RoomRegistry>,
    config: Arc<Config>,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::channel::<ServerMsg>(1024);
    let writer_handle = tokio::spawn(write_lines(writer, out_rx));

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_client_msg(&line) {
            Ok(msg) => route(msg, &registry, &config, &out_tx).await,
            Err(ProtocolError::Empty) => {}
            Err(e) => {
                warn!(error = %e, "Failed to parse client message");
                let _ = out_tx
                    .send(ServerMsg::error("malformed", e.to_string()))
                    .await;
            }
        }
    }

    info!(rooms = registry.active_rooms(), "Input closed, shutting rooms down");

    // Dropping the registry's handles closes each room's input channel
    let open: Vec<Uuid> = registry.room_ids();
    for id in open {
        registry.remove(&id);
    }
    drop(out_tx);

    match writer_handle.await {
        Ok(result) => result,
        Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
    }
}

async fn route(
    msg: ClientMsg,
    registry: &Arc<RoomRegistry>,
    config: &Config,
    out_tx: &mpsc::Sender<ServerMsg>,
) {
    let (room_id, input) = match msg {
        ClientMsg::CreateRoom { seed } => {
            create_room(seed, registry, config, out_tx).await;
            return;
        }
        ClientMsg::Join {
            room_id,
            session,
            profile,
        } => (room_id, RoomInput::Join { session, profile }),
        ClientMsg::Leave { room_id, session } => (room_id, RoomInput::Leave { session }),
        ClientMsg::Command {
            room_id,
            session,
            command,
        } => (room_id, RoomInput::Command { session, command }),
        ClientMsg::Signal { room_id, signal } => (room_id, RoomInput::Signal(signal)),
    };

    let result = match registry.require(&room_id) {
        Ok(handle) => handle.send(input).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        debug!(room_id = %room_id, error = %e, "Input not delivered");
        let _ = out_tx.send(ServerMsg::error(e.code(), e.to_string())).await;
    }
}

async fn create_room(
    seed: Option<u64>,
    registry: &Arc<RoomRegistry>,
    config: &Config,
    out_tx: &mpsc::Sender<ServerMsg>,
) {
    let room_id = Uuid::new_v4();
    let seed = seed.unwrap_or_else(rand::random);
    let (room, handle) = GameRoom::new(
        room_id,
        seed,
        config.simulation(),
        config.command_rate_limit,
    );

    // Subscribe before the room starts so no output is missed
    let output_rx = handle.subscribe();
    registry.insert(handle);

    let _ = out_tx
        .send(ServerMsg::RoomCreated {
            room_id,
            seed,
            created_at: unix_millis(),
        })
        .await;
    info!(room_id = %room_id, seed, "Room created");

    tokio::spawn(forward_room(room_id, output_rx, out_tx.clone()));

    let registry = registry.clone();
    tokio::spawn(async move {
        room.run().await;
        registry.remove(&room_id);
        info!(room_id = %room_id, "Room closed");
    });
}

/// Room broadcast -> output lines
async fn forward_room(
    room_id: Uuid,
    mut output_rx: broadcast::Receiver<ServerMsg>,
    out_tx: mpsc::Sender<ServerMsg>,
) {
    loop {
        match output_rx.recv().await {
            Ok(msg) => {
                let closed = matches!(msg, ServerMsg::RoomClosed { .. });
                if out_tx.send(msg).await.is_err() {
                    debug!(room_id = %room_id, "Output channel closed");
                    break;
                }
                if closed {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(room_id = %room_id, lagged_count = n, "Output lagged, skipping {} messages", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(room_id = %room_id, "Room broadcast closed");
                break;
            }
        }
    }
}

async fn write_lines<W>(mut writer: W, mut out_rx: mpsc::Receiver<ServerMsg>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = out_rx.recv().await {
        let line = match encode_server_msg(&msg) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Failed to encode server message");
                continue;
            }
        };
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn config() -> Arc<Config> {
        Arc::new(Config::from_lookup(|_| None).unwrap())
    }

    #[tokio::test]
    async fn unknown_room_is_reported() {
        let reader = Builder::new()
            .read(b"\n")
            .read(
                b"{\"type\":\"leave\",\"room_id\":\"00000000-0000-0000-0000-000000000000\",\"session\":1}\n",
            )
            .build();
        let writer = Builder::new()
            .write(b"{\"type\":\"error\",\"code\":\"room_not_found\",\"message\":\"Room not found: 00000000-0000-0000-0000-000000000000\"}")
            .write(b"\n")
            .build();

        let registry = Arc::new(RoomRegistry::new());
        serve(BufReader::new(reader), writer, registry.clone(), config())
            .await
            .unwrap();
        assert_eq!(registry.active_rooms(), 0);
    }
}

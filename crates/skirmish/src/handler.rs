//! Per-connection handler: handshake, auth, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `hello` → validate version
//!   2. Authenticate token → get PlayerId
//!   3. Send `welcome`
//!   4. Loop: receive frames → connection frames are answered here,
//!      in-match actions go to the room the connection is seated in
//!
//! Everything sent to the client, including room traffic, goes through
//! one outbox drained by a writer task that stamps the envelope.

use std::sync::Arc;

use skirmish_engine::{Action, ConnectionId, unix_millis_now};
use skirmish_protocol::{
    ClientMessage, Codec, Envelope, PROTOCOL_VERSION, PlayerId, ProtocolError, RoomId,
    ServerMessage,
};
use skirmish_room::{PlayerSender, ResultSink, RoomError, RoomHandle};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};

use crate::server::ServerState;
use crate::transport::{FrameReceiver, FrameSender, WebSocketConnection};
use crate::{Authenticator, SkirmishError, TransportError};

/// Error code for a missing or malformed `hello`, or a bad room id.
pub const ERR_BAD_REQUEST: u16 = 400;
/// Error code for a rejected token.
pub const ERR_UNAUTHORIZED: u16 = 401;
/// Error code for a room that could not be reached.
pub const ERR_UNAVAILABLE: u16 = 503;

/// Drop guard that reports transport loss to the player's room when the
/// handler exits, however it exits.
///
/// `Drop` is synchronous, so the report is a fire-and-forget task.
struct SeatGuard {
    player_id: PlayerId,
    connection: ConnectionId,
    room: Option<RoomHandle>,
}

impl Drop for SeatGuard {
    fn drop(&mut self) {
        let Some(room) = self.room.take() else {
            return;
        };
        let (player_id, connection) = (self.player_id, self.connection);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let _ = room.disconnect(player_id, connection).await;
            });
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C, S>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C, S>>,
) -> Result<(), SkirmishError>
where
    A: Authenticator,
    C: Codec + Clone,
    S: ResultSink,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let start = Instant::now();
    let (sender, mut receiver) = conn.split();
    let (outbox, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_frames(sender, rx, state.codec.clone(), start));

    // --- Step 1: Handshake ---
    let player_id = match perform_handshake(&mut receiver, &state, &outbox).await {
        Ok(player_id) => player_id,
        Err(e) => {
            // Let the writer flush the error frame, then close.
            drop(outbox);
            let _ = writer.await;
            return Err(e);
        }
    };
    tracing::info!(%conn_id, %player_id, "player authenticated");

    // --- Step 2: Message loop ---
    let mut guard = SeatGuard {
        player_id,
        connection: conn_id,
        room: None,
    };

    loop {
        let data = match timeout(state.config.idle_timeout, receiver.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, %player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, %player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, %player_id, "connection timed out");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "dropping undecodable frame");
                continue;
            }
        };

        match msg {
            ClientMessage::Hello { .. } => {
                tracing::debug!(%player_id, "ignoring repeated hello");
            }
            ClientMessage::Heartbeat { client_time } => {
                let _ = outbox.send(ServerMessage::HeartbeatAck {
                    client_time,
                    server_time: unix_millis_now(),
                });
            }
            ClientMessage::Join { room_id, name, team } => {
                join_room(&state, &mut guard, &outbox, room_id, name, team).await;
            }
            ClientMessage::Leave => {
                if let Some(room) = guard.room.take() {
                    if let Err(e) = room.leave(player_id, conn_id).await {
                        tracing::debug!(%player_id, error = %e, "leave failed");
                    }
                }
            }
            other => forward_action(&mut guard, other).await,
        }
    }

    // guard drops here → the room hears about the transport loss.
    Ok(())
}

/// Receives `hello`, checks the version, authenticates and sends `welcome`.
async fn perform_handshake<A, C, S>(
    receiver: &mut FrameReceiver,
    state: &Arc<ServerState<A, C, S>>,
    outbox: &PlayerSender,
) -> Result<PlayerId, SkirmishError>
where
    A: Authenticator,
    C: Codec,
    S: ResultSink,
{
    let data = match timeout(state.config.handshake_timeout, receiver.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(TransportError::ConnectionClosed("closed before hello".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let (version, token) = match state.codec.decode::<ClientMessage>(&data) {
        Ok(ClientMessage::Hello { version, token }) => (version, token),
        _ => {
            send_error(outbox, ERR_BAD_REQUEST, "expected hello");
            return Err(
                ProtocolError::InvalidMessage("first frame must be hello".into()).into(),
            );
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            outbox,
            ERR_BAD_REQUEST,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        );
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let player_id = match state.auth.authenticate(&token).await {
        Ok(player_id) => player_id,
        Err(e) => {
            send_error(outbox, ERR_UNAUTHORIZED, "unauthorized");
            return Err(e.into());
        }
    };

    let _ = outbox.send(ServerMessage::Welcome {
        player_id,
        server_time: unix_millis_now(),
    });
    Ok(player_id)
}

/// Seats the connection in `room_id`, creating the room if needed.
///
/// Switching rooms gives up the old seat only once the new one is held,
/// so a refused join leaves the current match untouched.
async fn join_room<A, C, S>(
    state: &Arc<ServerState<A, C, S>>,
    guard: &mut SeatGuard,
    outbox: &PlayerSender,
    room_id: RoomId,
    name: Option<String>,
    team: Option<String>,
) where
    A: Authenticator,
    C: Codec,
    S: ResultSink,
{
    let (player_id, conn_id) = (guard.player_id, guard.connection);

    // Lock only for the join itself.
    let result = {
        let mut rooms = state.rooms.lock().await;
        rooms
            .join(&room_id, player_id, conn_id, name, team, outbox.clone())
            .await
    };

    match result {
        Ok(handle) => {
            if let Some(old) = guard.room.replace(handle) {
                if *old.room_id() != room_id {
                    tracing::info!(%player_id, from = %old.room_id(), to = %room_id, "switched rooms");
                    let _ = old.leave(player_id, conn_id).await;
                }
            }
        }
        Err(RoomError::RoomFull(room_id)) => {
            tracing::info!(%player_id, %room_id, "room full");
            let _ = outbox.send(ServerMessage::RoomFull { room_id });
        }
        Err(RoomError::InvalidRoomId(id)) => {
            send_error(outbox, ERR_BAD_REQUEST, &format!("invalid room id {id:?}"));
        }
        Err(e) => {
            tracing::warn!(%player_id, %room_id, error = %e, "join failed");
            send_error(outbox, ERR_UNAVAILABLE, &e.to_string());
        }
    }
}

/// Forwards an in-match action to the seated room.
async fn forward_action(guard: &mut SeatGuard, msg: ClientMessage) {
    let Some(action) = Action::from_client(msg) else {
        return;
    };
    let Some(room) = &guard.room else {
        tracing::debug!(
            player_id = %guard.player_id,
            action = action.name(),
            "action outside a room dropped"
        );
        return;
    };
    if let Err(e) = room
        .send_action(guard.player_id, guard.connection, action)
        .await
    {
        tracing::debug!(player_id = %guard.player_id, error = %e, "room gone");
        guard.room = None;
    }
}

/// Drains the outbox onto the socket, stamping each frame.
///
/// Ends when every sender is gone (the handler and the room both let go)
/// or the socket fails.
async fn write_frames<C: Codec>(
    mut sender: FrameSender,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
    codec: C,
    start: Instant,
) {
    let mut seq: u64 = 0;
    while let Some(payload) = rx.recv().await {
        let envelope = Envelope {
            seq: next_seq(&mut seq),
            timestamp: start.elapsed().as_millis() as u64,
            payload,
        };
        let bytes = match codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode frame");
                continue;
            }
        };
        if let Err(e) = sender.send(bytes).await {
            tracing::debug!(error = %e, "send failed, writer stopping");
            return;
        }
    }
    let _ = sender.close().await;
}

fn send_error(outbox: &PlayerSender, code: u16, message: &str) {
    let _ = outbox.send(ServerMessage::Error {
        code,
        message: message.to_string(),
    });
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

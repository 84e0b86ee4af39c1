//! Room actor: an isolated Tokio task that owns one match engine.
//!
//! Each room runs in its own task and talks to the outside world through
//! an mpsc channel. Besides commands, the actor wakes for two clocks: the
//! once-per-second sweep (setup countdown, turn timeout) while a match is
//! in setup or play, and the room's earliest exact deadline (tie-breaker
//! window, reveal delay, disconnect grace).

use std::collections::HashMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use skirmish_engine::{Action, ConnectionId, MatchConfig, Room};
use skirmish_protocol::{Phase, PlayerId, Recipient, RoomId, ServerMessage};
use skirmish_timer::{Cadence, CadenceConfig, sleep_until_opt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{ResultSink, RoomError};

/// Channel sender for delivering server messages to one connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerMessage>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Seat a player, or rebind their seat to a new connection.
    Join {
        player_id: PlayerId,
        connection: ConnectionId,
        name: Option<String>,
        team: Option<String>,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Give up the seat.
    Leave {
        player_id: PlayerId,
        connection: ConnectionId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A connection's transport went away.
    Disconnect {
        player_id: PlayerId,
        connection: ConnectionId,
    },

    /// An in-match action from a connection.
    Action {
        player_id: PlayerId,
        connection: ConnectionId,
        action: Action,
    },

    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },

    Shutdown,
}

/// A snapshot of room metadata (not the board).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub phase: Phase,
    /// Seats taken, connected or not.
    pub player_count: usize,
    /// Seats with a live connection.
    pub connected_count: usize,
}

/// Handle to a running room actor.
///
/// Cheap to clone; it wraps an `mpsc::Sender`. The registry keeps one per
/// room and every connection seated in the room keeps another.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Asks for a seat (or a rebind) for `player_id` on `connection`.
    ///
    /// On success the room starts pushing messages into `sender`.
    pub async fn join(
        &self,
        player_id: PlayerId,
        connection: ConnectionId,
        name: Option<String>,
        team: Option<String>,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            player_id,
            connection,
            name,
            team,
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Gives up the seat held through `connection`.
    pub async fn leave(
        &self,
        player_id: PlayerId,
        connection: ConnectionId,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Leave {
            player_id,
            connection,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Reports transport loss (fire-and-forget).
    pub async fn disconnect(
        &self,
        player_id: PlayerId,
        connection: ConnectionId,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Disconnect {
            player_id,
            connection,
        })
        .await
    }

    /// Delivers an in-match action (fire-and-forget).
    pub async fn send_action(
        &self,
        player_id: PlayerId,
        connection: ConnectionId,
        action: Action,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Action {
            player_id,
            connection,
            action,
        })
        .await
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::GetInfo { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the room to stop.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<S: ResultSink> {
    room: Room,
    /// Live connection per seated player.
    connections: HashMap<PlayerId, (ConnectionId, PlayerSender)>,
    receiver: mpsc::Receiver<RoomCommand>,
    cadence: Cadence,
    rng: StdRng,
    sink: Arc<S>,
}

impl<S: ResultSink> RoomActor<S> {
    async fn run(mut self) {
        info!(room_id = %self.room.id(), "room actor started");

        loop {
            self.cadence.set_active(self.room.needs_sweep());
            let wakeup = self.room.next_wakeup();

            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                _ = self.cadence.wait_for_tick() => {
                    self.room.sweep(Instant::now(), &mut self.rng);
                }
                _ = sleep_until_opt(wakeup) => {
                    self.room.fire_due(Instant::now(), &mut self.rng);
                }
            }

            self.flush();

            if self.room.is_abandoned() {
                info!(room_id = %self.room.id(), "room empty, closing");
                break;
            }
        }

        info!(room_id = %self.room.id(), "room actor stopped");
    }

    /// Applies one command. Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: RoomCommand) -> bool {
        let now = Instant::now();
        match cmd {
            RoomCommand::Join {
                player_id,
                connection,
                name,
                team,
                sender,
                reply,
            } => {
                let result = self
                    .room
                    .join(player_id, connection, name, team, now)
                    .map_err(RoomError::from);
                if result.is_ok() {
                    // The replaced connection stops receiving room traffic.
                    self.connections.insert(player_id, (connection, sender));
                }
                let _ = reply.send(result);
            }
            RoomCommand::Leave {
                player_id,
                connection,
                reply,
            } => {
                let result = if self.is_current(player_id, connection) {
                    self.room
                        .leave(player_id, now)
                        .map_err(|_| self.not_in_room(player_id))
                } else {
                    Err(self.not_in_room(player_id))
                };
                if result.is_ok() {
                    self.connections.remove(&player_id);
                }
                let _ = reply.send(result);
            }
            RoomCommand::Disconnect {
                player_id,
                connection,
            } => {
                if self.room.disconnect(player_id, connection, now)
                    && self.is_current(player_id, connection)
                {
                    self.connections.remove(&player_id);
                }
            }
            RoomCommand::Action {
                player_id,
                connection,
                action,
            } => {
                if self.is_current(player_id, connection) {
                    let _ = self.room.apply(player_id, action, now, &mut self.rng);
                } else {
                    debug!(
                        room_id = %self.room.id(),
                        %player_id,
                        %connection,
                        action = action.name(),
                        "action from superseded connection dropped"
                    );
                }
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                info!(room_id = %self.room.id(), "room shutting down");
                return false;
            }
        }
        true
    }

    /// Delivers everything the engine produced, hands a finished match to
    /// the sink and forgets connections whose seat is gone.
    fn flush(&mut self) {
        for (recipient, msg) in self.room.drain() {
            self.dispatch(recipient, msg);
        }

        if let Some(outcome) = self.room.take_outcome() {
            let sink = Arc::clone(&self.sink);
            tokio::spawn(async move {
                if let Err(err) = sink.record(&outcome).await {
                    warn!(
                        room_id = %outcome.room_id,
                        error = %err,
                        "failed to record match result"
                    );
                }
            });
        }

        let room = &self.room;
        self.connections.retain(|player, _| room.is_seated(*player));
    }

    fn dispatch(&self, recipient: Recipient, msg: ServerMessage) {
        match recipient {
            Recipient::All => {
                for (_, tx) in self.connections.values() {
                    let _ = tx.send(msg.clone());
                }
            }
            Recipient::Player(player_id) => {
                if let Some((_, tx)) = self.connections.get(&player_id) {
                    let _ = tx.send(msg);
                }
            }
            Recipient::AllExcept(excluded) => {
                for (player_id, (_, tx)) in &self.connections {
                    if *player_id != excluded {
                        let _ = tx.send(msg.clone());
                    }
                }
            }
        }
    }

    fn is_current(&self, player_id: PlayerId, connection: ConnectionId) -> bool {
        self.connections
            .get(&player_id)
            .is_some_and(|(current, _)| *current == connection)
    }

    fn not_in_room(&self, player_id: PlayerId) -> RoomError {
        RoomError::NotInRoom(player_id, self.room.id().clone())
    }

    fn info(&self) -> RoomInfo {
        let seats = self.room.seats();
        RoomInfo {
            room_id: self.room.id().clone(),
            phase: self.room.phase(),
            player_count: seats.len(),
            connected_count: seats.iter().filter(|s| s.is_connected()).count(),
        }
    }
}

/// Spawns a room actor and returns its handle.
pub(crate) fn spawn_room<S: ResultSink>(
    room_id: RoomId,
    config: MatchConfig,
    sweep_jitter: std::time::Duration,
    sink: Arc<S>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let cadence = Cadence::new(CadenceConfig {
        interval: config.sweep_interval,
        initial_jitter: sweep_jitter,
    });

    let actor = RoomActor {
        room: Room::new(room_id.clone(), config),
        connections: HashMap::new(),
        receiver: rx,
        cadence,
        rng: StdRng::from_os_rng(),
        sink,
    };
    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}

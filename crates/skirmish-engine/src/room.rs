//! The room aggregate: seats, the phase state machine and every timer.
//!
//! A `Room` is plain data driven from outside. The actor in
//! `skirmish-room` feeds it commands and clock events, then drains the
//! messages it produced with [`Room::drain`] and delivers them. Nothing
//! here awaits, spawns or reads the clock.
//!
//! Timers come in two flavours. The setup countdown and the turn clock
//! are *swept*: [`Room::sweep`] checks them once per sweep interval, which
//! also drives the `setup_timer` broadcast. The tie-breaker window, the
//! draw reveal and the reconnect grace windows fire at their exact
//! deadline through [`Room::next_wakeup`] and [`Room::fire_due`].

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use skirmish_protocol::{
    BattleId, CombatResult, Coord, GameOverReason, GameStateView, Phase, PlayerId, PlayerInfo,
    Readiness, Recipient, RoomId, ServerMessage, Side, Throw, UnitId, UnitKind,
};
use skirmish_timer::Timers;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::combat::{self, Encounter};
use crate::turn::{self, Move};
use crate::{
    Action, ConnectionId, GameResult, Grid, JoinError, MatchConfig, MatchOutcome, Rejection,
    RoundOutcome, Seat, TieBreaker, TieStage, Unit, setup, unix_millis_at,
};

/// Seats per room.
pub const SEATS: usize = 2;

/// Longest emote relayed, in characters.
pub const MAX_EMOTE_CHARS: usize = 16;

/// Longest display name kept, in characters.
pub const MAX_NAME_CHARS: usize = 32;

/// Encounter numbers are unique across every room in the process.
static NEXT_ENCOUNTER: AtomicU64 = AtomicU64::new(1);

fn next_encounter() -> u64 {
    NEXT_ENCOUNTER.fetch_add(1, Ordering::Relaxed)
}

/// The deadlines a room keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomTimer {
    SetupCountdown,
    TurnClock,
    /// The choosing window, or the reveal delay after a drawn round.
    TieBreak,
    Grace(PlayerId),
}

impl RoomTimer {
    /// Swept timers are checked by [`Room::sweep`]; the others fire
    /// through [`Room::fire_due`].
    pub fn is_swept(self) -> bool {
        matches!(self, Self::SetupCountdown | Self::TurnClock)
    }
}

/// One game room.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    config: MatchConfig,
    phase: Phase,
    seats: Vec<Seat>,
    grid: Grid,
    ready: HashMap<PlayerId, bool>,
    current_turn: Option<PlayerId>,
    turn_started_at: Option<Instant>,
    tie: Option<TieBreaker>,
    timers: Timers<RoomTimer>,
    rematch_votes: BTreeSet<PlayerId>,
    last_result: Option<GameResult>,
    /// Set when a match ends; cleared when the next one begins.
    result_persisted: bool,
    pending_outcome: Option<MatchOutcome>,
    next_unit: u32,
    ever_seated: bool,
    outbox: Vec<(Recipient, ServerMessage)>,
}

impl Room {
    pub fn new(id: RoomId, config: MatchConfig) -> Self {
        Self {
            id,
            config,
            phase: Phase::Waiting,
            seats: Vec::with_capacity(SEATS),
            grid: Grid::new(),
            ready: HashMap::new(),
            current_turn: None,
            turn_started_at: None,
            tie: None,
            timers: Timers::new(),
            rematch_votes: BTreeSet::new(),
            last_result: None,
            result_persisted: false,
            pending_outcome: None,
            next_unit: 0,
            ever_seated: false,
            outbox: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn seat(&self, player: PlayerId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.player_id == player)
    }

    pub fn is_seated(&self, player: PlayerId) -> bool {
        self.seat(player).is_some()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn current_turn(&self) -> Option<PlayerId> {
        self.current_turn
    }

    pub fn tie_breaker(&self) -> Option<&TieBreaker> {
        self.tie.as_ref()
    }

    pub fn is_ready(&self, player: PlayerId) -> bool {
        self.ready.get(&player).copied().unwrap_or(false)
    }

    pub fn rematch_votes(&self) -> Vec<PlayerId> {
        self.rematch_votes.iter().copied().collect()
    }

    pub fn last_result(&self) -> Option<GameResult> {
        self.last_result
    }

    pub fn timers(&self) -> &Timers<RoomTimer> {
        &self.timers
    }

    /// `true` once every seat has been vacated. A room that never had a
    /// player is not abandoned, it is new.
    pub fn is_abandoned(&self) -> bool {
        self.ever_seated && self.seats.is_empty()
    }

    /// Whether the periodic sweep has anything to do in this phase.
    pub fn needs_sweep(&self) -> bool {
        matches!(self.phase, Phase::Setup | Phase::Playing)
    }

    /// The next exact-deadline timer, for the actor to sleep until.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.timers.next_deadline_where(|k| !k.is_swept())
    }

    /// Messages produced since the last drain, in order.
    pub fn drain(&mut self) -> Vec<(Recipient, ServerMessage)> {
        std::mem::take(&mut self.outbox)
    }

    /// The outcome of a match that just ended, handed out once.
    pub fn take_outcome(&mut self) -> Option<MatchOutcome> {
        self.pending_outcome.take()
    }

    // -----------------------------------------------------------------------
    // Seats
    // -----------------------------------------------------------------------

    /// Seats `player` on `connection`, or rebinds their existing seat.
    ///
    /// A player who already holds a seat always gets it back, whatever
    /// the phase, and receives the snapshot for the current phase. A new
    /// identity is refused once both seats are taken.
    pub fn join(
        &mut self,
        player: PlayerId,
        connection: ConnectionId,
        name: Option<String>,
        team: Option<String>,
        now: Instant,
    ) -> Result<(), JoinError> {
        if let Some(idx) = self.seat_index(player) {
            let seat = &mut self.seats[idx];
            let was_connected = seat.connection.replace(connection).is_some();
            if let Some(name) = clean_name(name) {
                seat.name = name;
            }
            if team.is_some() {
                seat.team = team;
            }
            let grace_cancelled = self.timers.cancel(&RoomTimer::Grace(player));
            info!(
                room_id = %self.id,
                %player,
                %connection,
                was_connected,
                grace_cancelled,
                phase = %self.phase,
                "seat rebound"
            );

            self.send_joined(player);
            if !was_connected {
                self.push(
                    Recipient::AllExcept(player),
                    ServerMessage::PlayerReconnected { player_id: player },
                );
            }
            self.broadcast_roster();
            self.send_snapshot(player, now);
            return Ok(());
        }

        if self.seats.len() >= SEATS {
            debug!(room_id = %self.id, %player, "join refused, room full");
            return Err(JoinError::RoomFull(self.id.clone()));
        }

        // A newcomer sitting down after a finished match starts a fresh
        // lobby rather than inheriting the old result.
        if self.phase == Phase::GameOver {
            self.reset_to_waiting();
        }

        // An empty room seats its first player at the bottom.
        let side = self
            .seats
            .first()
            .map_or(Side::Bottom, |s| s.side.opposite());
        let name = clean_name(name).unwrap_or_else(|| format!("Player {}", self.seats.len() + 1));
        self.seats.push(Seat {
            player_id: player,
            side,
            name,
            team,
            connection: Some(connection),
        });
        self.ever_seated = true;
        info!(
            room_id = %self.id,
            %player,
            %connection,
            %side,
            players = self.seats.len(),
            "player seated"
        );

        self.send_joined(player);
        self.broadcast_roster();

        if self.seats.len() == SEATS && self.phase == Phase::Waiting {
            self.start_setup(now);
        }
        Ok(())
    }

    /// Handles transport loss for `player`'s `connection`.
    ///
    /// Ignored unless `connection` is the one the seat is currently bound
    /// to; a connection that was already replaced by a newer one has no
    /// say. Otherwise the seat is held for the grace period.
    pub fn disconnect(&mut self, player: PlayerId, connection: ConnectionId, now: Instant) -> bool {
        let Some(idx) = self.seat_index(player) else {
            return false;
        };
        if self.seats[idx].connection != Some(connection) {
            debug!(room_id = %self.id, %player, %connection, "stale disconnect ignored");
            return false;
        }
        self.seats[idx].connection = None;

        self.timers
            .schedule_in(RoomTimer::Grace(player), now, self.config.reconnect_grace);
        info!(
            room_id = %self.id,
            %player,
            %connection,
            grace_ms = self.config.reconnect_grace.as_millis() as u64,
            "player disconnected, holding seat"
        );

        self.push(
            Recipient::AllExcept(player),
            ServerMessage::PlayerDisconnected { player_id: player },
        );
        self.broadcast_roster();
        true
    }

    /// Voluntary departure. Forfeits a running match.
    pub fn leave(&mut self, player: PlayerId, now: Instant) -> Result<(), Rejection> {
        if !self.is_seated(player) {
            return Err(Rejection::NotSeated);
        }
        self.evict(player, now);
        Ok(())
    }

    fn evict(&mut self, player: PlayerId, now: Instant) {
        let Some(idx) = self.seat_index(player) else {
            return;
        };
        self.seats.remove(idx);
        self.timers.cancel(&RoomTimer::Grace(player));
        self.ready.remove(&player);
        self.rematch_votes.remove(&player);
        info!(
            room_id = %self.id,
            %player,
            phase = %self.phase,
            players = self.seats.len(),
            "seat vacated"
        );

        if self.phase.is_match_running() {
            match self.seats.first().map(|s| s.player_id) {
                Some(winner) => {
                    self.finish(winner, player, GameOverReason::Forfeit, false, true, now)
                }
                None => self.reset_to_waiting(),
            }
        } else {
            self.reset_to_waiting();
        }
        self.broadcast_roster();
    }

    fn reset_to_waiting(&mut self) {
        self.phase = Phase::Waiting;
        self.grid.clear();
        self.ready.clear();
        self.current_turn = None;
        self.turn_started_at = None;
        self.tie = None;
        self.timers
            .cancel_where(|k| !matches!(k, RoomTimer::Grace(_)));
        self.rematch_votes.clear();
        self.last_result = None;
        debug!(room_id = %self.id, "room waiting for players");
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Applies one in-match action from `player`.
    ///
    /// A rejected action leaves the room untouched and produces no
    /// messages; the reason is logged here at debug level.
    pub fn apply(
        &mut self,
        player: PlayerId,
        action: Action,
        now: Instant,
        rng: &mut impl Rng,
    ) -> Result<(), Rejection> {
        let name = action.name();
        let result = match action {
            Action::Place { row, col, kind } => self.place(player, row, col, kind),
            Action::Remove { row, col } => self.remove(player, row, col),
            Action::Randomize => self.randomize(player, rng),
            Action::Ready => self.mark_ready(player, now),
            Action::Move { from_row, from_col, to_row, to_col } => {
                self.request_move(player, (from_row, from_col), (to_row, to_col), now)
            }
            Action::TieChoice(throw) => self.tie_choice(player, throw, now, rng),
            Action::RematchRequest => self.request_rematch(player, now),
            Action::Resync => self.resync(player, now),
            Action::Emote(emoji) => self.emote(player, emoji),
        };
        if let Err(reason) = &result {
            debug!(room_id = %self.id, %player, action = name, %reason, "action rejected");
        }
        result
    }

    fn place(&mut self, player: PlayerId, row: usize, col: usize, kind: UnitKind) -> Result<(), Rejection> {
        let side = self.unready_setup_side(player)?;
        let at = coord(row, col)?;
        setup::check_placement(&self.grid, player, side, at, kind)?;
        let id = self.next_unit_id();
        self.grid.put(at, Unit { id, kind, owner: player, side, revealed: false });
        self.broadcast_setup_update();
        Ok(())
    }

    fn remove(&mut self, player: PlayerId, row: usize, col: usize) -> Result<(), Rejection> {
        let side = self.unready_setup_side(player)?;
        let at = coord(row, col)?;
        setup::check_removal(&self.grid, player, side, at)?;
        self.grid.take(at);
        self.broadcast_setup_update();
        Ok(())
    }

    fn randomize(&mut self, player: PlayerId, rng: &mut impl Rng) -> Result<(), Rejection> {
        let side = self.unready_setup_side(player)?;
        self.autofill(player, side, rng);
        self.broadcast_setup_update();
        Ok(())
    }

    fn mark_ready(&mut self, player: PlayerId, now: Instant) -> Result<(), Rejection> {
        self.unready_setup_side(player)?;
        if !setup::is_complete(&self.grid.composition(player)) {
            return Err(Rejection::IncompleteArmy);
        }
        self.ready.insert(player, true);
        info!(room_id = %self.id, %player, "player ready");
        self.broadcast_setup_update();

        if self.seats.len() == SEATS && self.seats.iter().all(|s| self.is_ready(s.player_id)) {
            self.begin_play(now);
        }
        Ok(())
    }

    fn request_move(
        &mut self,
        player: PlayerId,
        (from_row, from_col): (usize, usize),
        (to_row, to_col): (usize, usize),
        now: Instant,
    ) -> Result<(), Rejection> {
        self.seat_of(player)?;
        self.expect_phase(Phase::Playing)?;
        if self.current_turn != Some(player) {
            return Err(Rejection::NotYourTurn);
        }
        let from = coord(from_row, from_col)?;
        let to = coord(to_row, to_col)?;
        turn::check_move(&self.grid, player, from, to)?;
        self.execute_move(player, Move { from, to }, now);
        Ok(())
    }

    fn tie_choice(
        &mut self,
        player: PlayerId,
        throw: Throw,
        now: Instant,
        rng: &mut impl Rng,
    ) -> Result<(), Rejection> {
        self.seat_of(player)?;
        self.expect_phase(Phase::TieBreaker)?;
        let tie = self.tie.as_mut().ok_or(Rejection::WrongPhase(self.phase))?;
        let both_in = tie.submit(player, throw)?;
        let battle_id = tie.battle_id();
        debug!(room_id = %self.id, %player, %battle_id, both_in, "tie-break choice recorded");
        if both_in {
            self.resolve_tie_break(&battle_id, now, rng);
        }
        Ok(())
    }

    fn request_rematch(&mut self, player: PlayerId, now: Instant) -> Result<(), Rejection> {
        if !self.seat_of(player)?.is_connected() {
            return Err(Rejection::NotConnected);
        }
        self.expect_phase(Phase::GameOver)?;

        self.rematch_votes.insert(player);
        info!(room_id = %self.id, %player, votes = self.rematch_votes.len(), "rematch vote");
        self.push(
            Recipient::All,
            ServerMessage::RematchUpdate { votes: self.rematch_votes() },
        );

        let mut connected = self.seats.iter().filter(|s| s.is_connected()).peekable();
        let everyone_agrees = connected.peek().is_some()
            && connected.all(|s| self.rematch_votes.contains(&s.player_id));
        if self.seats.len() == SEATS && everyone_agrees {
            info!(room_id = %self.id, "rematch agreed");
            self.start_setup(now);
        }
        Ok(())
    }

    fn resync(&mut self, player: PlayerId, now: Instant) -> Result<(), Rejection> {
        self.seat_of(player)?;
        self.send_snapshot(player, now);
        Ok(())
    }

    fn emote(&mut self, player: PlayerId, emoji: String) -> Result<(), Rejection> {
        self.seat_of(player)?;
        let len = emoji.chars().count();
        if len == 0 || len > MAX_EMOTE_CHARS {
            return Err(Rejection::InvalidEmote { max: MAX_EMOTE_CHARS });
        }
        self.push(
            Recipient::AllExcept(player),
            ServerMessage::Emote { player_id: player, emoji },
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// The periodic sweep: setup countdown and turn timeout.
    pub fn sweep(&mut self, now: Instant, rng: &mut impl Rng) {
        match self.phase {
            Phase::Setup => self.sweep_setup(now, rng),
            Phase::Playing => self.sweep_turn(now, rng),
            _ => {}
        }
    }

    /// Fires every exact-deadline timer that is due at `now`.
    pub fn fire_due(&mut self, now: Instant, rng: &mut impl Rng) {
        for key in self.timers.pop_due_where(now, |k| !k.is_swept()) {
            match key {
                RoomTimer::TieBreak => self.on_tie_break_timer(now, rng),
                RoomTimer::Grace(player) => {
                    info!(room_id = %self.id, %player, "reconnect grace expired");
                    self.evict(player, now);
                }
                RoomTimer::SetupCountdown | RoomTimer::TurnClock => {}
            }
        }
    }

    fn sweep_setup(&mut self, now: Instant, rng: &mut impl Rng) {
        let Some(remaining) = self.timers.remaining(&RoomTimer::SetupCountdown, now) else {
            return;
        };
        self.push(
            Recipient::All,
            ServerMessage::SetupTimer { remaining_seconds: whole_seconds(remaining) },
        );
        if !remaining.is_zero() {
            return;
        }

        let unready: Vec<(PlayerId, Side)> = self
            .seats
            .iter()
            .filter(|s| !self.is_ready(s.player_id))
            .map(|s| (s.player_id, s.side))
            .collect();
        info!(room_id = %self.id, auto_filled = unready.len(), "setup time is up");
        for (player, side) in unready {
            self.autofill(player, side, rng);
            self.ready.insert(player, true);
        }
        self.begin_play(now);
    }

    fn sweep_turn(&mut self, now: Instant, rng: &mut impl Rng) {
        if !self.timers.is_expired(&RoomTimer::TurnClock, now) {
            return;
        }
        let Some(stalled) = self.current_turn else {
            return;
        };
        let Some(opponent) = self.opponent_of(stalled) else {
            return;
        };

        match turn::random_move(&self.grid, stalled, rng) {
            Some(mv) => {
                info!(
                    room_id = %self.id,
                    player = %stalled,
                    from = %mv.from,
                    to = %mv.to,
                    "turn timed out, moving for player"
                );
                self.execute_move(stalled, mv, now);
            }
            None => {
                info!(room_id = %self.id, player = %stalled, "turn timed out with no legal move");
                self.finish(opponent, stalled, GameOverReason::NoLegalMoves, false, false, now);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase transitions
    // -----------------------------------------------------------------------

    fn start_setup(&mut self, now: Instant) {
        self.phase = Phase::Setup;
        self.grid.clear();
        self.ready = self.seats.iter().map(|s| (s.player_id, false)).collect();
        self.current_turn = None;
        self.turn_started_at = None;
        self.tie = None;
        self.timers.cancel(&RoomTimer::TurnClock);
        self.timers.cancel(&RoomTimer::TieBreak);
        self.timers
            .schedule_in(RoomTimer::SetupCountdown, now, self.config.setup_duration);
        self.rematch_votes.clear();
        self.last_result = None;
        self.result_persisted = false;
        self.pending_outcome = None;
        info!(room_id = %self.id, "setup started");

        let room_id = self.id.clone();
        self.push_each(|room, viewer| ServerMessage::SetupStart {
            room_id: room_id.clone(),
            grid: room.grid.setup_view_for(viewer),
            ready: room.readiness(),
            players: room.roster(),
        });
        self.push(
            Recipient::All,
            ServerMessage::SetupTimer {
                remaining_seconds: whole_seconds(self.config.setup_duration),
            },
        );
    }

    fn begin_play(&mut self, now: Instant) {
        self.timers.cancel(&RoomTimer::SetupCountdown);
        self.phase = Phase::Playing;
        self.current_turn = self
            .seats
            .iter()
            .find(|s| s.side == Side::Bottom)
            .map(|s| s.player_id);
        self.start_turn_clock(now);
        info!(room_id = %self.id, first = ?self.current_turn, "match started");

        let turn_start_time = unix_millis_at(now, now);
        self.push_each(|room, viewer| ServerMessage::GameStart {
            state: room.state_for(viewer),
            turn_start_time,
        });
    }

    fn start_turn_clock(&mut self, now: Instant) {
        self.turn_started_at = Some(now);
        self.timers
            .schedule_in(RoomTimer::TurnClock, now, self.config.turn_duration);
    }

    fn pass_turn(&mut self, to: PlayerId, now: Instant) {
        self.current_turn = Some(to);
        self.start_turn_clock(now);
    }

    fn finish(
        &mut self,
        winner: PlayerId,
        loser: PlayerId,
        reason: GameOverReason,
        flag_capture: bool,
        disconnect_win: bool,
        now: Instant,
    ) {
        self.phase = Phase::GameOver;
        self.tie = None;
        self.current_turn = None;
        self.turn_started_at = None;
        self.ready.clear();
        self.rematch_votes.clear();
        self.timers
            .cancel_where(|k| !matches!(k, RoomTimer::Grace(_)));

        self.last_result = Some(GameResult { winner, loser, reason, flag_capture, disconnect_win });
        info!(room_id = %self.id, %winner, %loser, ?reason, "match finished");
        self.push(
            Recipient::All,
            ServerMessage::GameOver { winner_id: winner, flag_capture, disconnect_win, reason },
        );

        if !self.result_persisted {
            self.result_persisted = true;
            self.pending_outcome = Some(MatchOutcome {
                room_id: self.id.clone(),
                winner,
                loser,
                reason,
                flag_capture,
                disconnect_win,
                finished_at_ms: unix_millis_at(now, now),
            });
        }
    }

    // -----------------------------------------------------------------------
    // Moves and combat
    // -----------------------------------------------------------------------

    /// Carries out a move that already passed validation.
    fn execute_move(&mut self, mover: PlayerId, mv: Move, now: Instant) {
        let Some(opponent) = self.opponent_of(mover) else {
            return;
        };
        let Some(attacker) = self.grid.get(mv.from).map(|u| u.kind) else {
            return;
        };
        let Some(defender) = self.grid.get(mv.to).map(|u| u.kind) else {
            self.grid.relocate(mv.from, mv.to);
            debug!(room_id = %self.id, player = %mover, from = %mv.from, to = %mv.to, "unit moved");
            self.pass_turn(opponent, now);
            self.broadcast_state();
            return;
        };

        let encounter = combat::resolve(attacker, defender);
        match encounter {
            Encounter::FlagCaptured => {
                self.grid.relocate(mv.from, mv.to);
                self.reveal(mv.to);
                self.broadcast_state();
                self.finish(mover, opponent, GameOverReason::FlagCaptured, true, false, now);
            }
            Encounter::Standoff => self.open_tie_break(mover, opponent, mv, attacker, now),
            Encounter::AttackerWins | Encounter::DefenderWins | Encounter::TrapKills => {
                if encounter == Encounter::AttackerWins {
                    self.grid.relocate(mv.from, mv.to);
                } else {
                    self.grid.take(mv.from);
                }
                self.reveal(mv.to);

                let Some(result) = encounter.result() else {
                    return;
                };
                let report = combat::report(attacker, defender, result);
                let battle_id = BattleId::new(next_encounter(), 0);
                debug!(room_id = %self.id, %battle_id, ?result, "combat resolved");

                self.pass_turn(opponent, now);
                let winner = turn::exhaustion_winner(&self.grid, mover, opponent);
                self.push_each(|room, viewer| ServerMessage::CombatEvent {
                    battle_id: battle_id.clone(),
                    attacker_id: mover,
                    report,
                    from: mv.from,
                    to: mv.to,
                    state: room.state_for(viewer),
                });
                if let Some(winner) = winner {
                    let loser = if winner == mover { opponent } else { mover };
                    self.finish(winner, loser, GameOverReason::NoMobileUnits, false, false, now);
                }
            }
        }
    }

    fn open_tie_break(
        &mut self,
        attacker: PlayerId,
        defender: PlayerId,
        mv: Move,
        kind: UnitKind,
        now: Instant,
    ) {
        let tie = TieBreaker::new(next_encounter(), mv.from, mv.to, attacker, defender, kind);
        let battle_id = tie.battle_id();
        self.timers.cancel(&RoomTimer::TurnClock);
        let deadline = self
            .timers
            .schedule_in(RoomTimer::TieBreak, now, self.config.tie_break_window);
        self.phase = Phase::TieBreaker;
        self.tie = Some(tie);
        info!(room_id = %self.id, %battle_id, %attacker, %defender, %kind, "sudden death");

        self.push(
            Recipient::All,
            ServerMessage::TieBreakStart {
                battle_id,
                deadline: unix_millis_at(deadline, now),
                unit_kind: kind,
                from: mv.from,
                to: mv.to,
            },
        );
    }

    fn on_tie_break_timer(&mut self, now: Instant, rng: &mut impl Rng) {
        let Some(tie) = self.tie.as_mut() else {
            return;
        };
        match tie.stage() {
            TieStage::Choosing => {
                let battle_id = tie.battle_id();
                debug!(room_id = %self.id, %battle_id, "tie-break window closed");
                self.resolve_tie_break(&battle_id, now, rng);
            }
            TieStage::Revealing => {
                tie.finish_reveal();
                let Some(battle_id) = tie.open_round() else {
                    return;
                };
                let (from, to) = (tie.from, tie.to);
                let deadline = self
                    .timers
                    .schedule_in(RoomTimer::TieBreak, now, self.config.tie_break_window);
                info!(room_id = %self.id, %battle_id, "sudden death restarted");
                self.push(
                    Recipient::All,
                    ServerMessage::TieBreakRestart {
                        battle_id,
                        deadline: unix_millis_at(deadline, now),
                        from,
                        to,
                    },
                );
            }
            TieStage::Restarting | TieStage::Resolved => {}
        }
    }

    /// Resolves round `battle_id`. A call for a round that is no longer
    /// current, or one already being resolved, does nothing.
    fn resolve_tie_break(&mut self, battle_id: &BattleId, now: Instant, rng: &mut impl Rng) {
        let Some(tie) = self.tie.as_mut() else {
            return;
        };
        if tie.battle_id() != *battle_id {
            debug!(room_id = %self.id, %battle_id, "stale tie-break resolution ignored");
            return;
        }
        let Some(outcome) = tie.resolve(rng) else {
            debug!(room_id = %self.id, %battle_id, "tie-break already resolved");
            return;
        };
        let (from, to, attacker, defender) = (tie.from, tie.to, tie.attacker, tie.defender);

        match outcome {
            RoundOutcome::Draw(throw) => {
                self.timers
                    .schedule_in(RoomTimer::TieBreak, now, self.config.reveal_delay);
                let kind = UnitKind::from(throw);
                let report = combat::report(kind, kind, CombatResult::Draw);
                info!(room_id = %self.id, %battle_id, %kind, "sudden death drawn");
                self.push_each(|room, viewer| ServerMessage::TieBreakTie {
                    battle_id: battle_id.clone(),
                    report,
                    from,
                    to,
                    state: room.state_for(viewer),
                });
            }
            RoundOutcome::Decided { attacker: a, defender: d, attacker_wins } => {
                self.timers.cancel(&RoomTimer::TieBreak);
                self.tie = None;

                let (survivor_at, survivor_kind, result) = if attacker_wins {
                    self.grid.relocate(from, to);
                    (to, UnitKind::from(a), CombatResult::AttackerWins)
                } else {
                    self.grid.take(from);
                    (to, UnitKind::from(d), CombatResult::DefenderWins)
                };
                if let Some(unit) = self.grid.get_mut(survivor_at) {
                    unit.kind = survivor_kind;
                    unit.revealed = true;
                }
                let report = combat::report(a.into(), d.into(), result);
                info!(room_id = %self.id, %battle_id, ?result, "sudden death decided");

                self.phase = Phase::Playing;
                self.pass_turn(defender, now);
                let winner = turn::exhaustion_winner(&self.grid, attacker, defender);
                self.push_each(|room, viewer| ServerMessage::TieBreakResolved {
                    battle_id: battle_id.clone(),
                    attacker_id: attacker,
                    report,
                    from,
                    to,
                    state: room.state_for(viewer),
                });
                if let Some(winner) = winner {
                    let loser = if winner == attacker { defender } else { attacker };
                    self.finish(winner, loser, GameOverReason::NoMobileUnits, false, false, now);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Views and outbound messages
    // -----------------------------------------------------------------------

    /// The sanitized game state for `viewer`.
    pub fn state_for(&self, viewer: PlayerId) -> GameStateView {
        GameStateView {
            phase: self.phase,
            grid: self.grid.view_for(viewer),
            current_turn: self.current_turn,
            players: self.roster(),
        }
    }

    pub fn roster(&self) -> Vec<PlayerInfo> {
        self.seats.iter().map(Seat::info).collect()
    }

    fn readiness(&self) -> Vec<Readiness> {
        self.seats
            .iter()
            .map(|s| Readiness { player_id: s.player_id, ready: self.is_ready(s.player_id) })
            .collect()
    }

    /// Queues the snapshot a (re)joining or resyncing player needs to
    /// rebuild their screen for the current phase.
    fn send_snapshot(&mut self, player: PlayerId, now: Instant) {
        let to = Recipient::Player(player);
        match self.phase {
            Phase::Waiting => {
                self.push(to, ServerMessage::RoomUpdated { players: self.roster() });
            }
            Phase::Setup => {
                let msg = ServerMessage::SetupStart {
                    room_id: self.id.clone(),
                    grid: self.grid.setup_view_for(player),
                    ready: self.readiness(),
                    players: self.roster(),
                };
                self.push(to.clone(), msg);
                if let Some(left) = self.timers.remaining(&RoomTimer::SetupCountdown, now) {
                    self.push(to, ServerMessage::SetupTimer { remaining_seconds: whole_seconds(left) });
                }
            }
            Phase::Playing => {
                let started = self.turn_started_at.unwrap_or(now);
                let msg = ServerMessage::GameStart {
                    state: self.state_for(player),
                    turn_start_time: unix_millis_at(started, now),
                };
                self.push(to, msg);
            }
            Phase::TieBreaker => {
                self.push(to.clone(), ServerMessage::GameStateUpdate { state: self.state_for(player) });
                if let Some(msg) = self.tie_break_snapshot(player, now) {
                    self.push(to, msg);
                }
            }
            Phase::GameOver => {
                self.push(to.clone(), ServerMessage::GameStateUpdate { state: self.state_for(player) });
                if let Some(r) = self.last_result {
                    self.push(
                        to.clone(),
                        ServerMessage::GameOver {
                            winner_id: r.winner,
                            flag_capture: r.flag_capture,
                            disconnect_win: r.disconnect_win,
                            reason: r.reason,
                        },
                    );
                }
                self.push(to, ServerMessage::RematchUpdate { votes: self.rematch_votes() });
            }
        }
    }

    fn tie_break_snapshot(&self, viewer: PlayerId, now: Instant) -> Option<ServerMessage> {
        let tie = self.tie.as_ref()?;
        match tie.stage() {
            TieStage::Choosing => {
                let deadline = self.timers.deadline(&RoomTimer::TieBreak)?;
                Some(ServerMessage::TieBreakStart {
                    battle_id: tie.battle_id(),
                    deadline: unix_millis_at(deadline, now),
                    unit_kind: tie.unit_kind,
                    from: tie.from,
                    to: tie.to,
                })
            }
            TieStage::Revealing | TieStage::Restarting => {
                let kind = UnitKind::from(tie.last_draw()?);
                Some(ServerMessage::TieBreakTie {
                    battle_id: tie.battle_id(),
                    report: combat::report(kind, kind, CombatResult::Draw),
                    from: tie.from,
                    to: tie.to,
                    state: self.state_for(viewer),
                })
            }
            TieStage::Resolved => None,
        }
    }

    fn send_joined(&mut self, player: PlayerId) {
        let Some(seat) = self.seat(player) else {
            return;
        };
        let msg = ServerMessage::Joined {
            room_id: self.id.clone(),
            player_id: player,
            player: seat.info(),
            players: self.roster(),
        };
        self.push(Recipient::Player(player), msg);
    }

    fn broadcast_roster(&mut self) {
        self.push(Recipient::All, ServerMessage::RoomUpdated { players: self.roster() });
    }

    fn broadcast_state(&mut self) {
        self.push_each(|room, viewer| ServerMessage::GameStateUpdate {
            state: room.state_for(viewer),
        });
    }

    fn broadcast_setup_update(&mut self) {
        self.push_each(|room, viewer| ServerMessage::SetupUpdate {
            grid: room.grid.setup_view_for(viewer),
            ready: room.readiness(),
        });
    }

    fn push(&mut self, to: Recipient, msg: ServerMessage) {
        self.outbox.push((to, msg));
    }

    /// Queues one message per seated player, built for that viewer.
    fn push_each(&mut self, build: impl Fn(&Self, PlayerId) -> ServerMessage) {
        let viewers: Vec<PlayerId> = self.seats.iter().map(|s| s.player_id).collect();
        for viewer in viewers {
            let msg = build(self, viewer);
            self.outbox.push((Recipient::Player(viewer), msg));
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn seat_index(&self, player: PlayerId) -> Option<usize> {
        self.seats.iter().position(|s| s.player_id == player)
    }

    fn seat_of(&self, player: PlayerId) -> Result<&Seat, Rejection> {
        self.seat(player).ok_or(Rejection::NotSeated)
    }

    fn expect_phase(&self, phase: Phase) -> Result<(), Rejection> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(Rejection::WrongPhase(self.phase))
        }
    }

    /// The side of a seated player who may still edit their setup.
    fn unready_setup_side(&self, player: PlayerId) -> Result<Side, Rejection> {
        let side = self.seat_of(player)?.side;
        self.expect_phase(Phase::Setup)?;
        if self.is_ready(player) {
            return Err(Rejection::AlreadyReady);
        }
        Ok(side)
    }

    fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
        self.seats
            .iter()
            .find(|s| s.player_id != player)
            .map(|s| s.player_id)
    }

    fn reveal(&mut self, at: Coord) {
        if let Some(unit) = self.grid.get_mut(at) {
            unit.revealed = true;
        }
    }

    fn autofill(&mut self, player: PlayerId, side: Side, rng: &mut impl Rng) {
        let plan = setup::autofill_plan(&self.grid, player, side, rng);
        debug!(room_id = %self.id, %player, placed = plan.len(), "auto-filling setup");
        for (at, kind) in plan {
            let id = self.next_unit_id();
            self.grid.put(at, Unit { id, kind, owner: player, side, revealed: false });
        }
    }

    fn next_unit_id(&mut self) -> UnitId {
        self.next_unit += 1;
        UnitId(self.next_unit)
    }
}

fn coord(row: usize, col: usize) -> Result<Coord, Rejection> {
    Coord::new(row, col).ok_or(Rejection::OutOfBounds { row, col })
}

/// Seconds left, rounded up, as shown on the countdown.
fn whole_seconds(left: Duration) -> u64 {
    left.as_millis().div_ceil(1000) as u64
}

fn clean_name(name: Option<String>) -> Option<String> {
    let name = name?;
    let trimmed: String = name.trim().chars().take(MAX_NAME_CHARS).collect();
    (!trimmed.is_empty()).then_some(trimmed)
}

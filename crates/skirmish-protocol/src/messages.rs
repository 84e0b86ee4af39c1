//! Message catalog: what clients send, what the server pushes back, and
//! the per-viewer board views carried inside server messages.
//!
//! Both unions are internally tagged with a snake_case `type` field:
//!
//! ```text
//! { "type": "move", "from_row": 4, "from_col": 0, "to_row": 3, "to_col": 0 }
//! ```
//!
//! Decoding is the first line of validation. A frame with an unknown tag,
//! a missing field or a value of the wrong type never becomes a
//! `ClientMessage`, so the room never sees it.

use serde::{Deserialize, Serialize};

use crate::{BattleId, Coord, Phase, PlayerId, RoomId, Side, Throw, UnitId, UnitKind};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Frame wrapper for everything the server sends.
///
/// `seq` increases by one per frame on a connection; `timestamp` is
/// milliseconds since the connection was accepted. Together they let a
/// client notice gaps or reordering on a flaky link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<M> {
    pub seq: u64,
    pub timestamp: u64,
    pub payload: M,
}

// ---------------------------------------------------------------------------
// Board views
// ---------------------------------------------------------------------------

/// What a viewer is allowed to know about a cell's unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Rock,
    Paper,
    Scissors,
    Flag,
    Trap,
    /// An opposing unit that has not been revealed yet.
    Hidden,
}

impl From<UnitKind> for CellKind {
    fn from(kind: UnitKind) -> Self {
        match kind {
            UnitKind::Rock => Self::Rock,
            UnitKind::Paper => Self::Paper,
            UnitKind::Scissors => Self::Scissors,
            UnitKind::Flag => Self::Flag,
            UnitKind::Trap => Self::Trap,
        }
    }
}

/// One occupied cell as seen by a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellView {
    pub id: UnitId,
    pub kind: CellKind,
    pub owner: PlayerId,
    pub side: Side,
    pub revealed: bool,
}

/// A viewer-specific 6×6 board, row-major. `None` is an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardView(pub Vec<Vec<Option<CellView>>>);

impl BoardView {
    /// The cell at `at`, if occupied.
    pub fn cell(&self, at: Coord) -> Option<&CellView> {
        self.0.get(at.row)?.get(at.col)?.as_ref()
    }

    /// Number of occupied cells.
    pub fn occupied(&self) -> usize {
        self.0.iter().flatten().filter(|c| c.is_some()).count()
    }
}

/// Public seat information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub team: Option<String>,
    pub side: Side,
    pub connected: bool,
}

/// One player's setup readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub player_id: PlayerId,
    pub ready: bool,
}

/// The sanitized game state sent to one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateView {
    pub phase: Phase,
    pub grid: BoardView,
    pub current_turn: Option<PlayerId>,
    pub players: Vec<PlayerInfo>,
}

/// Outcome of one encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatResult {
    AttackerWins,
    DefenderWins,
    TrapKills,
    /// A sudden-death round where both players threw the same thing.
    Draw,
}

/// Both types shown in a combat reveal plus the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatReport {
    pub attacker_kind: UnitKind,
    pub defender_kind: UnitKind,
    pub result: CombatResult,
}

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    FlagCaptured,
    NoMobileUnits,
    NoLegalMoves,
    Forfeit,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client may send.
///
/// Coordinates are unsigned, so negative values fail to decode; range
/// checks happen in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First frame on a connection.
    Hello { version: u32, token: String },
    /// Keep-alive; echoed back with the server clock.
    Heartbeat { client_time: u64 },
    /// Take (or retake) a seat in a room, creating it if unknown.
    Join {
        room_id: RoomId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        team: Option<String>,
    },
    /// Voluntarily give up the seat. Forfeits a running match.
    Leave,
    Place { row: usize, col: usize, kind: UnitKind },
    Remove { row: usize, col: usize },
    /// Fill the caller's still-empty setup slots.
    Randomize,
    Ready,
    Move {
        from_row: usize,
        from_col: usize,
        to_row: usize,
        to_col: usize,
    },
    TieChoice { choice: Throw },
    RematchRequest,
    /// Ask for the phase-appropriate snapshot again.
    Resync,
    Emote { emoji: String },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Everything the server may push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        player_id: PlayerId,
        server_time: u64,
    },
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },
    /// Explicit rejection for handshake and room-membership problems.
    /// Never used for in-game rule violations.
    Error {
        code: u16,
        message: String,
    },
    Joined {
        room_id: RoomId,
        player_id: PlayerId,
        player: PlayerInfo,
        players: Vec<PlayerInfo>,
    },
    RoomFull {
        room_id: RoomId,
    },
    RoomUpdated {
        players: Vec<PlayerInfo>,
    },
    SetupStart {
        room_id: RoomId,
        grid: BoardView,
        ready: Vec<Readiness>,
        players: Vec<PlayerInfo>,
    },
    SetupUpdate {
        grid: BoardView,
        ready: Vec<Readiness>,
    },
    SetupTimer {
        remaining_seconds: u64,
    },
    GameStart {
        state: GameStateView,
        /// Unix milliseconds at which the first turn started.
        turn_start_time: u64,
    },
    GameStateUpdate {
        state: GameStateView,
    },
    CombatEvent {
        battle_id: BattleId,
        attacker_id: PlayerId,
        #[serde(flatten)]
        report: CombatReport,
        from: Coord,
        to: Coord,
        state: GameStateView,
    },
    TieBreakStart {
        battle_id: BattleId,
        /// Unix milliseconds.
        deadline: u64,
        unit_kind: UnitKind,
        from: Coord,
        to: Coord,
    },
    TieBreakTie {
        battle_id: BattleId,
        #[serde(flatten)]
        report: CombatReport,
        from: Coord,
        to: Coord,
        state: GameStateView,
    },
    TieBreakRestart {
        battle_id: BattleId,
        deadline: u64,
        from: Coord,
        to: Coord,
    },
    TieBreakResolved {
        battle_id: BattleId,
        attacker_id: PlayerId,
        #[serde(flatten)]
        report: CombatReport,
        from: Coord,
        to: Coord,
        state: GameStateView,
    },
    GameOver {
        winner_id: PlayerId,
        flag_capture: bool,
        disconnect_win: bool,
        reason: GameOverReason,
    },
    RematchUpdate {
        votes: Vec<PlayerId>,
    },
    PlayerDisconnected {
        player_id: PlayerId,
    },
    PlayerReconnected {
        player_id: PlayerId,
    },
    Emote {
        player_id: PlayerId,
        emoji: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_move_json_format() {
        let json = r#"{"type":"move","from_row":4,"from_col":1,"to_row":3,"to_col":1}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Move { from_row: 4, from_col: 1, to_row: 3, to_col: 1 }
        );
    }

    #[test]
    fn test_client_join_optional_metadata_defaults() {
        let json = r#"{"type":"join","room_id":"abc"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join { room_id: RoomId::new("abc"), name: None, team: None }
        );
    }

    #[test]
    fn test_client_negative_coordinate_fails_to_decode() {
        let json = r#"{"type":"remove","row":-1,"col":0}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_client_unknown_type_fails_to_decode() {
        let json = r#"{"type":"teleport","row":1}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_client_tie_choice_rejects_flag() {
        let json = r#"{"type":"tie_choice","choice":"flag"}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_unit_tags_are_snake_case() {
        let json = serde_json::to_value(ClientMessage::RematchRequest).unwrap();
        assert_eq!(json["type"], "rematch_request");
        let json = serde_json::to_value(ServerMessage::RoomFull {
            room_id: RoomId::new("r"),
        })
        .unwrap();
        assert_eq!(json["type"], "room_full");
    }

    #[test]
    fn test_combat_event_flattens_report() {
        let msg = ServerMessage::CombatEvent {
            battle_id: BattleId::new(3, 0),
            attacker_id: PlayerId(1),
            report: CombatReport {
                attacker_kind: UnitKind::Rock,
                defender_kind: UnitKind::Scissors,
                result: CombatResult::AttackerWins,
            },
            from: Coord { row: 3, col: 0 },
            to: Coord { row: 2, col: 0 },
            state: GameStateView {
                phase: Phase::Playing,
                grid: BoardView(vec![vec![None; 6]; 6]),
                current_turn: Some(PlayerId(2)),
                players: vec![],
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "combat_event");
        assert_eq!(json["battle_id"], "b3.0");
        assert_eq!(json["attacker_kind"], "rock");
        assert_eq!(json["result"], "attacker_wins");
        assert_eq!(json["to"]["row"], 2);
        assert_eq!(json["state"]["phase"], "PLAYING");
    }

    #[test]
    fn test_hidden_cell_kind_serializes_as_marker() {
        let json = serde_json::to_string(&CellKind::Hidden).unwrap();
        assert_eq!(json, "\"hidden\"");
    }

    #[test]
    fn test_game_over_json_format() {
        let msg = ServerMessage::GameOver {
            winner_id: PlayerId(9),
            flag_capture: false,
            disconnect_win: true,
            reason: GameOverReason::Forfeit,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["winner_id"], 9);
        assert_eq!(json["disconnect_win"], true);
        assert_eq!(json["reason"], "forfeit");
    }

    #[test]
    fn test_envelope_wraps_payload() {
        let env = Envelope {
            seq: 4,
            timestamp: 120,
            payload: ServerMessage::SetupTimer { remaining_seconds: 12 },
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["seq"], 4);
        assert_eq!(json["payload"]["type"], "setup_timer");
        assert_eq!(json["payload"]["remaining_seconds"], 12);
    }

    #[test]
    fn test_board_view_cell_lookup() {
        let mut rows = vec![vec![None; 6]; 6];
        rows[1][2] = Some(CellView {
            id: UnitId(5),
            kind: CellKind::Hidden,
            owner: PlayerId(2),
            side: Side::Top,
            revealed: false,
        });
        let board = BoardView(rows);
        assert_eq!(board.occupied(), 1);
        assert_eq!(board.cell(Coord { row: 1, col: 2 }).unwrap().id, UnitId(5));
        assert!(board.cell(Coord { row: 0, col: 0 }).is_none());
    }
}

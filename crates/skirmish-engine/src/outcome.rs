//! Finished-match records.

use serde::{Deserialize, Serialize};
use skirmish_protocol::{GameOverReason, PlayerId, RoomId};

/// How the last match in a room ended. Kept for resync snapshots while
/// the room sits in GAME_OVER.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameResult {
    pub winner: PlayerId,
    pub loser: PlayerId,
    pub reason: GameOverReason,
    pub flag_capture: bool,
    pub disconnect_win: bool,
}

/// The record handed to a result sink, exactly once per finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub room_id: RoomId,
    pub winner: PlayerId,
    pub loser: PlayerId,
    pub reason: GameOverReason,
    pub flag_capture: bool,
    pub disconnect_win: bool,
    /// Unix milliseconds.
    pub finished_at_ms: u64,
}

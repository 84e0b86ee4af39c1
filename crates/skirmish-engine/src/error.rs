//! Why the engine refused something.

use skirmish_protocol::{Coord, Phase, RoomId, UnitKind};

/// A rejected player action.
///
/// Rejections are the normal way the engine says "no": the room state is
/// left exactly as it was, the reason is logged at debug level and the
/// client hears nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("player is not seated in this room")]
    NotSeated,

    #[error("action not allowed in phase {0}")]
    WrongPhase(Phase),

    #[error("not this player's turn")]
    NotYourTurn,

    #[error("coordinate ({row},{col}) is off the board")]
    OutOfBounds { row: usize, col: usize },

    #[error("{0} is not one of the player's setup cells")]
    NotOwnSetupCell(Coord),

    #[error("{0} is already occupied")]
    CellOccupied(Coord),

    #[error("no unit of this player at {0}")]
    NoOwnUnit(Coord),

    #[error("quota for {0} is exhausted")]
    QuotaExceeded(UnitKind),

    #[error("army is not complete")]
    IncompleteArmy,

    #[error("player is already ready")]
    AlreadyReady,

    #[error("{0} cannot move")]
    Immobile(UnitKind),

    #[error("{from} and {to} are not orthogonally adjacent")]
    NotAdjacent { from: Coord, to: Coord },

    #[error("{0} holds one of the mover's own units")]
    OwnUnitAtTarget(Coord),

    #[error("player is not part of the current encounter")]
    NotInEncounter,

    #[error("a choice was already submitted this round")]
    AlreadyChose,

    #[error("the round is not accepting choices")]
    RoundClosed,

    #[error("player is not connected")]
    NotConnected,

    #[error("emote must be 1 to {max} characters")]
    InvalidEmote { max: usize },
}

/// Why a join was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("room {0} is full")]
    RoomFull(RoomId),
}

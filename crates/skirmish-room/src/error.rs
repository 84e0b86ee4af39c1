//! Error types for the room layer.

use skirmish_engine::JoinError;
use skirmish_protocol::{PlayerId, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No live room has this id.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// Both seats are held by other identities.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The player holds no seat in this room.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomId),

    /// The id is empty, too long or contains control characters.
    #[error("invalid room id {0:?}")]
    InvalidRoomId(String),

    /// The room's command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl From<JoinError> for RoomError {
    fn from(err: JoinError) -> Self {
        match err {
            JoinError::RoomFull(id) => Self::RoomFull(id),
        }
    }
}

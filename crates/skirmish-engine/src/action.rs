//! In-match actions a seated player can take.

use skirmish_protocol::{ClientMessage, Throw, UnitKind};

/// A player action routed to [`Room::apply`](crate::Room::apply).
///
/// Coordinates are raw because range checking is part of validation.
/// Seat membership messages (join, leave, disconnect) have their own
/// entry points on the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Place { row: usize, col: usize, kind: UnitKind },
    Remove { row: usize, col: usize },
    Randomize,
    Ready,
    Move { from_row: usize, from_col: usize, to_row: usize, to_col: usize },
    TieChoice(Throw),
    RematchRequest,
    Resync,
    Emote(String),
}

impl Action {
    /// Short label for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Place { .. } => "place",
            Self::Remove { .. } => "remove",
            Self::Randomize => "randomize",
            Self::Ready => "ready",
            Self::Move { .. } => "move",
            Self::TieChoice(_) => "tie_choice",
            Self::RematchRequest => "rematch_request",
            Self::Resync => "resync",
            Self::Emote(_) => "emote",
        }
    }

    /// The in-match action carried by a client frame, if it is one.
    ///
    /// Connection-level frames (`hello`, `heartbeat`, `join`, `leave`)
    /// yield `None`; the server handles those itself.
    pub fn from_client(msg: ClientMessage) -> Option<Self> {
        let action = match msg {
            ClientMessage::Place { row, col, kind } => Self::Place { row, col, kind },
            ClientMessage::Remove { row, col } => Self::Remove { row, col },
            ClientMessage::Randomize => Self::Randomize,
            ClientMessage::Ready => Self::Ready,
            ClientMessage::Move { from_row, from_col, to_row, to_col } => {
                Self::Move { from_row, from_col, to_row, to_col }
            }
            ClientMessage::TieChoice { choice } => Self::TieChoice(choice),
            ClientMessage::RematchRequest => Self::RematchRequest,
            ClientMessage::Resync => Self::Resync,
            ClientMessage::Emote { emoji } => Self::Emote(emoji),
            ClientMessage::Hello { .. }
            | ClientMessage::Heartbeat { .. }
            | ClientMessage::Join { .. }
            | ClientMessage::Leave => return None,
        };
        Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_protocol::RoomId;

    #[test]
    fn test_game_frames_become_actions() {
        assert_eq!(
            Action::from_client(ClientMessage::Move { from_row: 4, from_col: 1, to_row: 3, to_col: 1 }),
            Some(Action::Move { from_row: 4, from_col: 1, to_row: 3, to_col: 1 })
        );
        assert_eq!(
            Action::from_client(ClientMessage::TieChoice { choice: Throw::Paper }),
            Some(Action::TieChoice(Throw::Paper))
        );
        assert_eq!(
            Action::from_client(ClientMessage::Emote { emoji: "gg".into() }),
            Some(Action::Emote("gg".into()))
        );
    }

    #[test]
    fn test_connection_frames_are_not_actions() {
        assert_eq!(Action::from_client(ClientMessage::Leave), None);
        assert_eq!(Action::from_client(ClientMessage::Heartbeat { client_time: 5 }), None);
        assert_eq!(
            Action::from_client(ClientMessage::Join { room_id: RoomId::new("r"), name: None, team: None }),
            None
        );
    }
}

//! Seats: the binding between a player identity and a live connection.

use std::fmt;

use skirmish_protocol::{PlayerId, PlayerInfo, Side};

/// Identifies one transport connection.
///
/// Assigned by the server when a socket is accepted. A seat remembers the
/// id of the connection it is bound to, so a late disconnect from a
/// connection that has since been replaced can be told apart and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// One of the two places at a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub player_id: PlayerId,
    pub side: Side,
    pub name: String,
    pub team: Option<String>,
    /// `None` while the player is inside the reconnect grace window.
    pub connection: Option<ConnectionId>,
}

impl Seat {
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.player_id,
            name: self.name.clone(),
            team: self.team.clone(),
            side: self.side,
            connected: self.is_connected(),
        }
    }
}

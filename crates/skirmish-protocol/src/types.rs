//! Core protocol types: identities and the board vocabulary.
//!
//! Everything here is small, `Copy` where possible, and serializes to the
//! plain JSON shapes the browser client expects (numbers, lowercase
//! strings), never to serde's default `{ "Variant": ... }` wrappers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side length of the square board.
pub const GRID_SIZE: usize = 6;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable player identity.
///
/// This is the authenticated identity, not the transport session: it
/// survives reconnection, and a seat in a room is keyed by it.
///
/// `#[serde(transparent)]` makes `PlayerId(42)` serialize as just `42`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A room identifier chosen by the client that creates it.
///
/// Rooms are addressed by name (a lobby code), so unlike player ids this
/// wraps a `String`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Longest room id accepted at the boundary.
    pub const MAX_LEN: usize = 64;

    /// Creates a room id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns `true` if the id is non-empty, not too long and printable.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= Self::MAX_LEN
            && self.0.chars().all(|c| !c.is_control())
    }

    /// Borrows the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a single unit on the board, unique within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u32);

/// Identifier attached to every combat and tie-breaker event.
///
/// The encounter number is process-wide unique; the round distinguishes
/// successive sudden-death rounds of the same encounter. Receivers use it
/// to discard duplicated or reordered deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BattleId(pub String);

impl BattleId {
    /// Builds the id for `round` of `encounter` (round 0 is the
    /// original collision).
    pub fn new(encounter: u64, round: u32) -> Self {
        Self(format!("b{encounter}.{round}"))
    }
}

impl fmt::Display for BattleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive a message?
// ---------------------------------------------------------------------------

/// Specifies who should receive a server message.
///
/// Room logic returns `(Recipient, ServerMessage)` pairs and the room
/// actor delivers them. Most messages are per-viewer (fog of war), so
/// `Player` is by far the most common variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every seated, connected player.
    All,
    /// One specific player.
    Player(PlayerId),
    /// Everyone except the specified player.
    AllExcept(PlayerId),
}

// ---------------------------------------------------------------------------
// Board vocabulary
// ---------------------------------------------------------------------------

/// Which half of the board a player owns. Fixed at seat assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Rows 4–5; moves first.
    Bottom,
    /// Rows 0–1.
    Top,
}

impl Side {
    /// The other side.
    pub fn opposite(self) -> Self {
        match self {
            Self::Bottom => Self::Top,
            Self::Top => Self::Bottom,
        }
    }

    /// The two back rows a player of this side places units on.
    pub fn setup_rows(self) -> [usize; 2] {
        match self {
            Self::Bottom => [GRID_SIZE - 2, GRID_SIZE - 1],
            Self::Top => [0, 1],
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bottom => f.write_str("bottom"),
            Self::Top => f.write_str("top"),
        }
    }
}

/// The five unit types.
///
/// Rock, paper and scissors are mobile fighters; flag and trap never move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Rock,
    Paper,
    Scissors,
    Flag,
    Trap,
}

impl UnitKind {
    /// The three fighter types, in a fixed order.
    pub const FIGHTERS: [UnitKind; 3] = [Self::Rock, Self::Paper, Self::Scissors];

    /// Flags and traps can never be the source of a move.
    pub fn is_mobile(self) -> bool {
        !matches!(self, Self::Flag | Self::Trap)
    }

    /// Rock beats scissors, scissors beats paper, paper beats rock.
    /// Flag and trap never "beat" anything through this table.
    pub fn beats(self, other: UnitKind) -> bool {
        matches!(
            (self, other),
            (Self::Rock, Self::Scissors)
                | (Self::Scissors, Self::Paper)
                | (Self::Paper, Self::Rock)
        )
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Rock => "rock",
            Self::Paper => "paper",
            Self::Scissors => "scissors",
            Self::Flag => "flag",
            Self::Trap => "trap",
        };
        f.write_str(s)
    }
}

/// A secret sudden-death choice. Only the three fighters are valid, so a
/// `tie_choice` of `"flag"` fails to decode instead of reaching the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Throw {
    Rock,
    Paper,
    Scissors,
}

impl Throw {
    /// All three throws.
    pub const ALL: [Throw; 3] = [Self::Rock, Self::Paper, Self::Scissors];

    /// Same advantage table as the board fighters.
    pub fn beats(self, other: Throw) -> bool {
        UnitKind::from(self).beats(UnitKind::from(other))
    }
}

impl From<Throw> for UnitKind {
    fn from(throw: Throw) -> Self {
        match throw {
            Throw::Rock => UnitKind::Rock,
            Throw::Paper => UnitKind::Paper,
            Throw::Scissors => UnitKind::Scissors,
        }
    }
}

/// A board coordinate. Always in range once constructed through
/// [`Coord::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    /// Returns `None` if the coordinate lies outside the board.
    pub fn new(row: usize, col: usize) -> Option<Self> {
        (row < GRID_SIZE && col < GRID_SIZE).then_some(Self { row, col })
    }

    /// Orthogonal neighbours that are on the board. Edge cells have three,
    /// corners two.
    pub fn neighbours(self) -> Vec<Coord> {
        let mut out = Vec::with_capacity(4);
        if self.row > 0 {
            out.push(Coord { row: self.row - 1, col: self.col });
        }
        if self.row + 1 < GRID_SIZE {
            out.push(Coord { row: self.row + 1, col: self.col });
        }
        if self.col > 0 {
            out.push(Coord { row: self.row, col: self.col - 1 });
        }
        if self.col + 1 < GRID_SIZE {
            out.push(Coord { row: self.row, col: self.col + 1 });
        }
        out
    }

    /// Returns `true` if `other` is exactly one step away horizontally or
    /// vertically.
    pub fn is_adjacent(self, other: Coord) -> bool {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col) == 1
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a room.
///
/// ```text
/// Waiting → Setup → Playing ⇄ TieBreaker
///                      ↓          ↓
///                   GameOver ←────┘
///                      ↓ (rematch)
///                    Setup
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Waiting,
    Setup,
    Playing,
    TieBreaker,
    GameOver,
}

impl Phase {
    /// Setup, Playing and TieBreaker: a vanished player forfeits.
    pub fn is_match_running(self) -> bool {
        matches!(self, Self::Setup | Self::Playing | Self::TieBreaker)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "WAITING",
            Self::Setup => "SETUP",
            Self::Playing => "PLAYING",
            Self::TieBreaker => "TIE_BREAKER",
            Self::GameOver => "GAME_OVER",
        };
        f.write_str(s)
    }
}

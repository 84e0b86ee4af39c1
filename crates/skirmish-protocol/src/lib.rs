//! Wire protocol for Skirmish.
//!
//! This crate defines the "language" that clients and the match server speak:
//!
//! - **Types** ([`PlayerId`], [`RoomId`], [`UnitKind`], [`Phase`], ...) -
//!   identities and board vocabulary shared by every layer.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`], [`Envelope`]) -
//!   the tagged unions that travel on the wire, plus the per-viewer
//!   views of the board.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! The protocol layer knows nothing about rooms, timers or sockets.
//! Malformed payloads are rejected here, by deserialization, before any
//! game state is touched.

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{
    BoardView, CellKind, CellView, ClientMessage, CombatReport, CombatResult,
    Envelope, GameOverReason, GameStateView, PlayerInfo, Readiness,
    ServerMessage,
};
pub use types::{
    BattleId, Coord, Phase, PlayerId, Recipient, RoomId, Side, Throw, UnitId,
    UnitKind, GRID_SIZE,
};

/// The current protocol version. Clients must send this in their
/// `hello` or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

//! The authoritative match engine for Skirmish.
//!
//! Everything in this crate is synchronous and deterministic given its
//! inputs: each operation takes the current [`Instant`](tokio::time::Instant)
//! and, where it needs randomness, an injected [`rand::Rng`]. The room
//! actor in `skirmish-room` supplies both; tests supply a fixed clock and
//! a seeded RNG.
//!
//! # Key types
//!
//! - [`Room`]: the aggregate: phase state machine, seats, grid, timers
//! - [`Grid`] / [`Unit`]: the 6×6 board and fog-of-war sanitization
//! - [`combat::resolve`]: one attacker/defender encounter
//! - [`TieBreaker`]: the sudden-death sub-state-machine
//! - [`setup`]: placement quotas and timeout auto-fill
//! - [`turn`]: move validation, legal moves, terminal condition
//! - [`MatchConfig`]: every duration the engine uses

mod action;
mod board;
mod clock;
pub mod combat;
mod config;
mod error;
mod outcome;
mod room;
mod seat;
pub mod setup;
mod tiebreak;
pub mod turn;

pub use action::Action;
pub use board::{Composition, Grid, Unit};
pub use clock::{unix_millis_at, unix_millis_now};
pub use config::MatchConfig;
pub use error::{JoinError, Rejection};
pub use outcome::{GameResult, MatchOutcome};
pub use room::{Room, RoomTimer};
pub use seat::{ConnectionId, Seat};
pub use tiebreak::{RoundOutcome, TieBreaker, TieStage};

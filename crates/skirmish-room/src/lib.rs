//! Room hosting for Skirmish.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns one
//! [`skirmish_engine::Room`]. The actor feeds it commands, sweep ticks and
//! deadline wake-ups, then fans the drained messages out to the seated
//! players' connections.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: room id → running actor; creates on first join
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`ResultSink`]: where finished-match outcomes go

mod actor;
mod error;
mod registry;
mod sink;

pub use actor::{PlayerSender, RoomHandle, RoomInfo};
pub use error::RoomError;
pub use registry::{RegistryConfig, RoomRegistry};
pub use sink::{JsonLinesSink, MemorySink, ResultSink, SinkError, TracingSink};

//! # Skirmish
//!
//! Authoritative WebSocket server for a two-player hidden-information
//! grid battle: six-by-six board, rock-paper-scissors combat, sudden-death
//! tie-breakers, per-viewer fog of war.
//!
//! The layers, leaves first:
//!
//! - `skirmish-protocol`: wire messages and the codec
//! - `skirmish-timer`: cancellable deadlines and the sweep cadence
//! - `skirmish-engine`: the synchronous match engine
//! - `skirmish-room`: one actor task per room, the registry, result sinks
//! - this crate: listener, handshake, per-connection routing

mod auth;
mod config;
mod error;
mod handler;
mod results;
mod server;
mod transport;

pub use auth::{AuthError, Authenticator, TokenAuthenticator};
pub use config::{ConfigError, ServerConfig};
pub use error::SkirmishError;
pub use handler::{ERR_BAD_REQUEST, ERR_UNAUTHORIZED, ERR_UNAVAILABLE};
pub use results::ResultsSink;
pub use server::{SkirmishServer, SkirmishServerBuilder};
pub use transport::{TransportError, WebSocketConnection, WebSocketListener};

/// Everything needed to start a server.
pub mod prelude {
    pub use crate::{
        AuthError, Authenticator, ResultsSink, ServerConfig, SkirmishError, SkirmishServer,
        SkirmishServerBuilder, TokenAuthenticator,
    };
    pub use skirmish_engine::MatchConfig;
    pub use skirmish_protocol::{PlayerId, RoomId};
    pub use skirmish_room::{JsonLinesSink, MemorySink, ResultSink, TracingSink};
}

//! Unified error type for the Skirmish server.

use skirmish_protocol::ProtocolError;
use skirmish_room::RoomError;

use crate::{AuthError, ConfigError, TransportError};

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` conversions let `?` lift a layer error straight into
/// this type.
#[derive(Debug, thiserror::Error)]
pub enum SkirmishError {
    /// Socket accept, send or receive failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame failed to encode or decode, or broke the handshake.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The handshake token was rejected.
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Room(#[from] RoomError),

    /// A malformed environment setting.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_protocol::RoomId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let skirmish_err: SkirmishError = err.into();
        assert!(matches!(skirmish_err, SkirmishError::Transport(_)));
        assert!(skirmish_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let skirmish_err: SkirmishError = err.into();
        assert!(matches!(skirmish_err, SkirmishError::Protocol(_)));
    }

    #[test]
    fn test_from_auth_error() {
        let err = AuthError::InvalidToken("nope".into());
        let skirmish_err: SkirmishError = err.into();
        assert!(matches!(skirmish_err, SkirmishError::Auth(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::RoomFull(RoomId::new("r1"));
        let skirmish_err: SkirmishError = err.into();
        assert!(matches!(skirmish_err, SkirmishError::Room(_)));
        assert_eq!(skirmish_err.to_string(), "room r1 is full");
    }

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::Invalid {
            var: "SKIRMISH_GRACE_SECS",
            value: "soon".into(),
        };
        let skirmish_err: SkirmishError = err.into();
        assert!(matches!(skirmish_err, SkirmishError::Config(_)));
        assert!(skirmish_err.to_string().contains("SKIRMISH_GRACE_SECS"));
    }
}

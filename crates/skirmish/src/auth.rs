//! Authentication hook for validating player identity.
//!
//! Skirmish doesn't implement authentication itself. It defines the
//! [`Authenticator`] trait: one async method that takes the token from
//! the client's `hello` and returns a [`PlayerId`] or an error. The
//! identity it returns is what a seat is bound to, so the same token on a
//! new connection reclaims the same seat.

use std::future::Future;

use skirmish_protocol::PlayerId;

/// Why a token was refused.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token is malformed.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token is well-formed but not accepted.
    #[error("authentication rejected: {0}")]
    Rejected(String),
}

/// Validates a client's auth token and returns their identity.
///
/// `Send + Sync + 'static` because one authenticator is shared by every
/// connection task for the lifetime of the server.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<PlayerId, AuthError>> + Send;
}

/// Development authenticator: the token is the player id itself.
///
/// Accepts any positive integer. Never use this in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenAuthenticator;

impl Authenticator for TokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<PlayerId, AuthError> {
        let id: u64 = token
            .trim()
            .parse()
            .map_err(|_| AuthError::InvalidToken("token must be a number".into()))?;
        if id == 0 {
            return Err(AuthError::Rejected("player id 0 is reserved".into()));
        }
        Ok(PlayerId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_numeric_token_is_the_player_id() {
        let id = TokenAuthenticator.authenticate("42").await.unwrap();
        assert_eq!(id, PlayerId(42));
    }

    #[tokio::test]
    async fn test_non_numeric_token_is_invalid() {
        let err = TokenAuthenticator.authenticate("alice").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_zero_is_rejected() {
        let err = TokenAuthenticator.authenticate("0").await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected(_)));
    }
}

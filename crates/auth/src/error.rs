use thiserror::Error;

use chatgate_core::GatewayError;

/// Credential failures. All of them are terminal for the request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires before it was issued)")]
    InvalidTimeWindow,

    #[error("token carries no subject")]
    MissingSubject,

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

impl From<AuthError> for GatewayError {
    fn from(value: AuthError) -> Self {
        GatewayError::Unauthenticated(value.to_string())
    }
}

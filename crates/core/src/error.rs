//! Gateway error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the pipeline.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Classification of a failed upstream call.
///
/// Every non-2xx response and every transport failure is reduced to exactly
/// one of these before it leaves the upstream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpstreamErrorKind {
    BadRequest,
    Forbidden,
    NotFound,
    Conflict,
    RateLimited,
    ServiceUnavailable,
    Unknown,
}

impl UpstreamErrorKind {
    /// HTTP status surfaced to the gateway's own caller.
    ///
    /// Conflicts and rate limiting surface as validation failures (400).
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest | Self::Conflict | Self::RateLimited => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::ServiceUnavailable => 503,
            Self::Unknown => 502,
        }
    }

    /// Only outages are worth another attempt; application errors are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::RateLimited => "rate_limited",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Unknown => "unknown",
        }
    }
}

impl core::fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized failure of a call to a backend service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} from {source_url}: {message}")]
pub struct UpstreamCallError {
    pub kind: UpstreamErrorKind,
    pub message: String,
    pub source_url: String,
}

impl UpstreamCallError {
    pub fn new(
        kind: UpstreamErrorKind,
        message: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source_url: source_url.into(),
        }
    }

    /// Transport-level failure (timeout, refused connection, DNS).
    pub fn unavailable(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            kind: UpstreamErrorKind::ServiceUnavailable,
            message: format!("Service at {base_url} is temporarily unavailable"),
            source_url: base_url,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Pipeline-level error.
///
/// `Unauthenticated` and `Forbidden` abort the request before the handler
/// runs; `Upstream` carries the classified failure of a backend call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Missing, malformed, invalid or expired credential.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authorization denial (remote policy or local fallback).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A backend call failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamCallError),

    /// Malformed input at the gateway itself.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated(_) => 401,
            Self::Forbidden(_) => 403,
            Self::Upstream(e) => e.kind.status_code(),
            Self::Validation(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code used in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::Upstream(e) => e.kind.as_str(),
            Self::Validation(_) => "validation_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Human-readable message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthenticated(m)
            | Self::Forbidden(m)
            | Self::Validation(m)
            | Self::Internal(m) => m,
            Self::Upstream(e) => &e.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_kinds_surface_expected_statuses() {
        assert_eq!(UpstreamErrorKind::BadRequest.status_code(), 400);
        assert_eq!(UpstreamErrorKind::Conflict.status_code(), 400);
        assert_eq!(UpstreamErrorKind::RateLimited.status_code(), 400);
        assert_eq!(UpstreamErrorKind::Forbidden.status_code(), 403);
        assert_eq!(UpstreamErrorKind::NotFound.status_code(), 404);
        assert_eq!(UpstreamErrorKind::ServiceUnavailable.status_code(), 503);
    }

    #[test]
    fn only_outages_are_retryable() {
        assert!(UpstreamErrorKind::ServiceUnavailable.is_retryable());
        assert!(!UpstreamErrorKind::BadRequest.is_retryable());
        assert!(!UpstreamErrorKind::Forbidden.is_retryable());
        assert!(!UpstreamErrorKind::RateLimited.is_retryable());
    }

    #[test]
    fn unavailable_carries_base_url() {
        let err = UpstreamCallError::unavailable("http://perm:8083");
        assert_eq!(err.kind, UpstreamErrorKind::ServiceUnavailable);
        assert_eq!(err.source_url, "http://perm:8083");
        assert!(err.message.contains("http://perm:8083"));
    }

    #[test]
    fn gateway_error_wraps_upstream_status() {
        let err: GatewayError =
            UpstreamCallError::new(UpstreamErrorKind::NotFound, "no such user", "http://u").into();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.message(), "no such user");
    }
}

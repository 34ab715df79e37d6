use serde_json::Value;

use chatgate_core::{UpstreamCallError, UpstreamErrorKind};

pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";
pub const TOO_MANY_REQUESTS_MESSAGE: &str = "Too many requests. Please try again later.";

/// Error text from an upstream body: `message`, then `error`, then a fixed fallback.
pub fn error_message(body: &Value) -> String {
    ["message", "error"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_ERROR_MESSAGE)
        .to_string()
}

/// Translate a response with status >= 400 into exactly one error kind.
pub fn map_error_response(status: u16, body: &Value, url: &str) -> UpstreamCallError {
    let message = error_message(body);
    let (kind, message) = match status {
        400 => (UpstreamErrorKind::BadRequest, message),
        403 => (UpstreamErrorKind::Forbidden, message),
        404 => (UpstreamErrorKind::NotFound, message),
        409 => (UpstreamErrorKind::Conflict, message),
        429 => (
            UpstreamErrorKind::RateLimited,
            TOO_MANY_REQUESTS_MESSAGE.to_string(),
        ),
        s if s >= 500 => (
            UpstreamErrorKind::ServiceUnavailable,
            format!("Service error at {url}"),
        ),
        _ => (UpstreamErrorKind::BadRequest, message),
    };
    UpstreamCallError::new(kind, message, url)
}

//! Consistent JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use chatgate_core::GatewayError;

/// `{"error": <code>, "message": <text>}` with the given status.
pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// HTTP face of [`GatewayError`].
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl<E> From<E> for ApiError
where
    E: Into<GatewayError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        json_error(status, self.0.code(), self.0.message())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

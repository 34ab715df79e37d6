use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use chatgate_auth::{AuthError, IdentityResolver};

use crate::{context::CallerToken, error::ApiError};

#[derive(Clone)]
pub struct AuthState {
    pub resolver: Arc<IdentityResolver>,
}

/// Resolve the bearer credential into a principal, or reject with 401.
///
/// On success the request carries a [`chatgate_auth::Principal`] and the
/// [`CallerToken`] as extensions.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(token) => token.to_string(),
        Err(e) => return ApiError::from(e).into_response(),
    };

    let principal = match state.resolver.resolve(&token).await {
        Ok(principal) => principal,
        Err(e) => {
            debug!(error = %e, "credential rejected");
            return ApiError::from(e).into_response();
        }
    };

    req.extensions_mut().insert(principal);
    req.extensions_mut().insert(CallerToken(token));

    next.run(req).await
}

/// `Authorization: Bearer <token>` with a non-empty token.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;

    let header = header.to_str().map_err(|_| AuthError::MalformedHeader)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedHeader)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(token)
}

/// Wrap each request in a span carrying a fresh request id.
pub async fn request_span(req: Request, next: Next) -> Response {
    let span = info_span!(
        "request",
        request_id = %Uuid::now_v7(),
        method = %req.method(),
        path = %req.uri().path(),
    );
    next.run(req).instrument(span).await
}

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use chatgate_auth::Principal;

use crate::{app::AppServices, context::RequestContext};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<Principal>) -> impl IntoResponse {
    Json(principal)
}

/// Liveness of the four backend services.
pub async fn services(Extension(services): Extension<AppServices>) -> impl IntoResponse {
    let health = services.backends.services_health().await;
    Json(json!({
        "allUp": health.all_up(),
        "services": health,
    }))
}

/// Exercises the full guard + audit path for a workspace; returns a fresh probe id.
pub async fn audit_probe(
    Path(workspace_id): Path<String>,
    Extension(ctx): Extension<Arc<RequestContext>>,
) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(json!({
            "id": Uuid::now_v7().to_string(),
            "workspaceId": workspace_id,
            "actorId": ctx.principal().map(|p| p.subject_id().to_string()),
            "clientIp": ctx.client_ip(),
            "receivedAt": Utc::now(),
        })),
    )
}

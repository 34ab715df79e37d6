//! HTTP application wiring (Axum router + service wiring).
//!
//! - `routes/`: the gateway's own endpoints
//! - everything cross-cutting (auth, guard, audit) is composed here

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use chatgate_auth::{Hs256Verifier, IdentityResolver, LegacyIdentityStore};
use chatgate_upstream::{BackendServices, UpstreamClient};

use crate::{
    audit::{AuditDispatcher, AuditSpec},
    config::GatewayConfig,
    guard::PermissionGuard,
    middleware,
    pipeline::{Pipeline, RoutePolicy},
};

pub mod routes;

/// Process-wide services shared by every request. Immutable after startup.
#[derive(Clone)]
pub struct AppServices {
    pub backends: BackendServices,
    pub resolver: Arc<IdentityResolver>,
    pub pipeline: Pipeline,
}

impl AppServices {
    /// Wire the upstream client, identity resolver, guard and audit dispatcher.
    pub fn from_config(
        config: &GatewayConfig,
        legacy: Option<Arc<dyn LegacyIdentityStore>>,
    ) -> Result<Self, reqwest::Error> {
        let client = UpstreamClient::new(config.upstream())?;
        let backends = BackendServices::new(client, config.services());

        let verifier = Arc::new(Hs256Verifier::new(config.jwt_secret.as_bytes()));
        let mut resolver = IdentityResolver::new(verifier, config.identity_mode());
        if let Some(store) = legacy {
            resolver = resolver.with_legacy_store(store);
        }

        let backends_arc = Arc::new(backends.clone());
        let pipeline = Pipeline::new(
            PermissionGuard::new(backends_arc.clone()),
            AuditDispatcher::new(backends_arc, config.audit_retry()),
        );

        Ok(Self {
            backends,
            resolver: Arc::new(resolver),
            pipeline,
        })
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices) -> Router {
    let auth_state = middleware::AuthState {
        resolver: services.resolver.clone(),
    };
    let pipeline = services.pipeline.clone();

    // Protected routes: require a resolved principal.
    let protected = Router::new()
        .route("/whoami", get(routes::system::whoami))
        .route(
            "/system/services",
            pipeline.guard(
                get(routes::system::services),
                RoutePolicy::new()
                    .require("system", "read")
                    .audit(AuditSpec::new("READ", "SYSTEM_HEALTH")),
            ),
        )
        .route(
            "/workspaces/:workspaceId/audit-probe",
            pipeline.guard(
                post(routes::system::audit_probe),
                RoutePolicy::new()
                    .require("audit", "create")
                    .audit(AuditSpec::new("CREATE", "AUDIT_PROBE")),
            ),
        )
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::request_span)))
}

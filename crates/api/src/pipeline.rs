//! Per-route policy composition.
//!
//! A route declares what it needs as plain data ([`RoutePolicy`]);
//! [`Pipeline::guard`] turns that into a route layer that runs, in order:
//! request context → permission guard → handler → audit interceptor.

use std::{collections::BTreeMap, net::SocketAddr, sync::Arc, time::Instant};

use axum::{
    body::{Body, to_bytes},
    extract::{ConnectInfo, FromRequestParts, Query, RawPathParams, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::MethodRouter,
};
use chrono::Utc;
use serde_json::Value;
use tracing::error;

use chatgate_auth::{PermissionRequirement, Principal};

use crate::{
    audit::{AuditDispatcher, AuditOutcome, AuditSpec, build_record},
    context::{CallerToken, RequestContext},
    error::{ApiError, json_error},
    guard::PermissionGuard,
};

/// Largest request body the pipeline will buffer.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Largest handler response an audited route will buffer.
pub const MAX_AUDITED_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// What a route requires and how it is audited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    pub permission: Option<PermissionRequirement>,
    pub audit: Option<AuditSpec>,
}

impl RoutePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(
        mut self,
        resource: impl Into<std::borrow::Cow<'static, str>>,
        action: impl Into<std::borrow::Cow<'static, str>>,
    ) -> Self {
        self.permission = Some(PermissionRequirement::new(resource, action));
        self
    }

    pub fn audit(mut self, spec: AuditSpec) -> Self {
        self.audit = Some(spec);
        self
    }
}

/// Shared guard + audit machinery applied to individual routes.
#[derive(Clone)]
pub struct Pipeline {
    guard: PermissionGuard,
    audit: AuditDispatcher,
}

#[derive(Clone)]
struct PolicyState {
    pipeline: Pipeline,
    policy: Arc<RoutePolicy>,
}

impl Pipeline {
    pub fn new(guard: PermissionGuard, audit: AuditDispatcher) -> Self {
        Self { guard, audit }
    }

    pub fn audit(&self) -> &AuditDispatcher {
        &self.audit
    }

    /// Attach `policy` to `route`.
    ///
    /// Must sit inside the auth middleware so the principal is available.
    pub fn guard<S>(&self, route: MethodRouter<S>, policy: RoutePolicy) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let state = PolicyState {
            pipeline: self.clone(),
            policy: Arc::new(policy),
        };
        route.route_layer(axum::middleware::from_fn_with_state(state, run_policy))
    }
}

async fn run_policy(State(state): State<PolicyState>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();

    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return json_error(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "request body too large",
            );
        }
    };
    let json_body = if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice::<Value>(&bytes).ok()
    };

    let ctx = Arc::new(context_from_parts(&mut parts, json_body).await);

    if let Err(e) = state
        .pipeline
        .guard
        .authorize(ctx.principal(), state.policy.permission.as_ref(), &ctx)
        .await
    {
        return ApiError(e).into_response();
    }

    let mut req = Request::from_parts(parts, Body::from(bytes));
    req.extensions_mut().insert(ctx.clone());
    let started = Instant::now();
    let response = next.run(req).await;
    let elapsed = started.elapsed();

    let Some(spec) = state.policy.audit.as_ref() else {
        return response;
    };

    let (parts, body) = response.into_parts();
    let (outcome, response) = match to_bytes(body, MAX_AUDITED_RESPONSE_BYTES).await {
        Ok(bytes) => {
            let payload = serde_json::from_slice::<Value>(&bytes).ok();
            (
                AuditOutcome::from_response(parts.status.as_u16(), payload),
                Response::from_parts(parts, Body::from(bytes)),
            )
        }
        Err(e) => {
            error!(error = %e, "failed to buffer response body");
            (
                AuditOutcome::Failure {
                    status: None,
                    message: Some(e.to_string()),
                },
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "response body failed",
                ),
            )
        }
    };

    let record = build_record(spec, &ctx, &outcome, elapsed, Utc::now());
    state
        .pipeline
        .audit
        .dispatch(record, ctx.bearer().map(str::to_string));

    response
}

async fn context_from_parts(parts: &mut Parts, body: Option<Value>) -> RequestContext {
    let path_params = RawPathParams::from_request_parts(parts, &())
        .await
        .map(|params| {
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();
    let query = Query::<BTreeMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(q)| q)
        .unwrap_or_default();

    RequestContext::builder(parts.method.clone(), parts.uri.path())
        .principal(parts.extensions.get::<Principal>().cloned())
        .bearer(parts.extensions.get::<CallerToken>().map(|t| t.0.clone()))
        .path_params(path_params)
        .query(query)
        .body(body)
        .headers(parts.headers.clone())
        .peer(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        )
        .build()
}

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use chatgate_core::UpstreamErrorKind;
use chatgate_upstream::{
    ActorType, AuditDetails, AuditLogSink, AuditRecord, BackendServices, PermissionCheckRequest,
    PermissionChecker, ServiceUrls, UpstreamClient, UpstreamConfig,
    dto::RoleResponse,
    mapping::TOO_MANY_REQUESTS_MESSAGE,
};
use reqwest::Method;
use serde_json::{Value, json};

const SLOW: Duration = Duration::from_millis(400);

#[derive(Clone, Default)]
struct Backend {
    hits: Arc<AtomicUsize>,
    /// Number of leading calls that stall past the client timeout.
    stall_first: usize,
}

impl Backend {
    fn stalling(n: usize) -> Self {
        Self {
            hits: Arc::default(),
            stall_first: n,
        }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

struct FakeServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeServer {
    async fn spawn(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{addr}"),
            handle,
        }
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn client() -> UpstreamClient {
    UpstreamClient::new(UpstreamConfig {
        api_key: Some("svc-key".to_string()),
        timeout: Duration::from_millis(100),
        retry_delay: Duration::from_millis(10),
        health_timeout: Duration::from_millis(100),
    })
    .unwrap()
}

async fn flaky(State(b): State<Backend>) -> Json<Value> {
    let n = b.hits.fetch_add(1, Ordering::SeqCst);
    if n < b.stall_first {
        tokio::time::sleep(SLOW).await;
    }
    Json(json!({ "success": true, "data": { "id": "u-1" } }))
}

async fn always_500(State(b): State<Backend>) -> (StatusCode, Json<Value>) {
    b.hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "boom" })),
    )
}

async fn always_404(State(b): State<Backend>) -> (StatusCode, Json<Value>) {
    b.hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "User not found" })),
    )
}

#[tokio::test]
async fn get_survives_two_timeouts() {
    let backend = Backend::stalling(2);
    let srv = FakeServer::spawn(
        Router::new()
            .route("/api/users/u-1", get(flaky))
            .with_state(backend.clone()),
    )
    .await;

    let res = client()
        .invoke(&srv.base_url, Method::GET, "/api/users/u-1", None, None)
        .await
        .unwrap();

    assert_eq!(res.status, 200);
    assert_eq!(res.payload["data"]["id"], "u-1");
    assert_eq!(backend.hits(), 3);
}

#[tokio::test]
async fn post_gives_up_after_one_retry() {
    let backend = Backend::stalling(2);
    let srv = FakeServer::spawn(
        Router::new()
            .route("/api/audit/logs", post(flaky))
            .with_state(backend.clone()),
    )
    .await;

    let body = json!({ "x": 1 });
    let err = client()
        .invoke(
            &srv.base_url,
            Method::POST,
            "/api/audit/logs",
            Some(&body),
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, UpstreamErrorKind::ServiceUnavailable);
    assert_eq!(
        err.message,
        format!("Service at {} is temporarily unavailable", srv.base_url)
    );
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn server_errors_are_retried_within_budget() {
    let backend = Backend::default();
    let srv = FakeServer::spawn(
        Router::new()
            .route("/boom", get(always_500))
            .with_state(backend.clone()),
    )
    .await;

    let err = client()
        .invoke(&srv.base_url, Method::GET, "/boom", None, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind, UpstreamErrorKind::ServiceUnavailable);
    assert_eq!(err.message, format!("Service error at {}/boom", srv.base_url));
    assert_eq!(backend.hits(), 3);
}

#[tokio::test]
async fn application_errors_are_not_retried() {
    let backend = Backend::default();
    let srv = FakeServer::spawn(
        Router::new()
            .route("/api/users/missing", get(always_404))
            .with_state(backend.clone()),
    )
    .await;

    let err = client()
        .invoke(&srv.base_url, Method::GET, "/api/users/missing", None, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind, UpstreamErrorKind::NotFound);
    assert_eq!(err.message, "User not found");
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn rate_limit_uses_fixed_message() {
    let srv = FakeServer::spawn(Router::new().route(
        "/limited",
        get(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "message": "quota" })),
            )
        }),
    ))
    .await;

    let err = client()
        .invoke(&srv.base_url, Method::GET, "/limited", None, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind, UpstreamErrorKind::RateLimited);
    assert_eq!(err.message, TOO_MANY_REQUESTS_MESSAGE);
}

#[tokio::test]
async fn refused_connection_maps_to_unavailable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client()
        .invoke(&base_url, Method::DELETE, "/x", None, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind, UpstreamErrorKind::ServiceUnavailable);
    assert_eq!(err.source_url, base_url);
}

#[tokio::test]
async fn credentials_are_forwarded() {
    let srv = FakeServer::spawn(Router::new().route(
        "/echo",
        get(|headers: HeaderMap| async move {
            let h = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            };
            Json(json!({
                "data": {
                    "apiKey": h("x-api-key"),
                    "auth": h("authorization"),
                    "contentType": h("content-type"),
                }
            }))
        }),
    ))
    .await;

    let res = client()
        .invoke(&srv.base_url, Method::GET, "/echo", None, Some("caller-token"))
        .await
        .unwrap();

    assert_eq!(res.payload["data"]["apiKey"], "svc-key");
    assert_eq!(res.payload["data"]["auth"], "Bearer caller-token");
    assert_eq!(res.payload["data"]["contentType"], "application/json");
}

#[tokio::test]
async fn non_envelope_success_body_is_unknown() {
    let srv = FakeServer::spawn(
        Router::new().route("/api/users/u-1", get(|| async { Json(json!([1, 2, 3])) })),
    )
    .await;

    let services = BackendServices::new(
        client(),
        ServiceUrls {
            user: srv.base_url.clone(),
            ..ServiceUrls::default()
        },
    );

    let err = services.get_user("u-1", None).await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::Unknown);
}

#[tokio::test]
async fn typed_operations_round_trip() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::<Value>::new()));
    let seen_audit = seen.clone();

    let srv = FakeServer::spawn(
        Router::new()
            .route(
                "/api/permissions/check",
                post(|Json(req): Json<Value>| async move {
                    let allowed = req["action"] == "read";
                    let reason = if allowed { Value::Null } else { json!("no role") };
                    Json(json!({
                        "success": true,
                        "data": { "allowed": allowed, "reason": reason }
                    }))
                }),
            )
            .route(
                "/api/audit/logs",
                post(move |Json(record): Json<Value>| {
                    let seen = seen_audit.clone();
                    async move {
                        seen.lock().unwrap().push(record);
                        (StatusCode::CREATED, Json(json!({ "success": true, "data": null })))
                    }
                }),
            )
            .route(
                "/api/admin/features/check",
                post(|Json(req): Json<Value>| async move {
                    let enabled = req["featureKey"] == "beta" && req.get("userId").is_none();
                    Json(json!({ "data": { "enabled": enabled } }))
                }),
            ),
    )
    .await;

    let services = BackendServices::new(
        client(),
        ServiceUrls {
            user: srv.base_url.clone(),
            permission: srv.base_url.clone(),
            audit: srv.base_url.clone(),
            admin: srv.base_url.clone(),
        },
    );

    let mut req = PermissionCheckRequest {
        user_id: "u-1".to_string(),
        workspace_id: "ws-1".to_string(),
        resource: "conversation".to_string(),
        action: "read".to_string(),
    };
    assert!(services.check_permission(&req, None).await.unwrap().allowed);
    req.action = "delete".to_string();
    let denied = services.check_permission(&req, None).await.unwrap();
    assert!(!denied.allowed);
    assert_eq!(denied.reason.as_deref(), Some("no role"));

    let record = AuditRecord {
        workspace_id: "ws-1".to_string(),
        actor_id: "u-1".to_string(),
        actor_email: "a@example.com".to_string(),
        actor_type: ActorType::User,
        action: "CREATE".to_string(),
        resource_type: "CONVERSATION".to_string(),
        resource_id: "c-1".to_string(),
        details: AuditDetails {
            method: "POST".to_string(),
            path: "/conversations".to_string(),
            status_code: 200,
            duration_ms: 5,
            success: true,
            error_message: None,
            request_body: Value::Null,
        },
        ip_address: "127.0.0.1".to_string(),
        user_agent: None,
        timestamp: chrono::Utc::now(),
    };
    services.create_audit_log(&record, None).await.unwrap();
    assert_eq!(seen.lock().unwrap()[0]["resourceId"], "c-1");

    assert!(services.check_feature("beta", None, None, None).await.unwrap());
    assert!(!services.check_feature("beta", Some("u-1"), None, None).await.unwrap());
}

#[tokio::test]
async fn health_probes_report_booleans() {
    let srv = FakeServer::spawn(Router::new().route(
        "/actuator/health",
        get(|| async { Json(json!({ "status": "UP" })) }),
    ))
    .await;

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let services = BackendServices::new(
        client(),
        ServiceUrls {
            user: srv.base_url.clone(),
            permission: srv.base_url.clone(),
            audit: dead.clone(),
            admin: srv.base_url.clone(),
        },
    );

    let health = services.services_health().await;
    assert!(health.user && health.permission && health.admin);
    assert!(!health.audit);
    assert!(!health.all_up());
}

#[tokio::test]
async fn invalid_path_segments_never_leave_the_gateway() {
    let services = BackendServices::new(client(), ServiceUrls::default());
    let err = services.get_user("../admin", None).await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::BadRequest);
}

#[tokio::test]
async fn read_operations_decode_envelopes() {
    let srv = FakeServer::spawn(
        Router::new()
            .route(
                "/api/users/:id",
                get(|Path(id): Path<String>| async move {
                    Json(json!({
                        "success": true,
                        "data": { "id": id, "email": "alice@example.com", "status": "online" }
                    }))
                }),
            )
            .route(
                "/api/users/external/:external_id",
                get(|Path(external_id): Path<String>| async move {
                    Json(json!({
                        "success": true,
                        "data": { "id": "507f1f77bcf86cd799439011", "externalId": external_id }
                    }))
                }),
            )
            .route(
                "/api/user-roles/user/:user_id/workspace/:workspace_id",
                get(|Path((user_id, workspace_id)): Path<(String, String)>| async move {
                    Json(json!({
                        "success": true,
                        "data": {
                            "userId": user_id,
                            "workspaceId": workspace_id,
                            "roles": [{
                                "id": "r-1",
                                "name": "editor",
                                "permissions": ["conversation:read", "conversation:write"]
                            }],
                            "permissions": ["conversation:read", "conversation:write"]
                        }
                    }))
                }),
            )
            .route(
                "/api/audit/logs/workspace/:workspace_id",
                get(
                    |Path(workspace_id): Path<String>,
                     Query(q): Query<BTreeMap<String, u32>>| async move {
                        let page = q.get("page").copied().unwrap_or_default();
                        let size = q.get("size").copied().unwrap_or_default();
                        Json(json!({
                            "success": true,
                            "data": {
                                "content": [{
                                    "id": "log-1",
                                    "workspaceId": workspace_id,
                                    "actorId": "u-1",
                                    "action": "CREATE",
                                    "resourceType": "CONVERSATION",
                                    "resourceId": "c-1",
                                    "details": { "statusCode": 200 }
                                }],
                                "page": page,
                                "size": size,
                                "totalElements": 41,
                                "totalPages": 3,
                                "hasNext": true
                            }
                        }))
                    },
                ),
            )
            .route(
                "/api/admin/health/services",
                get(|| async {
                    Json(json!({
                        "success": true,
                        "data": {
                            "overall": "DEGRADED",
                            "services": [
                                { "name": "user-service", "status": "UP", "responseTimeMs": 12 },
                                { "name": "audit-service", "status": "DOWN" }
                            ]
                        }
                    }))
                }),
            ),
    )
    .await;

    let services = BackendServices::new(
        client(),
        ServiceUrls {
            user: srv.base_url.clone(),
            permission: srv.base_url.clone(),
            audit: srv.base_url.clone(),
            admin: srv.base_url.clone(),
        },
    );

    let user = services.get_user("u-1", None).await.unwrap();
    assert_eq!(user.id, "u-1");
    assert_eq!(user.email.as_deref(), Some("alice@example.com"));

    let user = services
        .get_user_by_external_id("8f14e45f-ceea-4b7e", None)
        .await
        .unwrap();
    assert_eq!(user.id, "507f1f77bcf86cd799439011");
    assert_eq!(user.external_id.as_deref(), Some("8f14e45f-ceea-4b7e"));

    let perms = services
        .get_user_permissions("u-1", "ws-1", None)
        .await
        .unwrap();
    assert_eq!(perms.user_id, "u-1");
    assert_eq!(perms.workspace_id, "ws-1");
    assert_eq!(
        perms.roles,
        vec![RoleResponse {
            id: "r-1".to_string(),
            name: "editor".to_string(),
            description: None,
            workspace_id: None,
            permissions: vec!["conversation:read".to_string(), "conversation:write".to_string()],
        }]
    );
    assert_eq!(perms.permissions.len(), 2);

    let logs = services.get_audit_logs("ws-9", 2, 20, None).await.unwrap();
    assert_eq!((logs.page, logs.size), (2, 20));
    assert_eq!(logs.total_elements, 41);
    assert!(logs.has_next);
    assert!(!logs.has_previous);
    assert_eq!(logs.content[0].workspace_id, "ws-9");
    assert_eq!(logs.content[0].actor_email, None);
    assert_eq!(logs.content[0].details["statusCode"], 200);

    let health = services.get_system_health(None).await.unwrap();
    assert_eq!(health.overall, "DEGRADED");
    assert_eq!(health.services.len(), 2);
    assert_eq!(health.services[0].response_time_ms, Some(12));
    assert_eq!(health.services[1].status, "DOWN");
}

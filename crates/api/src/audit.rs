//! Audit interceptor: record building, redaction and detached delivery.
//!
//! One [`AuditRecord`] is produced per completed guarded operation. Delivery
//! runs on a [`TaskTracker`] and never feeds back into the response; records
//! that cannot be delivered within the retry budget are written to the
//! `chatgate::audit::dead_letter` log target.

use std::{borrow::Cow, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use chatgate_core::WorkspaceId;
use chatgate_upstream::{ActorType, AuditDetails, AuditLogSink, AuditRecord, RetryPolicy};

use crate::context::RequestContext;

pub const REDACTED: &str = "[REDACTED]";
pub const SENSITIVE_FIELDS: [&str; 5] = ["password", "token", "secret", "apiKey", "creditCard"];
pub const UNKNOWN_RESOURCE_ID: &str = "unknown";
pub const ANONYMOUS: &str = "anonymous";

const DEAD_LETTER_TARGET: &str = "chatgate::audit::dead_letter";

/// Per-route audit declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSpec {
    pub action: Cow<'static, str>,
    pub resource_type: Cow<'static, str>,
    /// Path parameter holding the resource id, if the route has one.
    pub resource_id_param: Option<Cow<'static, str>>,
}

impl AuditSpec {
    pub fn new(
        action: impl Into<Cow<'static, str>>,
        resource_type: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id_param: None,
        }
    }

    pub fn resource_id_param(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.resource_id_param = Some(name.into());
        self
    }
}

/// How the audited operation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditOutcome {
    /// Operation returned; carries its JSON result when there was one.
    Success(Option<Value>),
    /// Operation failed; `status` is absent when the failure carried none.
    Failure {
        status: Option<u16>,
        message: Option<String>,
    },
}

impl AuditOutcome {
    /// Classify a completed HTTP response.
    pub fn from_response(status: u16, body: Option<Value>) -> Self {
        if status < 400 {
            return Self::Success(body);
        }
        let message = body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Self::Failure {
            status: Some(status),
            message,
        }
    }

    fn status_code(&self) -> u16 {
        match self {
            Self::Success(_) => 200,
            Self::Failure { status, .. } => status.unwrap_or(500),
        }
    }
}

/// Copy of `body` with sensitive top-level fields replaced by [`REDACTED`].
///
/// Only fields holding a non-null value are masked. Non-object bodies are
/// returned unchanged; an absent body becomes `null`.
pub fn redact_body(body: Option<&Value>) -> Value {
    match body {
        None => Value::Null,
        Some(Value::Object(fields)) => {
            let redacted: Map<String, Value> = fields
                .iter()
                .map(|(key, value)| {
                    if SENSITIVE_FIELDS.contains(&key.as_str()) && !value.is_null() {
                        (key.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (key.clone(), value.clone())
                    }
                })
                .collect();
            Value::Object(redacted)
        }
        Some(other) => other.clone(),
    }
}

/// Declared path parameter, then the result's `id`, then `data.id`.
fn resource_id(spec: &AuditSpec, ctx: &RequestContext, outcome: &AuditOutcome) -> String {
    let from_param = spec
        .resource_id_param
        .as_deref()
        .and_then(|name| ctx.path_param(name))
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let from_result = match outcome {
        AuditOutcome::Success(Some(result)) => [result.get("id"), result.pointer("/data/id")]
            .into_iter()
            .flatten()
            .find_map(id_string),
        _ => None,
    };

    from_param
        .or(from_result)
        .unwrap_or_else(|| UNKNOWN_RESOURCE_ID.to_string())
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Assemble the record describing one completed operation.
pub fn build_record(
    spec: &AuditSpec,
    ctx: &RequestContext,
    outcome: &AuditOutcome,
    duration: Duration,
    timestamp: DateTime<Utc>,
) -> AuditRecord {
    let principal = ctx.principal();
    let (success, error_message) = match outcome {
        AuditOutcome::Success(_) => (true, None),
        AuditOutcome::Failure { message, .. } => (false, message.clone()),
    };

    AuditRecord {
        workspace_id: ctx
            .workspace_id()
            .cloned()
            .unwrap_or_else(WorkspaceId::system)
            .into(),
        actor_id: principal
            .map(|p| p.subject_id().to_string())
            .unwrap_or_else(|| ANONYMOUS.to_string()),
        actor_email: principal
            .and_then(|p| p.email())
            .unwrap_or(ANONYMOUS)
            .to_string(),
        actor_type: if principal.is_some() {
            ActorType::User
        } else {
            ActorType::System
        },
        action: spec.action.to_string(),
        resource_type: spec.resource_type.to_string(),
        resource_id: resource_id(spec, ctx, outcome),
        details: AuditDetails {
            method: ctx.method().to_string(),
            path: ctx.path().to_string(),
            status_code: outcome.status_code(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            success,
            error_message,
            request_body: redact_body(ctx.body()),
        },
        ip_address: ctx.client_ip().to_string(),
        user_agent: ctx.user_agent().map(str::to_string),
        timestamp,
    }
}

/// Fire-and-forget delivery of audit records.
#[derive(Clone)]
pub struct AuditDispatcher {
    sink: Arc<dyn AuditLogSink>,
    retry: RetryPolicy,
    tracker: TaskTracker,
}

impl AuditDispatcher {
    pub fn new(sink: Arc<dyn AuditLogSink>, retry: RetryPolicy) -> Self {
        Self {
            sink,
            retry,
            tracker: TaskTracker::new(),
        }
    }

    /// Queue `record` for delivery; returns immediately.
    ///
    /// After [`shutdown`](Self::shutdown) the record goes straight to the dead-letter target.
    pub fn dispatch(&self, record: AuditRecord, bearer: Option<String>) {
        if self.tracker.is_closed() {
            dead_letter(&record, "shutting_down", "audit dispatcher closed");
            return;
        }
        let sink = self.sink.clone();
        let retry = self.retry.clone();
        self.tracker.spawn(async move {
            deliver(sink.as_ref(), &retry, &record, bearer.as_deref()).await;
        });
    }

    /// Deliveries still in flight.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting work and wait up to `grace` for in-flight deliveries.
    ///
    /// Returns `true` when everything drained in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(grace, self.tracker.wait())
            .await
            .is_ok();
        if !drained {
            warn!(
                pending = self.tracker.len(),
                "audit deliveries still pending after grace period"
            );
        }
        drained
    }
}

/// Deliver with bounded retry; returns whether the record was accepted.
async fn deliver(
    sink: &dyn AuditLogSink,
    retry: &RetryPolicy,
    record: &AuditRecord,
    bearer: Option<&str>,
) -> bool {
    let mut retries = 0;
    loop {
        match sink.create_audit_log(record, bearer).await {
            Ok(()) => {
                debug!(
                    action = %record.action,
                    resource_type = %record.resource_type,
                    resource_id = %record.resource_id,
                    "audit log created"
                );
                return true;
            }
            Err(e) if e.is_retryable() && retry.should_retry(retries) => {
                retries += 1;
                warn!(
                    action = %record.action,
                    attempt = retries,
                    kind = %e.kind,
                    error = %e.message,
                    "audit delivery failed; retrying"
                );
                tokio::time::sleep(retry.delay_for_attempt(retries)).await;
            }
            Err(e) => {
                dead_letter(record, e.kind, &e.message);
                return false;
            }
        }
    }
}

fn dead_letter(record: &AuditRecord, kind: impl std::fmt::Display, reason: &str) {
    let payload = serde_json::to_string(record).unwrap_or_default();
    error!(
        target: DEAD_LETTER_TARGET,
        kind = %kind,
        error = %reason,
        record = %payload,
        "audit record dropped"
    );
}

//! Wire shapes exchanged with the backend services (camelCase JSON).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── User service ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_seen_at: Option<String>,
}

// ── Permission service ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCheckRequest {
    pub user_id: String,
    pub workspace_id: String,
    pub resource: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCheckResponse {
    pub allowed: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissionsResponse {
    pub user_id: String,
    pub workspace_id: String,
    #[serde(default)]
    pub roles: Vec<RoleResponse>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

// ── Audit service ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActorType {
    User,
    System,
}

/// Request/outcome details attached to an audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDetails {
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Request body with sensitive fields redacted; `null` when absent.
    pub request_body: Value,
}

/// One audit log entry, as posted to `POST /api/audit/logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub workspace_id: String,
    pub actor_id: String,
    pub actor_email: String,
    pub actor_type: ActorType,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: AuditDetails,
    pub ip_address: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    pub id: String,
    pub workspace_id: String,
    pub actor_id: String,
    #[serde(default)]
    pub actor_email: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

// ── Admin service ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealthResponse {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub response_time_ms: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealthResponse {
    pub overall: String,
    #[serde(default)]
    pub services: Vec<ServiceHealthResponse>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeatureCheckRequest<'a> {
    pub feature_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub(crate) struct FeatureCheckResponse {
    pub enabled: bool,
}

/// Liveness of each backend, as reported by the probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServicesHealth {
    pub user: bool,
    pub permission: bool,
    pub audit: bool,
    pub admin: bool,
}

impl ServicesHealth {
    pub fn all_up(&self) -> bool {
        self.user && self.permission && self.audit && self.admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn audit_record_wire_shape() {
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
                duration_ms: 12,
                success: true,
                error_message: None,
                request_body: json!({ "name": "Alice" }),
            },
            ip_address: "10.0.0.1".to_string(),
            user_agent: Some("curl/8".to_string()),
            timestamp: Utc::now(),
        };

        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["workspaceId"], "ws-1");
        assert_eq!(v["actorType"], "USER");
        assert_eq!(v["details"]["statusCode"], 200);
        assert_eq!(v["details"]["durationMs"], 12);
        assert!(v["details"].get("errorMessage").is_none());
        assert_eq!(v["details"]["requestBody"]["name"], "Alice");
    }
}

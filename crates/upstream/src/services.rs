use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use chatgate_core::{UpstreamCallError, UpstreamErrorKind};

use crate::{
    ApiEnvelope, PagedResponse, ServiceUrls, UpstreamClient,
    dto::{
        AuditLogResponse, AuditRecord, FeatureCheckRequest, FeatureCheckResponse,
        PermissionCheckRequest, PermissionCheckResponse, ServicesHealth, SystemHealthResponse,
        UserPermissionsResponse, UserResponse,
    },
};

/// Remote permission decision point consumed by the guard.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn check_permission(
        &self,
        request: &PermissionCheckRequest,
        bearer: Option<&str>,
    ) -> Result<PermissionCheckResponse, UpstreamCallError>;
}

/// Destination for audit records.
#[async_trait]
pub trait AuditLogSink: Send + Sync {
    async fn create_audit_log(
        &self,
        record: &AuditRecord,
        bearer: Option<&str>,
    ) -> Result<(), UpstreamCallError>;
}

/// Typed operations against the user, permission, audit and admin services.
#[derive(Clone)]
pub struct BackendServices {
    client: UpstreamClient,
    urls: ServiceUrls,
}

impl BackendServices {
    pub fn new(client: UpstreamClient, urls: ServiceUrls) -> Self {
        Self { client, urls }
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    pub fn urls(&self) -> &ServiceUrls {
        &self.urls
    }

    // user service

    pub async fn get_user(
        &self,
        user_id: &str,
        bearer: Option<&str>,
    ) -> Result<UserResponse, UpstreamCallError> {
        let path = format!("/api/users/{}", segment(user_id, &self.urls.user)?);
        self.client
            .call::<Value, _>(&self.urls.user, Method::GET, &path, None, bearer)
            .await
    }

    pub async fn get_user_by_external_id(
        &self,
        external_id: &str,
        bearer: Option<&str>,
    ) -> Result<UserResponse, UpstreamCallError> {
        let path = format!(
            "/api/users/external/{}",
            segment(external_id, &self.urls.user)?
        );
        self.client
            .call::<Value, _>(&self.urls.user, Method::GET, &path, None, bearer)
            .await
    }

    // permission service

    pub async fn get_user_permissions(
        &self,
        user_id: &str,
        workspace_id: &str,
        bearer: Option<&str>,
    ) -> Result<UserPermissionsResponse, UpstreamCallError> {
        let path = format!(
            "/api/user-roles/user/{}/workspace/{}",
            segment(user_id, &self.urls.permission)?,
            segment(workspace_id, &self.urls.permission)?
        );
        self.client
            .call::<Value, _>(&self.urls.permission, Method::GET, &path, None, bearer)
            .await
    }

    // audit service

    pub async fn get_audit_logs(
        &self,
        workspace_id: &str,
        page: u32,
        size: u32,
        bearer: Option<&str>,
    ) -> Result<PagedResponse<AuditLogResponse>, UpstreamCallError> {
        let path = format!(
            "/api/audit/logs/workspace/{}?page={page}&size={size}",
            segment(workspace_id, &self.urls.audit)?
        );
        self.client
            .call::<Value, _>(&self.urls.audit, Method::GET, &path, None, bearer)
            .await
    }

    // admin service

    pub async fn get_system_health(
        &self,
        bearer: Option<&str>,
    ) -> Result<SystemHealthResponse, UpstreamCallError> {
        self.client
            .call::<Value, _>(
                &self.urls.admin,
                Method::GET,
                "/api/admin/health/services",
                None,
                bearer,
            )
            .await
    }

    pub async fn check_feature(
        &self,
        feature_key: &str,
        user_id: Option<&str>,
        workspace_id: Option<&str>,
        bearer: Option<&str>,
    ) -> Result<bool, UpstreamCallError> {
        let body = FeatureCheckRequest {
            feature_key,
            user_id,
            workspace_id,
        };
        let response: FeatureCheckResponse = self
            .client
            .call(
                &self.urls.admin,
                Method::POST,
                "/api/admin/features/check",
                Some(&body),
                bearer,
            )
            .await?;
        Ok(response.enabled)
    }

    // liveness

    pub async fn check_user_service_health(&self) -> bool {
        self.client.check_health(&self.urls.user).await
    }

    pub async fn check_permission_service_health(&self) -> bool {
        self.client.check_health(&self.urls.permission).await
    }

    pub async fn check_audit_service_health(&self) -> bool {
        self.client.check_health(&self.urls.audit).await
    }

    pub async fn check_admin_service_health(&self) -> bool {
        self.client.check_health(&self.urls.admin).await
    }

    /// Probe all four services concurrently.
    pub async fn services_health(&self) -> ServicesHealth {
        let (user, permission, audit, admin) = tokio::join!(
            self.check_user_service_health(),
            self.check_permission_service_health(),
            self.check_audit_service_health(),
            self.check_admin_service_health(),
        );
        ServicesHealth {
            user,
            permission,
            audit,
            admin,
        }
    }
}

#[async_trait]
impl PermissionChecker for BackendServices {
    async fn check_permission(
        &self,
        request: &PermissionCheckRequest,
        bearer: Option<&str>,
    ) -> Result<PermissionCheckResponse, UpstreamCallError> {
        self.client
            .call(
                &self.urls.permission,
                Method::POST,
                "/api/permissions/check",
                Some(request),
                bearer,
            )
            .await
    }
}

#[async_trait]
impl AuditLogSink for BackendServices {
    async fn create_audit_log(
        &self,
        record: &AuditRecord,
        bearer: Option<&str>,
    ) -> Result<(), UpstreamCallError> {
        let body = serde_json::to_value(record).map_err(|e| {
            UpstreamCallError::new(
                UpstreamErrorKind::BadRequest,
                format!("unserializable audit record: {e}"),
                &self.urls.audit,
            )
        })?;
        let response = self
            .client
            .invoke(
                &self.urls.audit,
                Method::POST,
                "/api/audit/logs",
                Some(&body),
                bearer,
            )
            .await?;

        // Body content is irrelevant for a write; only its envelope shape is checked.
        if !response.payload.is_null() {
            serde_json::from_value::<ApiEnvelope<Option<Value>>>(response.payload).map_err(
                |e| {
                    UpstreamCallError::new(
                        UpstreamErrorKind::Unknown,
                        format!("unexpected response shape: {e}"),
                        &self.urls.audit,
                    )
                },
            )?;
        }
        Ok(())
    }
}

/// Path segments are restricted to unreserved URL characters.
fn segment<'a>(value: &'a str, base_url: &str) -> Result<&'a str, UpstreamCallError> {
    let valid = !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'~' | b'-'));
    if valid {
        Ok(value)
    } else {
        Err(UpstreamCallError::new(
            UpstreamErrorKind::BadRequest,
            format!("invalid path segment: {value:?}"),
            base_url,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_reject_reserved_characters() {
        assert_eq!(segment("ws-1.a_b~c", "http://x").unwrap(), "ws-1.a_b~c");
        for bad in ["", "a/b", "a?b=c", "../x", "a b", "a%2F"] {
            let err = segment(bad, "http://x").unwrap_err();
            assert_eq!(err.kind, UpstreamErrorKind::BadRequest, "{bad:?}");
        }
    }
}

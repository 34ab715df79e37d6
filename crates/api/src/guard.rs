//! Permission guard: remote decision first, local fallback when the remote is unreachable.

use std::sync::Arc;

use tracing::{error, warn};

use chatgate_auth::{
    AuthorizationDecision, DecisionSource, PermissionRequirement, Principal, authorize_locally,
};
use chatgate_core::{GatewayError, UpstreamErrorKind};
use chatgate_upstream::{PermissionCheckRequest, PermissionChecker};

use crate::context::RequestContext;

#[derive(Clone)]
pub struct PermissionGuard {
    checker: Arc<dyn PermissionChecker>,
}

impl PermissionGuard {
    pub fn new(checker: Arc<dyn PermissionChecker>) -> Self {
        Self { checker }
    }

    /// Decide, raising `Forbidden` on denial.
    pub async fn authorize(
        &self,
        principal: Option<&Principal>,
        requirement: Option<&PermissionRequirement>,
        ctx: &RequestContext,
    ) -> Result<AuthorizationDecision, GatewayError> {
        self.evaluate(principal, requirement, ctx)
            .await?
            .into_result()
    }

    /// Decide without converting a denial into an error.
    ///
    /// Only a missing principal is an error here.
    pub async fn evaluate(
        &self,
        principal: Option<&Principal>,
        requirement: Option<&PermissionRequirement>,
        ctx: &RequestContext,
    ) -> Result<AuthorizationDecision, GatewayError> {
        let Some(requirement) = requirement else {
            return Ok(AuthorizationDecision::no_policy_required());
        };
        let principal =
            principal.ok_or_else(|| GatewayError::unauthenticated("User not authenticated"))?;

        let Some(workspace_id) = ctx.workspace_id() else {
            warn!(
                subject = %principal.subject_id(),
                permission = %requirement,
                "no workspace id on request; using local permission check"
            );
            return Ok(authorize_locally(principal, requirement));
        };

        let request = PermissionCheckRequest {
            user_id: principal.subject_id().to_string(),
            workspace_id: workspace_id.to_string(),
            resource: requirement.resource.to_string(),
            action: requirement.action.to_string(),
        };

        match self.checker.check_permission(&request, ctx.bearer()).await {
            Ok(response) if response.allowed => {
                Ok(AuthorizationDecision::allow(DecisionSource::Remote))
            }
            Ok(response) => {
                warn!(
                    subject = %principal.subject_id(),
                    workspace_id = %workspace_id,
                    permission = %requirement,
                    reason = response.reason.as_deref().unwrap_or_default(),
                    "permission denied by policy service"
                );
                Ok(AuthorizationDecision::deny(response.reason, DecisionSource::Remote))
            }
            Err(e) if e.kind == UpstreamErrorKind::Forbidden => {
                warn!(
                    subject = %principal.subject_id(),
                    workspace_id = %workspace_id,
                    permission = %requirement,
                    reason = %e.message,
                    "permission service refused the check"
                );
                Ok(AuthorizationDecision::deny(Some(e.message), DecisionSource::Remote))
            }
            Err(e) => {
                error!(
                    subject = %principal.subject_id(),
                    permission = %requirement,
                    kind = %e.kind,
                    error = %e.message,
                    "permission check failed; falling back to local rules"
                );
                Ok(authorize_locally(principal, requirement))
            }
        }
    }
}

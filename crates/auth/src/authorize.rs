use serde::Serialize;

use chatgate_core::GatewayError;

use crate::{PermissionRequirement, Principal};

/// Message used when a denial carries no more specific reason.
pub const DEFAULT_DENIAL: &str = "Permission denied";

/// Where an authorization decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionSource {
    /// The remote permission service answered.
    Remote,
    /// Local role/permission snapshot, used when the remote answer is unavailable.
    LocalFallback,
    /// The route declares no requirement.
    NoPolicyRequired,
}

/// Outcome of one permission evaluation.
///
/// A denial always carries a non-empty reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub source: DecisionSource,
}

impl AuthorizationDecision {
    pub fn allow(source: DecisionSource) -> Self {
        Self {
            allowed: true,
            reason: None,
            source,
        }
    }

    pub fn no_policy_required() -> Self {
        Self::allow(DecisionSource::NoPolicyRequired)
    }

    /// Deny with `reason`, substituting [`DEFAULT_DENIAL`] when it is blank.
    pub fn deny(reason: Option<String>, source: DecisionSource) -> Self {
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DENIAL.to_string());
        Self {
            allowed: false,
            reason: Some(reason),
            source,
        }
    }

    /// Convert a denial into `Forbidden(reason)`; allows pass through.
    pub fn into_result(self) -> Result<Self, GatewayError> {
        if self.allowed {
            Ok(self)
        } else {
            Err(GatewayError::Forbidden(
                self.reason.unwrap_or_else(|| DEFAULT_DENIAL.to_string()),
            ))
        }
    }
}

/// Local fallback rule.
///
/// Allows when the principal's cached permission snapshot contains
/// `resource:action`, or when its role is administrative. Only legacy
/// principals carry either, so claims-only principals are always denied here.
///
/// - No IO
/// - No panics
pub fn authorize_locally(
    principal: &Principal,
    required: &PermissionRequirement,
) -> AuthorizationDecision {
    let wanted = required.permission();

    if principal.permissions().iter().any(|p| *p == wanted) {
        return AuthorizationDecision::allow(DecisionSource::LocalFallback);
    }

    if principal.role().is_some_and(|r| r.is_admin()) {
        return AuthorizationDecision::allow(DecisionSource::LocalFallback);
    }

    AuthorizationDecision::deny(None, DecisionSource::LocalFallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LegacyUserRecord, Permission, Role, TokenClaims, TokenType};

    fn claims() -> TokenClaims {
        TokenClaims {
            sub: "507f1f77bcf86cd799439011".to_string(),
            exp: 0,
            ..Default::default()
        }
    }

    fn legacy(role: &'static str, permissions: &[&'static str]) -> Principal {
        Principal::from_legacy(
            &claims(),
            LegacyUserRecord {
                id: "507f1f77bcf86cd799439011".to_string(),
                email: None,
                role: Some(Role::new(role)),
                permissions: permissions.iter().map(|p| Permission::new(*p)).collect(),
                is_active: true,
                is_banned: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn allows_exact_permission() {
        let p = legacy("member", &["workspaces:read"]);
        let d = authorize_locally(&p, &PermissionRequirement::new("workspaces", "read"));
        assert!(d.allowed);
        assert_eq!(d.source, DecisionSource::LocalFallback);
    }

    #[test]
    fn allows_admin_roles() {
        for role in ["admin", "super_admin"] {
            let p = legacy(role, &[]);
            let d = authorize_locally(&p, &PermissionRequirement::new("workspaces", "delete"));
            assert!(d.allowed, "{role} should be allowed");
        }
    }

    #[test]
    fn denies_without_permission_or_role() {
        let p = legacy("member", &["workspaces:read"]);
        let d = authorize_locally(&p, &PermissionRequirement::new("workspaces", "delete"));
        assert!(!d.allowed);
        assert_eq!(d.reason.as_deref(), Some(DEFAULT_DENIAL));
    }

    #[test]
    fn claims_only_principals_are_denied_locally() {
        let p = Principal::from_claims(&claims(), TokenType::Unresolved).unwrap();
        let d = authorize_locally(&p, &PermissionRequirement::new("messages", "read"));
        assert!(!d.allowed);
    }

    #[test]
    fn blank_denial_reason_is_replaced() {
        let d = AuthorizationDecision::deny(Some("  ".to_string()), DecisionSource::Remote);
        assert_eq!(d.reason.as_deref(), Some(DEFAULT_DENIAL));

        let err = d.into_result().unwrap_err();
        assert_eq!(err, GatewayError::Forbidden(DEFAULT_DENIAL.to_string()));
    }
}

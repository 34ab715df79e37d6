use serde::{Deserialize, Serialize};

use chatgate_core::SubjectId;

use crate::{AuthError, LegacyUserRecord, Permission, Role, TokenClaims};

/// How a principal was resolved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenType {
    /// Subject found in the legacy identity store.
    LegacyUser,
    /// Subject issued by the external identity provider; claims are authoritative.
    ExternalAuthPayload,
    /// Legacy-format subject with no matching store record; claims only.
    Unresolved,
}

/// Attributes known only for principals resolved against the legacy store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyProfile {
    pub role: Option<Role>,
    pub permissions: Vec<Permission>,
    pub is_active: bool,
    pub is_banned: bool,
}

/// Normalized identity of the caller for the lifetime of one request.
///
/// Immutable once built. Exactly one attribute group is populated: the
/// claim-derived one (`external_id`, `session_id`, `claim_type`) or the
/// legacy profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    subject_id: SubjectId,
    email: Option<String>,
    external_id: Option<String>,
    session_id: Option<String>,
    claim_type: Option<String>,
    token_type: TokenType,
    legacy: Option<LegacyProfile>,
}

impl Principal {
    /// Build a principal from verified claims alone.
    pub fn from_claims(claims: &TokenClaims, token_type: TokenType) -> Result<Self, AuthError> {
        let subject_id =
            SubjectId::parse(claims.sub.clone()).map_err(|_| AuthError::MissingSubject)?;
        Ok(Self {
            subject_id,
            email: claims.email.clone(),
            external_id: claims.external_id.clone(),
            session_id: claims.session_id.clone(),
            claim_type: claims.token_type.clone(),
            token_type,
            legacy: None,
        })
    }

    /// Build a principal from a legacy store record; the record wins over claims.
    pub fn from_legacy(claims: &TokenClaims, record: LegacyUserRecord) -> Result<Self, AuthError> {
        let subject_id =
            SubjectId::parse(claims.sub.clone()).map_err(|_| AuthError::MissingSubject)?;
        Ok(Self {
            subject_id,
            email: record.email,
            external_id: None,
            session_id: None,
            claim_type: None,
            token_type: TokenType::LegacyUser,
            legacy: Some(LegacyProfile {
                role: record.role,
                permissions: record.permissions,
                is_active: record.is_active,
                is_banned: record.is_banned,
            }),
        })
    }

    pub fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn claim_type(&self) -> Option<&str> {
        self.claim_type.as_deref()
    }

    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    pub fn legacy(&self) -> Option<&LegacyProfile> {
        self.legacy.as_ref()
    }

    pub fn role(&self) -> Option<&Role> {
        self.legacy.as_ref().and_then(|l| l.role.as_ref())
    }

    /// Locally-known permission snapshot (empty for non-legacy principals).
    pub fn permissions(&self) -> &[Permission] {
        self.legacy
            .as_ref()
            .map(|l| l.permissions.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_active(&self) -> Option<bool> {
        self.legacy.as_ref().map(|l| l.is_active)
    }

    pub fn is_banned(&self) -> Option<bool> {
        self.legacy.as_ref().map(|l| l.is_banned)
    }
}

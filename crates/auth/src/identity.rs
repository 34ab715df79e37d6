//! Identity resolution across the two token issuers.
//!
//! Legacy tokens carry a 24-char hex document id as `sub` and may be backed
//! by a record in the legacy identity store. Tokens from the external
//! identity provider carry an opaque id and are resolved from claims alone,
//! without a store round trip.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{AuthError, Permission, Principal, Role, TokenClaims, TokenType, TokenVerifier};

/// Length of a legacy document identifier in hex characters.
const LEGACY_ID_LEN: usize = 24;

/// Whether `subject` has the canonical legacy document-id shape
/// (24 lowercase hexadecimal characters).
pub fn is_legacy_document_id(subject: &str) -> bool {
    subject.len() == LEGACY_ID_LEN
        && subject
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// User record held by the legacy identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyUserRecord {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_banned: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("legacy identity lookup failed: {0}")]
pub struct LegacyLookupError(pub String);

/// Read access to the legacy identity store, keyed by document id.
#[async_trait]
pub trait LegacyIdentityStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<LegacyUserRecord>, LegacyLookupError>;
}

/// Fixed, in-process legacy store (development and tests).
#[derive(Debug, Clone, Default)]
pub struct InMemoryLegacyStore {
    users: HashMap<String, LegacyUserRecord>,
}

impl InMemoryLegacyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, record: LegacyUserRecord) -> Self {
        self.users.insert(record.id.clone(), record);
        self
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl LegacyIdentityStore for InMemoryLegacyStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<LegacyUserRecord>, LegacyLookupError> {
        Ok(self.users.get(id).cloned())
    }
}

/// Which issuers the resolver reconciles.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum IdentityMode {
    /// Consult the legacy store for legacy-format subjects.
    #[default]
    Reconciling,
    /// Treat every token as issued by the external provider.
    ExternalOnly,
}

/// Turns a bearer credential into a [`Principal`].
#[derive(Clone)]
pub struct IdentityResolver {
    verifier: Arc<dyn TokenVerifier>,
    legacy: Option<Arc<dyn LegacyIdentityStore>>,
    mode: IdentityMode,
}

impl IdentityResolver {
    pub fn new(verifier: Arc<dyn TokenVerifier>, mode: IdentityMode) -> Self {
        Self {
            verifier,
            legacy: None,
            mode,
        }
    }

    pub fn with_legacy_store(mut self, store: Arc<dyn LegacyIdentityStore>) -> Self {
        self.legacy = Some(store);
        self
    }

    pub fn mode(&self) -> IdentityMode {
        self.mode
    }

    /// Verify `raw` and reconcile its claims into a principal.
    pub async fn resolve(&self, raw: &str) -> Result<Principal, AuthError> {
        if raw.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }
        let claims = self.verifier.verify(raw)?;
        self.reconcile(&claims).await
    }

    /// Post-verification reconciliation of claims against the legacy store.
    ///
    /// Store errors are treated as "not found"; they never reach the caller.
    pub async fn reconcile(&self, claims: &TokenClaims) -> Result<Principal, AuthError> {
        if self.mode == IdentityMode::ExternalOnly || !is_legacy_document_id(&claims.sub) {
            debug!(subject = %claims.sub, "resolving external identity from claims");
            return Principal::from_claims(claims, TokenType::ExternalAuthPayload);
        }

        let record = match &self.legacy {
            Some(store) => match store.find_by_id(&claims.sub).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(subject = %claims.sub, error = %e, "legacy lookup failed; using claims");
                    None
                }
            },
            None => None,
        };

        match record {
            Some(record) => {
                debug!(subject = %claims.sub, "resolved legacy identity from store");
                Principal::from_legacy(claims, record)
            }
            None => {
                debug!(subject = %claims.sub, "legacy subject not in store; using claims");
                Principal::from_claims(claims, TokenType::Unresolved)
            }
        }
    }
}

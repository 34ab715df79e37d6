use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::AuthError;

/// Clock skew tolerated on `iat`, in seconds.
const IAT_LEEWAY_SECS: i64 = 60;

/// Bearer token claims, as issued by either identity era.
///
/// Only `sub` and `exp` are required; everything else is optional and copied
/// verbatim into the principal when the token is resolved from claims alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// Subject: a legacy 24-char document id or an external provider id.
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Issuer-specific token kind (e.g. `access`).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    /// Issued-at, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// Verify a raw HS256 token and return its claims.
///
/// Signature and expiry are checked by `jsonwebtoken`; the remaining claim
/// rules are applied by [`validate_claims`].
pub fn verify(raw: &str, secret: &[u8]) -> Result<TokenClaims, AuthError> {
    Hs256Verifier::new(secret).verify(raw)
}

/// Deterministically validate claims that survived signature verification.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), AuthError> {
    if claims.sub.trim().is_empty() {
        return Err(AuthError::MissingSubject);
    }
    if let Some(iat) = claims.iat {
        if claims.exp <= iat {
            return Err(AuthError::InvalidTimeWindow);
        }
        if iat > now.timestamp() + IAT_LEEWAY_SECS {
            return Err(AuthError::NotYetValid);
        }
    }
    Ok(())
}

/// Credential verification seam used by the identity resolver.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, raw: &str) -> Result<TokenClaims, AuthError>;
}

/// Shared-secret (HS256) verifier.
#[derive(Clone)]
pub struct Hs256Verifier {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256Verifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl TokenVerifier for Hs256Verifier {
    fn verify(&self, raw: &str) -> Result<TokenClaims, AuthError> {
        let data = jsonwebtoken::decode::<TokenClaims>(raw, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::ImmatureSignature => AuthError::NotYetValid,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        validate_claims(&data.claims, Utc::now())?;
        Ok(data.claims)
    }
}

//! `chatgate-auth`: identity resolution and authorization primitives.
//!
//! This crate is decoupled from HTTP: it turns verified credentials into a
//! [`Principal`] and evaluates the local permission rule. Remote policy
//! evaluation lives with the upstream clients.

pub mod authorize;
pub mod claims;
pub mod error;
pub mod identity;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthorizationDecision, DecisionSource, authorize_locally};
pub use claims::{Hs256Verifier, TokenClaims, TokenVerifier, validate_claims, verify};
pub use error::AuthError;
pub use identity::{
    IdentityMode, IdentityResolver, InMemoryLegacyStore, LegacyIdentityStore, LegacyLookupError,
    LegacyUserRecord, is_legacy_document_id,
};
pub use permissions::{Permission, PermissionRequirement};
pub use principal::{LegacyProfile, Principal, TokenType};
pub use roles::Role;

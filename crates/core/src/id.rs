//! Strongly-typed identifiers used across the pipeline.
//!
//! Identifiers issued by the two identity eras have different shapes (24-char
//! hex document ids and opaque/UUID strings), so they are kept as opaque
//! non-empty strings here.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Identifier of an authenticated caller (legacy document id or external id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

/// Identifier of a workspace (tenant boundary for permissions and audit).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkspaceId(String);

macro_rules! impl_string_id {
    ($t:ident, $name:literal) => {
        impl $t {
            /// Parse an identifier, rejecting empty or all-whitespace input.
            pub fn parse(value: impl Into<String>) -> Result<Self, GatewayError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(GatewayError::validation(concat!($name, " must not be empty")));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = GatewayError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $t {
            type Error = GatewayError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_id!(SubjectId, "SubjectId");
impl_string_id!(WorkspaceId, "WorkspaceId");

impl WorkspaceId {
    /// Scope recorded for audit entries that carry no workspace.
    pub fn system() -> Self {
        Self("system".to_string())
    }
}

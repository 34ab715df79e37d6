use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role held by a legacy principal.
///
/// Roles are opaque strings; only the administrative ones carry meaning at
/// this layer (they satisfy any requirement under local fallback).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const SUPER_ADMIN: Role = Role(Cow::Borrowed("super_admin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.as_str(), "admin" | "super_admin")
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

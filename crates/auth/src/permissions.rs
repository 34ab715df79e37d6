use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier in `resource:action` form (e.g. `workspaces:delete`).
///
/// Legacy principals carry a snapshot of these; the local fallback rule
/// matches them by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Build `resource:action`.
    pub fn of(resource: &str, action: &str) -> Self {
        Self(Cow::Owned(format!("{resource}:{action}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn resource(&self) -> Option<&str> {
        self.0.split_once(':').map(|(r, _)| r)
    }

    pub fn action(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, a)| a)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A route's declared (resource, action) requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionRequirement {
    pub resource: Cow<'static, str>,
    pub action: Cow<'static, str>,
}

impl PermissionRequirement {
    pub fn new(
        resource: impl Into<Cow<'static, str>>,
        action: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    pub fn permission(&self) -> Permission {
        Permission::of(&self.resource, &self.action)
    }
}

impl core::fmt::Display for PermissionRequirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

//! Role checks against a resolved identity.
//! Absent identity is always a denial; no role implies another.

use super::principal::Identity;

/// How a list of required roles is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// At least one required role is held.
    #[default]
    AnyOf,
    /// Every required role is held.
    AllOf,
}

impl Policy {
    pub fn from_require_all(require_all: bool) -> Self {
        if require_all { Policy::AllOf } else { Policy::AnyOf }
    }
}

/// Required roles, coerced to a list whether given as one string or many.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredRoles(Vec<String>);

impl RequiredRoles {
    pub fn as_slice(&self) -> &[String] { &self.0 }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<&str> for RequiredRoles {
    fn from(s: &str) -> Self { RequiredRoles(vec![s.to_string()]) }
}

impl From<String> for RequiredRoles {
    fn from(s: String) -> Self { RequiredRoles(vec![s]) }
}

impl From<Vec<String>> for RequiredRoles {
    fn from(v: Vec<String>) -> Self { RequiredRoles(v) }
}

impl From<&[&str]> for RequiredRoles {
    fn from(v: &[&str]) -> Self { RequiredRoles(v.iter().map(|s| s.to_string()).collect()) }
}

impl<const N: usize> From<[&str; N]> for RequiredRoles {
    fn from(v: [&str; N]) -> Self { RequiredRoles(v.iter().map(|s| s.to_string()).collect()) }
}

impl From<super::roles::Role> for RequiredRoles {
    fn from(r: super::roles::Role) -> Self { RequiredRoles(vec![r.as_str().to_string()]) }
}

/// "Any of" check. See [`has_permission_with`].
pub fn has_permission(identity: Option<&Identity>, required: impl Into<RequiredRoles>) -> bool {
    has_permission_with(identity, required, Policy::AnyOf)
}

/// True when `identity` satisfies `required` under `policy`.
///
/// An empty requirement never matches under `AnyOf` and always matches under `AllOf`.
pub fn has_permission_with(
    identity: Option<&Identity>,
    required: impl Into<RequiredRoles>,
    policy: Policy,
) -> bool {
    let Some(identity) = identity else { return false; };
    let required = required.into();
    match policy {
        Policy::AnyOf => required.as_slice().iter().any(|r| identity.has_role(r)),
        Policy::AllOf => required.as_slice().iter().all(|r| identity.has_role(r)),
    }
}

//! Role vocabulary and the single place where upstream role data is normalized.
//!
//! The identity endpoint is inconsistent about how it ships roles: some payloads carry a
//! `roles` array, others a `role` that is either an array or a bare string. Every reader
//! of role data goes through [`normalize_roles`]; nothing downstream looks at `role`.

use serde_json::Value;

/// Roles that own a dedicated landing route, listed in routing priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    GeneralCoordinator,
    ComponentCoordinator,
    RegionalCoordinator,
    Mentor,
}

impl Role {
    /// Total order used when one identity holds several routed roles. Administrative roles first.
    pub const PRIORITY: [Role; 5] = [
        Role::Admin,
        Role::GeneralCoordinator,
        Role::ComponentCoordinator,
        Role::RegionalCoordinator,
        Role::Mentor,
    ];

    /// Wire spelling, as the identity endpoint sends it.
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::GeneralCoordinator => "GeneralCoordinator",
            Role::ComponentCoordinator => "ComponentCoordinator",
            Role::RegionalCoordinator => "RegionalCoordinator",
            Role::Mentor => "mentor",
        }
    }

    /// Exact-match parse of the wire spelling. Unknown roles belong to the generic long tail.
    pub fn parse(s: &str) -> Option<Role> {
        Role::PRIORITY.into_iter().find(|r| r.as_str() == s)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn string_items(arr: &[Value]) -> Vec<String> {
    arr.iter().filter_map(|v| v.as_str()).map(str::to_string).collect()
}

/// Reduce a raw user-shaped object to a role list.
///
/// Precedence: a `roles` array is taken verbatim; otherwise a `role` array; otherwise a
/// non-empty `role` string becomes a one-element list; anything else yields an empty list.
/// Non-string array entries are dropped.
pub fn normalize_roles(raw: &Value) -> Vec<String> {
    if let Some(arr) = raw.get("roles").and_then(Value::as_array) {
        return string_items(arr);
    }
    match raw.get("role") {
        Some(Value::Array(arr)) => string_items(arr),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_role_is_wrapped() {
        assert_eq!(normalize_roles(&json!({"role": "mentor"})), vec!["mentor"]);
    }

    #[test]
    fn role_array_is_verbatim() {
        let raw = json!({"role": ["RegionalCoordinator", "mentor"]});
        assert_eq!(normalize_roles(&raw), vec!["RegionalCoordinator", "mentor"]);
    }

    #[test]
    fn roles_array_wins_over_role() {
        let raw = json!({"roles": ["admin"], "role": "mentor"});
        assert_eq!(normalize_roles(&raw), vec!["admin"]);
    }

    #[test]
    fn absent_empty_or_odd_role_is_empty() {
        assert!(normalize_roles(&json!({"id": "u1"})).is_empty());
        assert!(normalize_roles(&json!({"role": ""})).is_empty());
        assert!(normalize_roles(&json!({"role": null})).is_empty());
        assert!(normalize_roles(&json!({"role": 7})).is_empty());
        assert!(normalize_roles(&json!({"roles": "admin"})).is_empty());
    }

    #[test]
    fn non_string_entries_are_dropped() {
        let raw = json!({"roles": ["admin", 3, null, "mentor"]});
        assert_eq!(normalize_roles(&raw), vec!["admin", "mentor"]);
    }

    #[test]
    fn role_parse_is_exact() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("RegionalCoordinator"), Some(Role::RegionalCoordinator));
        assert_eq!(Role::parse("Admin"), None);
        assert_eq!(Role::parse("Jury Member"), None);
    }
}

//! Landing route selection. Post-login navigation and the edge gate both read from
//! [`LandingPaths`], so the priority table lives here and nowhere else.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::principal::Identity;
use super::roles::Role;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static pattern"));

/// Canonical page roots for each routed role plus the anonymous and default targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LandingPaths {
    pub login: String,
    pub admin: String,
    pub general_coordinator: String,
    pub component_coordinator: String,
    pub regional_coordinator: String,
    pub mentor: String,
    /// Target for an authenticated identity with no roles at all.
    pub default_dashboard: String,
}

impl Default for LandingPaths {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            admin: "/admin".to_string(),
            general_coordinator: "/general-coordinator".to_string(),
            component_coordinator: "/component-coordinator".to_string(),
            regional_coordinator: "/regional-coordinator".to_string(),
            mentor: "/mentor".to_string(),
            default_dashboard: "/dashboard".to_string(),
        }
    }
}

impl LandingPaths {
    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::Admin => &self.admin,
            Role::GeneralCoordinator => &self.general_coordinator,
            Role::ComponentCoordinator => &self.component_coordinator,
            Role::RegionalCoordinator => &self.regional_coordinator,
            Role::Mentor => &self.mentor,
        }
    }

    /// The routed role whose root is `path` or an ancestor of it.
    pub fn role_for_path(&self, path: &str) -> Option<Role> {
        Role::PRIORITY.into_iter().find(|r| {
            let root = self.for_role(*r);
            path == root || path.strip_prefix(root).is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// `/<slug>` for a role outside the routed set: lower-cased, trimmed, whitespace runs
/// collapsed to single hyphens. `"Jury Member"` becomes `/jury-member`.
pub fn generic_role_path(role: &str) -> String {
    let lowered = role.trim().to_lowercase();
    format!("/{}", WHITESPACE_RUN.replace_all(&lowered, "-"))
}

/// Pick the single landing path for `identity`.
///
/// Anonymous goes to login. Otherwise the first routed role in [`Role::PRIORITY`] held by
/// the identity wins; failing that the first role maps to its generic path; an empty (or
/// blank-first-role) identity gets the default dashboard.
pub fn resolve_landing_path(identity: Option<&Identity>, paths: &LandingPaths) -> String {
    let Some(identity) = identity else { return paths.login.clone(); };
    if let Some(role) = Role::PRIORITY.into_iter().find(|r| identity.has_role(r.as_str())) {
        return paths.for_role(role).to_string();
    }
    match identity.roles.first() {
        Some(first) if !first.trim().is_empty() => generic_role_path(first),
        _ => paths.default_dashboard.clone(),
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::roles::normalize_roles;

/// Fields lifted out of the raw payload into typed members; everything else lands in `extra`.
const TYPED_FIELDS: [&str; 6] = ["id", "_id", "role", "roles", "region", "component"];

/// Display name of a region: either a locale map (`{"fr": "Sud"}`) or a bare string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RegionName {
    Localized(BTreeMap<String, String>),
    Plain(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<RegionName>,
}

impl Region {
    fn from_value(v: &Value) -> Option<Region> {
        let id = v.get("id").and_then(id_string)?;
        let name = v
            .get("name")
            .and_then(|n| serde_json::from_value::<RegionName>(n.clone()).ok());
        Some(Region { id, name })
    }

    /// French label first, then a plain name, then whichever locale sorts first.
    pub fn display_name(&self) -> Option<&str> {
        match self.name.as_ref()? {
            RegionName::Plain(s) => Some(s.as_str()),
            RegionName::Localized(m) => m
                .get("fr")
                .or_else(|| m.values().next())
                .map(String::as_str),
        }
    }
}

/// Program tracks a component coordinator can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Crea,
    Inov,
}

impl Track {
    pub const fn as_str(self) -> &'static str {
        match self {
            Track::Crea => "crea",
            Track::Inov => "inov",
        }
    }

    pub fn parse(s: &str) -> Option<Track> {
        match s {
            "crea" => Some(Track::Crea),
            "inov" => Some(Track::Inov),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentRef {
    pub composant: String,
}

impl ComponentRef {
    fn from_value(v: &Value) -> Option<ComponentRef> {
        let composant = v.get("composant")?.as_str()?.to_string();
        Some(ComponentRef { composant })
    }

    /// Known track, if the upstream value is one of them.
    pub fn track(&self) -> Option<Track> {
        Track::parse(&self.composant)
    }
}

/// The resolved, normalized current user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentRef>,
    /// Untyped profile fields passed through from the endpoint (email, names, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Identity {
    /// Build an identity from an identity-endpoint body.
    ///
    /// Accepts `{ "user": {...} }` or the user fields at the top level. Returns `None`
    /// when there is no object carrying an `id` (or `_id`); such payloads count as
    /// "not authenticated". Roles always pass through [`normalize_roles`].
    pub fn from_payload(payload: &Value) -> Option<Identity> {
        let raw = match payload.get("user") {
            Some(u) if u.is_object() => u,
            _ => payload,
        };
        let obj = raw.as_object()?;
        let id = obj.get("id").or_else(|| obj.get("_id")).and_then(id_string)?;
        let extra = obj
            .iter()
            .filter(|(k, _)| !TYPED_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Some(Identity {
            id,
            roles: normalize_roles(raw),
            region: obj.get("region").and_then(Region::from_value),
            component: obj.get("component").and_then(ComponentRef::from_value),
            extra,
        })
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Outcome of one session resolution.
///
/// `user` and `is_authenticated` always move together; `error` is only set on a failed
/// fetch and never alongside a user. Build it through the constructors.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    user: Option<Identity>,
    is_authenticated: bool,
    error: Option<String>,
}

impl AuthResult {
    pub fn authenticated(user: Identity) -> Self {
        Self { user: Some(user), is_authenticated: true, error: None }
    }

    /// No usable identity and nothing went wrong.
    pub fn anonymous() -> Self {
        Self { user: None, is_authenticated: false, error: None }
    }

    pub fn failed<S: Into<String>>(error: S) -> Self {
        Self { user: None, is_authenticated: false, error: Some(error.into()) }
    }

    pub fn user(&self) -> Option<&Identity> { self.user.as_ref() }
    pub fn is_authenticated(&self) -> bool { self.is_authenticated }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
}

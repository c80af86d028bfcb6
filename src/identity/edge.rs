//! Identity lookup for the edge, before a page is served.
//!
//! No ambient cookie jar exists here: tokens pulled off the incoming request are attached
//! explicitly. Both are optional so anonymous probes still reach the endpoint. This module
//! never redirects; callers feed [`EdgeOutcome::identity`] into the landing resolver.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

use super::principal::Identity;

pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeFailure {
    pub success: bool,
    pub error: String,
}

/// Either the upstream success body, verbatim, or `{ "success": false, "error": ... }`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum EdgeOutcome {
    Upstream(Value),
    Failed(EdgeFailure),
}

impl EdgeOutcome {
    fn failed<S: Into<String>>(error: S) -> Self {
        EdgeOutcome::Failed(EdgeFailure { success: false, error: error.into() })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EdgeOutcome::Upstream(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            EdgeOutcome::Failed(f) => Some(f.error.as_str()),
            EdgeOutcome::Upstream(_) => None,
        }
    }

    /// Normalized identity carried by a success body, if any.
    pub fn identity(&self) -> Option<Identity> {
        match self {
            EdgeOutcome::Upstream(body) => Identity::from_payload(body),
            EdgeOutcome::Failed(_) => None,
        }
    }
}

/// Pull a human message out of a structured error body: `message` first, then `error`.
fn structured_error(body: &[u8]) -> Option<String> {
    let v: Value = serde_json::from_slice(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|k| v.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Clone)]
pub struct EdgeAuthorizer {
    url: Url,
    client: reqwest::Client,
}

impl EdgeAuthorizer {
    pub fn new(base: &str, user_info_path: &str, timeout: Option<Duration>) -> AppResult<Self> {
        let base_url = Url::parse(base)
            .map_err(|e| AppError::config("invalid_identity_url".to_string(), format!("{}: {}", base, e)))?;
        let url = base_url
            .join(user_info_path)
            .map_err(|e| AppError::config("invalid_user_info_path".to_string(), format!("{}: {}", user_info_path, e)))?;
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self { url, client: builder.build()? })
    }

    pub fn url(&self) -> &Url { &self.url }

    /// Call the identity endpoint with whichever tokens are present.
    pub async fn resolve_session_at_edge(&self, access_token: Option<&str>, refresh_token: Option<&str>) -> EdgeOutcome {
        let mut req = self.client.get(self.url.clone());
        if let Some(tok) = access_token.filter(|t| !t.is_empty()) {
            req = req.header(AUTHORIZATION, format!("Bearer {}", tok));
        }
        if let Some(tok) = refresh_token.filter(|t| !t.is_empty()) {
            req = req.header(REFRESH_TOKEN_HEADER, tok);
        }
        debug!(
            target: "creathon::edge",
            "probing identity endpoint bearer={} refresh={}",
            access_token.is_some_and(|t| !t.is_empty()),
            refresh_token.is_some_and(|t| !t.is_empty())
        );

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "creathon::edge", "identity endpoint unreachable: {}", e);
                return EdgeOutcome::failed(e.to_string());
            }
        };
        let status = resp.status();
        let body = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => return EdgeOutcome::failed(e.to_string()),
        };
        if !status.is_success() {
            let msg = structured_error(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            debug!(target: "creathon::edge", "identity endpoint refused: {}", msg);
            return EdgeOutcome::failed(msg);
        }
        match serde_json::from_slice::<Value>(&body) {
            Ok(v) => EdgeOutcome::Upstream(v),
            Err(e) => EdgeOutcome::failed(AppError::from(e).message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_error_prefers_message() {
        assert_eq!(structured_error(br#"{"message":"expired","error":"x"}"#).as_deref(), Some("expired"));
        assert_eq!(structured_error(br#"{"error":"invalid token"}"#).as_deref(), Some("invalid token"));
        assert_eq!(structured_error(br#"{"message":""}"#), None);
        assert_eq!(structured_error(b"<html>nope</html>"), None);
        assert_eq!(structured_error(b""), None);
    }

    #[test]
    fn failure_serializes_as_success_false() {
        let v = serde_json::to_value(EdgeOutcome::failed("HTTP 401")).unwrap();
        assert_eq!(v, json!({"success": false, "error": "HTTP 401"}));
    }

    #[test]
    fn upstream_is_passed_through_and_yields_identity() {
        let body = json!({"user": {"id": "u7", "roles": ["mentor"]}});
        let out = EdgeOutcome::Upstream(body.clone());
        assert_eq!(serde_json::to_value(&out).unwrap(), body);
        assert_eq!(out.identity().map(|i| i.roles), Some(vec!["mentor".to_string()]));
        assert!(EdgeOutcome::failed("x").identity().is_none());
    }

    #[test]
    fn bad_base_url_is_config_error() {
        let err = EdgeAuthorizer::new("not a url", "/auth/me", None).err().unwrap();
        assert_eq!(err.code_str(), "invalid_identity_url");
    }
}

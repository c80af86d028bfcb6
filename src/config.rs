//! Runtime configuration for the access layer and the edge gate.
//! Defaults, then `CREATHON_*` environment variables; the binary layers CLI flags on top.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppResult;
use crate::identity::{FileHintStore, HintStore, HttpIdentityTransport, LandingPaths, MemoryHintStore, SessionResolver};
use crate::server::{LOGOUT_PATH, WHOAMI_PATH};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a port number, got '{value}'")]
    BadPort { name: String, value: String },
    #[error("{name} must be a number of milliseconds, got '{value}'")]
    BadMillis { name: String, value: String },
    #[error("{name} must be an absolute path starting with '/', got '{value}'")]
    BadPath { name: String, value: String },
    #[error("{name} cannot be '{value}', the gate already serves that path")]
    ReservedPath { name: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccessConfig {
    /// Base URL of the backend serving the identity endpoint.
    pub identity_url: String,
    /// Path of the user-info route, joined onto `identity_url`.
    pub user_info_path: String,
    pub landing: LandingPaths,
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub http_port: u16,
    /// Where persisted hints live; in-memory when unset.
    pub hints_file: Option<PathBuf>,
    /// Upper bound for identity calls. Unset means no client-side timeout.
    pub request_timeout_ms: Option<u64>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            identity_url: "http://127.0.0.1:5000".to_string(),
            user_info_path: "/api/auth/me".to_string(),
            landing: LandingPaths::default(),
            access_cookie: "accessToken".to_string(),
            refresh_cookie: "refreshToken".to_string(),
            http_port: 3000,
            hints_file: None,
            request_timeout_ms: None,
        }
    }
}

fn parse_port(name: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::BadPort { name: name.to_string(), value: value.to_string() })
}

fn parse_millis(name: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::BadMillis { name: name.to_string(), value: value.to_string() })
}

fn check_path(name: &str, value: &str) -> Result<String, ConfigError> {
    if value.starts_with('/') {
        Ok(value.to_string())
    } else {
        Err(ConfigError::BadPath { name: name.to_string(), value: value.to_string() })
    }
}

fn check_login_path(name: &str, value: &str) -> Result<String, ConfigError> {
    let path = check_path(name, value)?;
    if ["/", LOGOUT_PATH, WHOAMI_PATH].contains(&path.as_str()) {
        return Err(ConfigError::ReservedPath { name: name.to_string(), value: path });
    }
    Ok(path)
}

impl AccessConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Defaults overridden by whatever `lookup` returns; lets tests avoid touching the real environment.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let mut cfg = AccessConfig::default();
        if let Some(v) = lookup("CREATHON_IDENTITY_URL") { cfg.identity_url = v; }
        if let Some(v) = lookup("CREATHON_USER_INFO_PATH") { cfg.user_info_path = check_path("CREATHON_USER_INFO_PATH", &v)?; }
        if let Some(v) = lookup("CREATHON_HTTP_PORT") { cfg.http_port = parse_port("CREATHON_HTTP_PORT", &v)?; }
        if let Some(v) = lookup("CREATHON_ACCESS_COOKIE") { cfg.access_cookie = v; }
        if let Some(v) = lookup("CREATHON_REFRESH_COOKIE") { cfg.refresh_cookie = v; }
        if let Some(v) = lookup("CREATHON_HINTS_FILE") { cfg.hints_file = Some(PathBuf::from(v)); }
        if let Some(v) = lookup("CREATHON_REQUEST_TIMEOUT_MS") {
            cfg.request_timeout_ms = Some(parse_millis("CREATHON_REQUEST_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("CREATHON_LOGIN_PATH") { cfg.landing.login = check_login_path("CREATHON_LOGIN_PATH", &v)?; }
        if let Some(v) = lookup("CREATHON_DASHBOARD_PATH") {
            cfg.landing.default_dashboard = check_path("CREATHON_DASHBOARD_PATH", &v)?;
        }
        Ok(cfg)
    }

    /// The login page is routed next to the gate's own endpoints and must not collide with them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_login_path("landing.login", &self.landing.login).map(|_| ())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    /// File-backed when `hints_file` is set, otherwise a fresh in-memory store.
    pub fn hint_store(&self) -> Arc<dyn HintStore> {
        match &self.hints_file {
            Some(path) => Arc::new(FileHintStore::new(path)),
            None => Arc::new(MemoryHintStore::new()),
        }
    }

    /// Session resolver for a client whose credentials live in `jar`.
    pub fn session_resolver(&self, jar: Arc<Jar>) -> AppResult<SessionResolver<HttpIdentityTransport>> {
        let transport = HttpIdentityTransport::with_jar(&self.identity_url, &self.user_info_path, jar, self.request_timeout())?;
        Ok(SessionResolver::new(transport, self.hint_store()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| m.get(k).cloned()
    }

    #[test]
    fn defaults_when_env_is_empty() {
        let cfg = AccessConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, AccessConfig::default());
        assert_eq!(cfg.landing.login, "/login");
        assert_eq!(cfg.request_timeout(), None);
    }

    #[test]
    fn env_overrides_apply() {
        let cfg = AccessConfig::from_lookup(lookup(&[
            ("CREATHON_IDENTITY_URL", "https://api.example.org"),
            ("CREATHON_HTTP_PORT", "8088"),
            ("CREATHON_REQUEST_TIMEOUT_MS", "2500"),
            ("CREATHON_LOGIN_PATH", "/auth/login"),
            ("CREATHON_HINTS_FILE", "/var/lib/creathon/hints.json"),
        ]))
        .unwrap();
        assert_eq!(cfg.identity_url, "https://api.example.org");
        assert_eq!(cfg.http_port, 8088);
        assert_eq!(cfg.request_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(cfg.landing.login, "/auth/login");
        assert_eq!(cfg.hints_file, Some(PathBuf::from("/var/lib/creathon/hints.json")));
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = AccessConfig::from_lookup(lookup(&[("CREATHON_HTTP_PORT", "eighty")])).unwrap_err();
        assert_eq!(err, ConfigError::BadPort { name: "CREATHON_HTTP_PORT".into(), value: "eighty".into() });
        assert!(AccessConfig::from_lookup(lookup(&[("CREATHON_LOGIN_PATH", "login")])).is_err());
        assert!(AccessConfig::from_lookup(lookup(&[("CREATHON_REQUEST_TIMEOUT_MS", "-1")])).is_err());
    }

    #[test]
    fn login_path_cannot_shadow_gate_routes() {
        for reserved in ["/", "/logout", "/whoami"] {
            let err = AccessConfig::from_lookup(lookup(&[("CREATHON_LOGIN_PATH", reserved)])).unwrap_err();
            assert_eq!(err, ConfigError::ReservedPath { name: "CREATHON_LOGIN_PATH".into(), value: reserved.into() });
        }
        assert!(AccessConfig::from_lookup(lookup(&[("CREATHON_LOGIN_PATH", "/signin")])).is_ok());

        let mut cfg = AccessConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.landing.login = "/whoami".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_timeout_means_none() {
        let cfg = AccessConfig { request_timeout_ms: Some(0), ..Default::default() };
        assert_eq!(cfg.request_timeout(), None);
    }
}

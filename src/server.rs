//!
//! creathon edge gate
//! ------------------
//! Axum front that authorizes every page request before it is served.
//!
//! Responsibilities:
//! - Read access/refresh tokens off the request (cookies, or `Authorization` / `x-refresh-token`).
//! - Ask the identity endpoint who the caller is through the edge authorizer.
//! - Redirect `/` and the login page to the caller's landing path.
//! - Keep callers out of role roots they do not hold, sending them to their own landing path.
//! - Expire token cookies on logout and send the browser back to the login page.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use tracing::{debug, info, warn};

use crate::config::AccessConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{
    has_permission, resolve_landing_path, AuthResult, EdgeAuthorizer, Identity, LandingPaths, REFRESH_TOKEN_HEADER,
};

pub const WHOAMI_PATH: &str = "/whoami";
pub const LOGOUT_PATH: &str = "/logout";

/// Shared state injected into the gate and handlers.
#[derive(Clone)]
pub struct AppState {
    pub edge: EdgeAuthorizer,
    pub config: Arc<AccessConfig>,
}

impl AppState {
    pub fn from_config(config: AccessConfig) -> AppResult<Self> {
        config
            .validate()
            .map_err(|e| AppError::config("invalid_login_path".to_string(), e.to_string()))?;
        let edge = EdgeAuthorizer::new(&config.identity_url, &config.user_info_path, config.request_timeout())?;
        Ok(Self { edge, config: Arc::new(config) })
    }
}

/// What the gate learned about the caller; inserted into request extensions for handlers.
#[derive(Debug, Clone, Default)]
pub struct EdgeSession {
    pub identity: Option<Identity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Redirect(String),
}

fn within(path: &str, root: &str) -> bool {
    path == root || path.strip_prefix(root).is_some_and(|rest| rest.starts_with('/'))
}

/// Routing decision for `path` given the caller's identity. Every redirect target comes
/// from [`resolve_landing_path`] or the configured login/dashboard paths, and never
/// points back at `path` itself.
pub fn decide_route(path: &str, identity: Option<&Identity>, paths: &LandingPaths) -> GateDecision {
    if path == "/" {
        return GateDecision::Redirect(resolve_landing_path(identity, paths));
    }
    if path == WHOAMI_PATH || path == LOGOUT_PATH {
        return GateDecision::Pass;
    }
    let Some(user) = identity else {
        return if path == paths.login { GateDecision::Pass } else { GateDecision::Redirect(paths.login.clone()) };
    };
    let landing = resolve_landing_path(Some(user), paths);
    if path == paths.login {
        // a long-tail role can slug to the login path itself
        let target = if landing == paths.login { paths.default_dashboard.clone() } else { landing };
        return if target == path { GateDecision::Pass } else { GateDecision::Redirect(target) };
    }
    if let Some(role) = paths.role_for_path(path) {
        // "Mentor" slugs to the mentor root without holding `mentor`; its own landing stays reachable
        if !has_permission(Some(user), role) && !within(path, &landing) {
            return GateDecision::Redirect(landing);
        }
    }
    GateDecision::Pass
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all("cookie").iter() {
        let Ok(s) = cookie.to_str() else { continue; };
        for part in s.split(';') {
            let p = part.trim();
            if let Some((k, v)) = p.split_once('=') {
                if k == name && !v.is_empty() { return Some(v.to_string()); }
            }
        }
    }
    None
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let v = headers.get(AUTHORIZATION)?.to_str().ok()?;
    v.strip_prefix("Bearer ").map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn header_token(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name)?.to_str().ok().map(str::to_string).filter(|t| !t.is_empty())
}

async fn edge_gate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if path == LOGOUT_PATH {
        return next.run(req).await;
    }
    let headers = req.headers();
    let access = parse_cookie(headers, &state.config.access_cookie).or_else(|| bearer_token(headers));
    let refresh = parse_cookie(headers, &state.config.refresh_cookie).or_else(|| header_token(headers, REFRESH_TOKEN_HEADER));

    let outcome = state.edge.resolve_session_at_edge(access.as_deref(), refresh.as_deref()).await;
    if let Some(err) = outcome.error() {
        debug!(target: "creathon::server", "edge lookup for {} treated as anonymous: {}", path, err);
    }
    let identity = outcome.identity();

    match decide_route(&path, identity.as_ref(), &state.config.landing) {
        GateDecision::Redirect(to) => {
            debug!(target: "creathon::server", "{} -> {}", path, to);
            Redirect::temporary(&to).into_response()
        }
        GateDecision::Pass => {
            req.extensions_mut().insert(EdgeSession { identity });
            next.run(req).await
        }
    }
}

fn expired_cookie(name: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; HttpOnly; Secure; SameSite=Strict; Path=/",
        name
    ))
    .ok()
}

async fn logout(State(state): State<AppState>) -> Response {
    let mut resp = Redirect::to(&state.config.landing.login).into_response();
    for name in [&state.config.access_cookie, &state.config.refresh_cookie] {
        match expired_cookie(name) {
            Some(v) => { resp.headers_mut().append(SET_COOKIE, v); }
            None => warn!(target: "creathon::server", "cookie name '{}' is not a valid header value", name),
        }
    }
    resp
}

async fn whoami(Extension(session): Extension<EdgeSession>) -> Json<AuthResult> {
    match session.identity {
        Some(identity) => Json(AuthResult::authenticated(identity)),
        None => Json(AuthResult::anonymous()),
    }
}

async fn login_page() -> impl IntoResponse {
    (StatusCode::OK, "Sign in to continue")
}

async fn page(uri: Uri, Extension(session): Extension<EdgeSession>) -> impl IntoResponse {
    let user = session.identity.map(|i| i.id).unwrap_or_default();
    (StatusCode::OK, Json(serde_json::json!({"page": uri.path(), "user": user})))
}

/// Build the gated router. Pages not matched explicitly fall through to a placeholder
/// handler; the gate runs in front of all of them.
pub fn router(state: AppState) -> Router {
    let login = state.config.landing.login.clone();
    Router::new()
        .route(&login, get(login_page))
        .route(LOGOUT_PATH, get(logout).post(logout))
        .route(WHOAMI_PATH, get(whoami))
        .fallback(page)
        .layer(middleware::from_fn_with_state(state.clone(), edge_gate))
        .with_state(state)
}

/// Bind on all interfaces at `config.http_port` and serve until the process stops.
pub async fn run(config: AccessConfig) -> anyhow::Result<()> {
    let port = config.http_port;
    info!(
        target: "creathon::server",
        "edge gate starting: identity={}{} login={}",
        config.identity_url, config.user_info_path, config.landing.login
    );
    let state = AppState::from_config(config)?;
    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    info!(target: "creathon::server", "listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(roles: &[&str]) -> Identity {
        Identity { id: "u".into(), roles: roles.iter().map(|s| s.to_string()).collect(), ..Default::default() }
    }

    #[test]
    fn root_redirects_by_priority() {
        let p = LandingPaths::default();
        assert_eq!(decide_route("/", None, &p), GateDecision::Redirect("/login".into()));
        assert_eq!(decide_route("/", Some(&ident(&["mentor", "admin"])), &p), GateDecision::Redirect("/admin".into()));
    }

    #[test]
    fn login_page_only_for_anonymous() {
        let p = LandingPaths::default();
        assert_eq!(decide_route("/login", None, &p), GateDecision::Pass);
        assert_eq!(
            decide_route("/login", Some(&ident(&["Jury Member"])), &p),
            GateDecision::Redirect("/jury-member".into())
        );
    }

    #[test]
    fn role_roots_are_guarded() {
        let p = LandingPaths::default();
        let mentor = ident(&["mentor"]);
        assert_eq!(decide_route("/admin/users", None, &p), GateDecision::Redirect("/login".into()));
        assert_eq!(decide_route("/admin/users", Some(&mentor), &p), GateDecision::Redirect("/mentor".into()));
        assert_eq!(decide_route("/mentor/sessions", Some(&mentor), &p), GateDecision::Pass);
        assert_eq!(decide_route("/jury-member", Some(&mentor), &p), GateDecision::Pass);
    }

    #[test]
    fn long_tail_role_on_a_role_root_is_not_looped() {
        let p = LandingPaths::default();
        for (role, root) in [("Mentor", "/mentor"), ("Admin", "/admin"), ("Regional Coordinator", "/regional-coordinator")] {
            let u = ident(&[role]);
            let landing = resolve_landing_path(Some(&u), &p);
            assert_eq!(landing, root);
            assert_eq!(decide_route(&landing, Some(&u), &p), GateDecision::Pass, "role {}", role);
            assert_eq!(decide_route(&format!("{}/home", root), Some(&u), &p), GateDecision::Pass, "role {}", role);
        }
        let u = ident(&["Mentor"]);
        assert_eq!(decide_route("/admin", Some(&u), &p), GateDecision::Redirect("/mentor".into()));
    }

    #[test]
    fn role_slugging_to_login_goes_to_dashboard() {
        let p = LandingPaths::default();
        let u = ident(&["Login"]);
        assert_eq!(resolve_landing_path(Some(&u), &p), "/login");
        assert_eq!(decide_route("/login", Some(&u), &p), GateDecision::Redirect("/dashboard".into()));
        assert_eq!(decide_route("/dashboard", Some(&u), &p), GateDecision::Pass);

        let same = LandingPaths { default_dashboard: "/login".into(), ..Default::default() };
        assert_eq!(decide_route("/login", Some(&u), &same), GateDecision::Pass);
    }

    #[test]
    fn every_landing_path_is_admitted() {
        let p = LandingPaths::default();
        let cases: [&[&str]; 7] = [&["admin"], &["mentor"], &["Mentor"], &["Jury Member"], &[], &["  "], &["GeneralCoordinator", "mentor"]];
        for roles in cases {
            let u = ident(roles);
            let landing = resolve_landing_path(Some(&u), &p);
            assert_eq!(decide_route(&landing, Some(&u), &p), GateDecision::Pass, "roles {:?}", roles);
        }
    }

    #[test]
    fn whoami_and_logout_always_pass() {
        let p = LandingPaths::default();
        assert_eq!(decide_route("/whoami", None, &p), GateDecision::Pass);
        assert_eq!(decide_route("/logout", None, &p), GateDecision::Pass);
    }

    #[test]
    fn reserved_login_path_is_refused_at_startup() {
        let mut config = AccessConfig::default();
        config.landing.login = LOGOUT_PATH.to_string();
        let err = AppState::from_config(config).err().unwrap();
        assert_eq!(err.code_str(), "invalid_login_path");
    }

    #[test]
    fn token_extraction() {
        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_static("theme=dark; accessToken=abc; refreshToken=def"));
        h.insert(AUTHORIZATION, HeaderValue::from_static("Bearer zzz"));
        assert_eq!(parse_cookie(&h, "accessToken").as_deref(), Some("abc"));
        assert_eq!(parse_cookie(&h, "refreshToken").as_deref(), Some("def"));
        assert_eq!(parse_cookie(&h, "missing"), None);
        assert_eq!(bearer_token(&h).as_deref(), Some("zzz"));
        h.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(bearer_token(&h), None);
    }
}

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::tprintln;

use super::hints::{HintKey, HintStore};
use super::principal::{AuthResult, Identity};
use super::roles::Role;

/// Carries a user-info request with whatever credentials the calling context has.
///
/// `Ok(Some(body))` is a success body, `Ok(None)` means the endpoint answered without an
/// identity (non-success status, empty body), `Err` is a transport or decoding failure.
pub trait IdentityTransport: Send + Sync {
    fn fetch_user_info(&self) -> impl Future<Output = AppResult<Option<Value>>> + Send;
}

/// Cookie-jar backed transport: credentials ride along the way a browser attaches them.
#[derive(Clone)]
pub struct HttpIdentityTransport {
    url: Url,
    client: reqwest::Client,
}

impl HttpIdentityTransport {
    pub fn connect(base: &str, user_info_path: &str) -> AppResult<Self> {
        Self::with_jar(base, user_info_path, Arc::new(Jar::default()), None)
    }

    /// Share `jar` with whatever performed the login so its cookies are attached here.
    pub fn with_jar(base: &str, user_info_path: &str, jar: Arc<Jar>, timeout: Option<Duration>) -> AppResult<Self> {
        let base_url = Url::parse(base)
            .map_err(|e| AppError::config("invalid_identity_url".to_string(), format!("{}: {}", base, e)))?;
        let url = base_url
            .join(user_info_path)
            .map_err(|e| AppError::config("invalid_user_info_path".to_string(), format!("{}: {}", user_info_path, e)))?;
        let mut builder = reqwest::Client::builder().cookie_provider(jar);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build()?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &Url { &self.url }
}

impl IdentityTransport for HttpIdentityTransport {
    async fn fetch_user_info(&self) -> AppResult<Option<Value>> {
        let resp = self.client.get(self.url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            debug!(target: "creathon::session", "user-info answered HTTP {}", status.as_u16());
            return Ok(None);
        }
        let bytes = resp.bytes().await?;
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }
        let body: Value = serde_json::from_slice(&bytes)?;
        Ok(Some(body))
    }
}

/// Resolves the current session and warms the hint store as a side effect.
pub struct SessionResolver<T> {
    transport: T,
    hints: Arc<dyn HintStore>,
}

impl<T: IdentityTransport> SessionResolver<T> {
    pub fn new(transport: T, hints: Arc<dyn HintStore>) -> Self {
        Self { transport, hints }
    }

    pub fn hints(&self) -> &Arc<dyn HintStore> { &self.hints }

    /// Fetch and normalize the current identity. Never fails: transport problems come
    /// back as [`AuthResult::failed`], unusable payloads as [`AuthResult::anonymous`].
    pub async fn resolve_session(&self) -> AuthResult {
        match self.transport.fetch_user_info().await {
            Ok(Some(body)) => match Identity::from_payload(&body) {
                Some(identity) => {
                    self.warm_hints(&identity);
                    info!(target: "creathon::session", "session resolved user={} roles={:?}", identity.id, identity.roles);
                    AuthResult::authenticated(identity)
                }
                None => {
                    debug!(target: "creathon::session", "user-info body has no user shape");
                    AuthResult::anonymous()
                }
            },
            Ok(None) => AuthResult::anonymous(),
            Err(e) => {
                warn!(target: "creathon::session", "session resolution failed: {}", e);
                AuthResult::failed(e.message())
            }
        }
    }

    fn warm_hints(&self, identity: &Identity) {
        if identity.has_role(Role::RegionalCoordinator.as_str()) {
            if let Some(region) = identity.region.as_ref() {
                self.put(HintKey::UserRegionId, &region.id);
                // id and name always describe the same region
                match region.display_name() {
                    Some(name) => self.put(HintKey::RegionName, name),
                    None => self.drop_hint(HintKey::RegionName),
                }
            }
        }
        if identity.has_role(Role::ComponentCoordinator.as_str()) {
            if let Some(track) = identity.component.as_ref().and_then(|c| c.track()) {
                self.put(HintKey::UserComponent, track.as_str());
            }
        }
    }

    fn put(&self, key: HintKey, value: &str) {
        if let Err(e) = self.hints.set(key, value) {
            warn!(target: "creathon::hints", "could not persist {}: {}", key.as_str(), e);
        }
    }

    fn drop_hint(&self, key: HintKey) {
        if let Err(e) = self.hints.clear(key) {
            warn!(target: "creathon::hints", "could not clear {}: {}", key.as_str(), e);
        }
    }
}

/// Performs a full navigation that discards in-memory state, as opposed to an in-app route change.
pub trait Navigator {
    fn hard_navigate(&self, path: &str);
}

/// Drop every hint, then hard-navigate to `login_path`. Safe to call repeatedly.
pub fn logout(hints: &dyn HintStore, navigator: &dyn Navigator, login_path: &str) {
    if let Err(e) = hints.clear_all() {
        warn!(target: "creathon::hints", "clearing hints on logout failed: {}", e);
    }
    tprintln!("session.logout -> {}", login_path);
    navigator.hard_navigate(login_path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{MemoryHintStore, SessionHints, Track};
    use parking_lot::Mutex;
    use serde_json::json;

    enum Canned {
        Body(Value),
        Nothing,
        Fail(&'static str),
    }

    struct CannedTransport(Canned);

    impl IdentityTransport for CannedTransport {
        async fn fetch_user_info(&self) -> AppResult<Option<Value>> {
            match &self.0 {
                Canned::Body(v) => Ok(Some(v.clone())),
                Canned::Nothing => Ok(None),
                Canned::Fail(msg) => Err(AppError::transport("transport_error", *msg)),
            }
        }
    }

    fn resolver(c: Canned) -> (SessionResolver<CannedTransport>, Arc<MemoryHintStore>) {
        let store = Arc::new(MemoryHintStore::new());
        (SessionResolver::new(CannedTransport(c), store.clone()), store)
    }

    #[tokio::test]
    async fn regional_coordinator_login_warms_region_hints() {
        let body = json!({"user": {"id": "u1", "role": "RegionalCoordinator", "region": {"id": "r1", "name": {"fr": "Sud"}}}});
        let (r, store) = resolver(Canned::Body(body));
        let res = r.resolve_session().await;
        assert!(res.is_authenticated());
        assert_eq!(res.error(), None);
        let user = res.user().unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.roles, vec!["RegionalCoordinator"]);
        let hints = SessionHints::read(store.as_ref());
        assert_eq!(hints.user_region_id.as_deref(), Some("r1"));
        assert_eq!(hints.region_name.as_deref(), Some("Sud"));
        assert_eq!(hints.user_component, None);
    }

    #[tokio::test]
    async fn component_coordinator_with_known_track() {
        let body = json!({"id": "c1", "roles": ["ComponentCoordinator"], "component": {"composant": "crea"}});
        let (r, store) = resolver(Canned::Body(body));
        assert!(r.resolve_session().await.is_authenticated());
        assert_eq!(SessionHints::read(store.as_ref()).track(), Some(Track::Crea));
    }

    #[tokio::test]
    async fn unknown_track_or_wrong_role_leaves_hints_untouched() {
        let body = json!({"id": "c2", "role": "ComponentCoordinator", "component": {"composant": "other"}});
        let (r, store) = resolver(Canned::Body(body));
        assert!(r.resolve_session().await.is_authenticated());
        assert!(store.is_empty());

        let body = json!({"id": "m1", "role": "mentor", "region": {"id": "r5", "name": "Nord"}});
        let (r, store) = resolver(Canned::Body(body));
        assert!(r.resolve_session().await.is_authenticated());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unnamed_region_replaces_previous_region_name() {
        let store = Arc::new(MemoryHintStore::new());
        let first = json!({"id": "u1", "role": "RegionalCoordinator", "region": {"id": "r1", "name": {"fr": "Sud"}}});
        let r = SessionResolver::new(CannedTransport(Canned::Body(first)), store.clone());
        assert!(r.resolve_session().await.is_authenticated());
        assert_eq!(SessionHints::read(store.as_ref()).region_name.as_deref(), Some("Sud"));

        let second = json!({"id": "u2", "role": "RegionalCoordinator", "region": {"id": "r2"}});
        let r = SessionResolver::new(CannedTransport(Canned::Body(second)), store.clone());
        assert!(r.resolve_session().await.is_authenticated());
        let hints = SessionHints::read(store.as_ref());
        assert_eq!(hints.user_region_id.as_deref(), Some("r2"));
        assert_eq!(hints.region_name, None);
    }

    #[tokio::test]
    async fn unusable_payload_is_silently_anonymous() {
        let (r, _) = resolver(Canned::Body(json!({"message": "no session"})));
        assert_eq!(r.resolve_session().await, AuthResult::anonymous());
        let (r, _) = resolver(Canned::Nothing);
        assert_eq!(r.resolve_session().await, AuthResult::anonymous());
    }

    #[tokio::test]
    async fn transport_failure_carries_bare_message() {
        let (r, store) = resolver(Canned::Fail("timeout"));
        let res = r.resolve_session().await;
        assert_eq!(res, AuthResult::failed("timeout"));
        assert!(res.user().is_none());
        assert!(store.is_empty());
    }

    #[derive(Default)]
    struct RecordingNavigator(Mutex<Vec<String>>);

    impl Navigator for RecordingNavigator {
        fn hard_navigate(&self, path: &str) {
            self.0.lock().push(path.to_string());
        }
    }

    #[test]
    fn logout_clears_everything_and_is_idempotent() {
        let store = MemoryHintStore::new();
        store.set(HintKey::UserRegionId, "r1").unwrap();
        store.set(HintKey::RegionName, "Sud").unwrap();
        store.set(HintKey::UserComponent, "inov").unwrap();
        let nav = RecordingNavigator::default();
        logout(&store, &nav, "/login");
        assert!(store.is_empty());
        logout(&store, &nav, "/login");
        assert!(store.is_empty());
        assert_eq!(*nav.0.lock(), vec!["/login".to_string(), "/login".to_string()]);
    }
}

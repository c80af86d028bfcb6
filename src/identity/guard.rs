//! Render-time gate around protected content.
//!
//! A guard moves `Loading -> Authorized | Unauthorized` exactly once. Mounting dispatches a
//! single session resolution; later mounts and renders never start another. While loading
//! the guard renders nothing, so neither the protected content nor the fallback flashes.
//! Every failure (no identity, transport error, panic in the fetch) lands in `Unauthorized`.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::authorizer::{has_permission_with, Policy, RequiredRoles};
use super::principal::AuthResult;
use super::session::{IdentityTransport, SessionResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Authorized,
    Unauthorized,
}

fn decide(result: &AuthResult, required: &RequiredRoles, policy: Policy) -> GuardState {
    match result.user() {
        Some(user) if has_permission_with(Some(user), required.clone(), policy) => GuardState::Authorized,
        _ => GuardState::Unauthorized,
    }
}

pub struct AccessGuard<T> {
    resolver: Arc<SessionResolver<T>>,
    required: RequiredRoles,
    policy: Policy,
    // handed to the resolution task on first mount
    state_tx: Mutex<Option<watch::Sender<GuardState>>>,
    state_rx: watch::Receiver<GuardState>,
    mounted: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: IdentityTransport + 'static> AccessGuard<T> {
    pub fn new(resolver: Arc<SessionResolver<T>>, required: impl Into<RequiredRoles>) -> Self {
        let (tx, rx) = watch::channel(GuardState::Loading);
        Self {
            resolver,
            required: required.into(),
            policy: Policy::AnyOf,
            state_tx: Mutex::new(Some(tx)),
            state_rx: rx,
            mounted: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Require every listed role instead of any one of them.
    pub fn require_all(mut self, require_all: bool) -> Self {
        self.policy = Policy::from_require_all(require_all);
        self
    }

    pub fn policy(&self) -> Policy { self.policy }

    /// Start the one session resolution this guard will ever perform. Must run inside a
    /// tokio runtime. Repeated calls are no-ops.
    pub fn mount(&self) {
        let Some(tx) = self.state_tx.lock().take() else { return; };
        self.mounted.store(true, Ordering::SeqCst);
        let resolver = self.resolver.clone();
        let required = self.required.clone();
        let policy = self.policy;
        let mounted = self.mounted.clone();
        let handle = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(resolver.resolve_session()).catch_unwind().await;
            let next = match outcome {
                Ok(result) => decide(&result, &required, policy),
                Err(_) => {
                    warn!(target: "creathon::guard", "session resolution panicked; denying");
                    GuardState::Unauthorized
                }
            };
            if !mounted.load(Ordering::SeqCst) {
                debug!(target: "creathon::guard", "late session result after unmount ignored");
                return;
            }
            let _ = tx.send(next);
        });
        *self.task.lock() = Some(handle);
    }

    pub fn state(&self) -> GuardState {
        *self.state_rx.borrow()
    }

    /// `None` while loading; `children` once authorized; `fallback` (possibly `None`) otherwise.
    pub fn render<V>(&self, children: V, fallback: Option<V>) -> Option<V> {
        match self.state() {
            GuardState::Loading => None,
            GuardState::Authorized => Some(children),
            GuardState::Unauthorized => fallback,
        }
    }

    /// Mount if needed and wait for a terminal state. Returns `Loading` if the guard is
    /// unmounted before the resolution lands.
    pub async fn settled(&self) -> GuardState {
        self.mount();
        let mut rx = self.state_rx.clone();
        let waited = rx.wait_for(|s| *s != GuardState::Loading).await.map(|s| *s);
        match waited {
            Ok(s) => s,
            Err(_) => *rx.borrow(),
        }
    }

    /// Abort any in-flight resolution; a result that still arrives is dropped.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

impl<T> Drop for AccessGuard<T> {
    fn drop(&mut self) {
        self.mounted.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

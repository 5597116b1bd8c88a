//! Shared session state
//!
//! The credential pair, the in-flight refresh marker, the session epoch and
//! the proactive scheduler handle live behind one `tokio::sync::Mutex`. The
//! lock is never held across a network call.
//!
//! Transitions:
//! - LoggedOut → Authenticated (login success, rehydration)
//! - Authenticated → Authenticated (refresh success, pair replaced)
//! - Authenticated → LoggedOut (logout, refresh failure, 401 after retry)
//!
//! The epoch increments on every login and every session end. Work that
//! started in one epoch (a refresh, a request about to force logout) only
//! mutates state if the epoch is unchanged when it finishes.

use std::sync::{Arc, Weak};
use std::time::Duration;

use common::Secret;
use futures_util::future::{BoxFuture, Shared};
use studio_auth::{CredentialPair, CredentialStore};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::metrics;
use crate::scheduler;

/// Result every waiter of a refresh observes.
pub(crate) type RefreshOutcome = std::result::Result<Secret<String>, RefreshFailure>;

pub(crate) type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Debug, Clone, thiserror::Error)]
pub(crate) enum RefreshFailure {
    #[error("no refresh token held")]
    NotAuthenticated,

    #[error("refresh token rejected: {0}")]
    Rejected(String),

    #[error("refresh failed: {0}")]
    Failed(String),

    #[error("session ended while the refresh was in flight")]
    Superseded,
}

/// Single-flight marker. Callers needing a refresh attach to the shared
/// future instead of starting their own network call.
pub(crate) enum RefreshState {
    Idle,
    Refreshing(SharedRefresh),
}

pub(crate) struct SessionState {
    pub(crate) credentials: Option<CredentialPair>,
    pub(crate) refresh: RefreshState,
    pub(crate) epoch: u64,
    pub(crate) scheduler: Option<JoinHandle<()>>,
    /// Interval the running scheduler ticks at.
    pub(crate) refresh_interval: Option<Duration>,
}

impl SessionState {
    pub(crate) fn new(credentials: Option<CredentialPair>) -> Self {
        Self {
            credentials,
            refresh: RefreshState::Idle,
            epoch: 0,
            scheduler: None,
            refresh_interval: None,
        }
    }

    /// Replace the running scheduler (if any) with one ticking at `interval`.
    pub(crate) fn restart_scheduler(&mut self, inner: Weak<Inner>, interval: Duration) {
        self.stop_scheduler();
        self.scheduler = Some(scheduler::spawn_refresh_task(inner, interval));
        self.refresh_interval = Some(interval);
    }

    fn stop_scheduler(&mut self) {
        if let Some(handle) = self.scheduler.take() {
            handle.abort();
        }
        self.refresh_interval = None;
    }
}

/// State shared by every clone of an `ApiClient`.
pub(crate) struct Inner {
    pub(crate) http: reqwest::Client,
    pub(crate) config: ClientConfig,
    pub(crate) store: CredentialStore,
    pub(crate) session: Mutex<SessionState>,
}

impl Inner {
    /// Current access token and the epoch it belongs to.
    pub(crate) async fn snapshot(&self) -> (Option<Secret<String>>, u64) {
        let session = self.session.lock().await;
        let token = session
            .credentials
            .as_ref()
            .map(|pair| pair.access_token.clone());
        (token, session.epoch)
    }

    /// Whether a refresh is possible for work that started in `epoch`.
    pub(crate) async fn can_refresh(&self, epoch: u64) -> bool {
        let session = self.session.lock().await;
        session.epoch == epoch && session.credentials.is_some()
    }

    /// Install a freshly issued pair (login) and restart the scheduler.
    ///
    /// Persisting and committing happen under the session lock, so a refresh
    /// still in flight cannot land in between; it finds the epoch bumped and
    /// is discarded. If the write fails the session is unchanged.
    pub(crate) async fn begin_session(
        self: &Arc<Self>,
        pair: CredentialPair,
        lifetime: Option<Duration>,
    ) -> studio_auth::Result<()> {
        let interval = self.config.refresh_interval_for(lifetime);
        let mut session = self.session.lock().await;
        self.store.save(&pair)?;

        session.epoch += 1;
        session.credentials = Some(pair);
        session.refresh = RefreshState::Idle;
        session.restart_scheduler(Arc::downgrade(self), interval);
        info!(
            epoch = session.epoch,
            refresh_interval_secs = interval.as_secs(),
            "session started"
        );
        Ok(())
    }

    /// End the session unconditionally (explicit logout).
    pub(crate) async fn end_session(&self) -> studio_auth::Result<()> {
        let mut session = self.session.lock().await;
        self.end_session_locked(&mut session)
    }

    /// End the session started in `epoch`, if it is still the current one.
    pub(crate) async fn force_logout(&self, epoch: u64, reason: &'static str) {
        let mut session = self.session.lock().await;
        if session.epoch != epoch || session.credentials.is_none() {
            return;
        }
        warn!(reason, "forcing logout");
        metrics::record_forced_logout(reason);
        if let Err(e) = self.end_session_locked(&mut session) {
            warn!(error = %e, "failed to clear persisted credentials");
        }
    }

    /// Clear memory, stop the scheduler, bump the epoch, clear storage.
    ///
    /// Memory is cleared even when the storage write fails.
    pub(crate) fn end_session_locked(
        &self,
        session: &mut SessionState,
    ) -> studio_auth::Result<()> {
        let was_authenticated = session.credentials.take().is_some();
        session.refresh = RefreshState::Idle;
        session.stop_scheduler();
        session.epoch += 1;
        if was_authenticated {
            info!(epoch = session.epoch, "session ended");
        }
        self.store.clear()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.session.get_mut().stop_scheduler();
    }
}

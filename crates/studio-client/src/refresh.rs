//! Single-flight refresh coordination
//!
//! Any number of callers needing a new access token (401 handlers, the
//! proactive scheduler) end up awaiting the same shared future, and the
//! backend sees one refresh call. The network call runs in its own task so
//! it completes even if every waiter is cancelled; the task commits its
//! result and clears the marker under the session lock before any waiter
//! sees the outcome.

use std::sync::Arc;

use common::Secret;
use futures_util::FutureExt;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::session::{Inner, RefreshFailure, RefreshOutcome, RefreshState};

/// Obtain a fresh access token, joining an in-flight refresh if there is one.
///
/// `stale` is the token the caller saw rejected. If the current token already
/// differs from it, another caller refreshed in the meantime and that token
/// is returned without a network call. The scheduler passes `None` to always
/// refresh.
pub(crate) async fn ensure_fresh_token(
    inner: &Arc<Inner>,
    stale: Option<&Secret<String>>,
) -> RefreshOutcome {
    let shared = {
        let mut session = inner.session.lock().await;
        let in_flight = match &session.refresh {
            RefreshState::Refreshing(shared) => Some(shared.clone()),
            RefreshState::Idle => None,
        };
        match in_flight {
            Some(shared) => {
                debug!("joining in-flight refresh");
                shared
            }
            None => {
                let Some(pair) = session.credentials.as_ref() else {
                    return Err(RefreshFailure::NotAuthenticated);
                };
                if let Some(stale) = stale {
                    if pair.access_token != *stale {
                        debug!("token already replaced since the request was sent");
                        return Ok(pair.access_token.clone());
                    }
                }

                let refresh = pair.refresh_token.clone();
                let epoch = session.epoch;
                let task = tokio::spawn(run_refresh(Arc::clone(inner), refresh, epoch));
                let shared = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(RefreshFailure::Failed(format!("refresh task aborted: {e}")))
                    })
                }
                .boxed()
                .shared();
                session.refresh = RefreshState::Refreshing(shared.clone());
                debug!(epoch, "started refresh");
                shared
            }
        }
    };
    shared.await
}

/// Perform the refresh network call and commit its result.
async fn run_refresh(inner: Arc<Inner>, refresh: Secret<String>, epoch: u64) -> RefreshOutcome {
    let result = studio_auth::refresh_token(
        &inner.http,
        &inner.config.base_url,
        refresh.expose(),
        inner.config.timeout(),
    )
    .await;

    let mut session = inner.session.lock().await;
    if session.epoch != epoch {
        // Logged out (and possibly back in) while in flight; the marker, if
        // any, belongs to the newer session.
        debug!(epoch, current = session.epoch, "discarding refresh for ended session");
        return Err(RefreshFailure::Superseded);
    }
    session.refresh = RefreshState::Idle;

    match result {
        Ok(data) => {
            let pair = data.credentials();
            if let Err(e) = inner.store.save(&pair) {
                warn!(error = %e, "failed to persist refreshed tokens");
            }
            let access = pair.access_token.clone();
            session.credentials = Some(pair);
            metrics::record_refresh("success");
            info!(epoch, "access token refreshed");

            // The backend may issue tokens with a different lifetime than at login
            let interval = inner.config.refresh_interval_for(data.lifetime());
            if session.refresh_interval != Some(interval) {
                info!(
                    refresh_interval_secs = interval.as_secs(),
                    "token lifetime changed, rescheduling proactive refresh"
                );
                session.restart_scheduler(Arc::downgrade(&inner), interval);
            }
            Ok(access)
        }
        Err(e) => {
            let failure = match e {
                studio_auth::Error::InvalidCredentials(msg) => {
                    metrics::record_refresh("rejected");
                    RefreshFailure::Rejected(msg)
                }
                other => {
                    metrics::record_refresh("error");
                    RefreshFailure::Failed(other.to_string())
                }
            };
            warn!(error = %failure, "refresh failed, ending session");
            metrics::record_forced_logout("refresh_failed");
            if let Err(e) = inner.end_session_locked(&mut session) {
                warn!(error = %e, "failed to clear persisted credentials");
            }
            Err(failure)
        }
    }
}

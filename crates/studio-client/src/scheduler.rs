//! Proactive background token refresh
//!
//! Keeps the access token fresh without waiting for a 401. One task per
//! session: started on login or rehydration, aborted when the session ends
//! or the client is dropped. Ticks go through the same single-flight
//! coordinator as request-time refreshes, so the two never race into two
//! network calls.

use std::sync::Weak;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::refresh;
use crate::session::Inner;

/// Spawn the refresh loop for the current session.
///
/// Holds only a weak reference so an abandoned client is not kept alive by
/// its own timer. A failed tick has already ended the session (the refresh
/// task logs out on failure), so the loop stops there.
pub(crate) fn spawn_refresh_task(
    inner: Weak<Inner>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick is immediate and the tokens are brand new
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                debug!("client dropped, stopping refresh scheduler");
                break;
            };

            match refresh::ensure_fresh_token(&inner, None).await {
                Ok(_) => debug!("proactive refresh succeeded"),
                Err(e) => {
                    warn!(error = %e, "proactive refresh failed, stopping scheduler");
                    break;
                }
            }
        }
    })
}

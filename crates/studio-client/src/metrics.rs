//! Client-side counters
//!
//! Emitted through the `metrics` facade; they are no-ops unless the host
//! application installs a recorder.
//!
//! - `studio_client_requests_total` (counter): label `status`
//! - `studio_client_refresh_total` (counter): label `outcome`
//! - `studio_client_forced_logout_total` (counter): label `reason`

/// Record a backend response by HTTP status.
pub fn record_response(status: u16) {
    metrics::counter!("studio_client_requests_total", "status" => status.to_string()).increment(1);
}

/// Record a refresh network call outcome (`success`, `rejected`, `error`).
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("studio_client_refresh_total", "outcome" => outcome).increment(1);
}

/// Record a session ended by the client rather than by `logout`.
pub fn record_forced_logout(reason: &'static str) {
    metrics::counter!("studio_client_forced_logout_total", "reason" => reason).increment(1);
}

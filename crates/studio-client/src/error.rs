//! Error types for client operations
//!
//! Authentication failure at login is not an error: it comes back as an
//! envelope with `success: false`. Everything here is either a transport
//! failure, a local failure before dispatch, or the end of the session.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The refresh token was rejected, or the request was still unauthorized
    /// after a refresh. The client has been logged out.
    #[error("session expired, log in again")]
    SessionExpired,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("token storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Config(#[from] common::Error),
}

impl Error {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::SessionExpired)
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Error::Timeout(timeout)
        } else if err.is_decode() {
            Error::Decode(err.to_string())
        } else {
            Error::Http(err.to_string())
        }
    }

    pub(crate) fn storage(err: studio_auth::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

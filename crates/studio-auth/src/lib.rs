//! Authentication primitives for the studio site backend
//!
//! Provides the backend endpoint constants, the credential pair and its
//! durable key-value persistence, the `{success, message, data}` response
//! envelope, and the refresh-token endpoint call. The stateful client that
//! coordinates these (single-flight refresh, proactive scheduler, 401 retry)
//! lives in `studio-client`.
//!
//! Credential flow:
//! 1. Client posts `LoginRequest` to `LOGIN_PATH`, receives `LoginData`
//! 2. Pair persisted via `credentials::CredentialStore::save()`
//! 3. Refresh coordinator calls `token::refresh_token()` with the refresh token
//! 4. New pair persisted via `CredentialStore::save()`; old pair overwritten
//! 5. Logout or refresh rejection calls `CredentialStore::clear()`

pub mod constants;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{
    CredentialPair, CredentialStore, FileTokenStorage, MemoryTokenStorage, TokenStorage,
};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use token::{LoginData, LoginRequest, RefreshRequest, TokenData, refresh_token, token_lifetime};

/// Generate a correlation id for an outgoing request (`req_<uuid>`).
pub fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

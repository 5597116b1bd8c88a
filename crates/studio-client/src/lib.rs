//! Authenticated API client for the studio site backend
//!
//! `ApiClient` mediates every call to the REST backend: it attaches bearer
//! credentials, refreshes them proactively on a timer and reactively on 401,
//! collapses concurrent refreshes into a single network call, retries the
//! original request once, and mirrors the credential pair into durable
//! storage.
//!
//! Session lifecycle:
//! 1. `ApiClient::new` rehydrates a persisted pair → Authenticated, scheduler started
//! 2. `login` success → Authenticated, scheduler (re)started
//! 3. 401 or scheduler tick → single-flight refresh → Authenticated with the new pair
//! 4. Refresh rejected, 401 after retry, or `logout` → LoggedOut, scheduler stopped

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod request;
pub mod resources;

mod refresh;
mod scheduler;
mod session;

#[cfg(test)]
mod test_support;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use request::{ApiRequest, ImageUpload, RequestBody};
pub use resources::{ContactInfo, Message, Project, Service, UploadedImage};
pub use studio_auth::{
    CredentialPair, Envelope, FileTokenStorage, LoginData, MemoryTokenStorage, TokenStorage,
};
pub use tokio_util::sync::CancellationToken;

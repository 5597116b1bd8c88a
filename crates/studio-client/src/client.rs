//! The authenticated API client
//!
//! Every backend call goes through `ApiClient::request`:
//! 1. Attach `Authorization: Bearer` unless the request is one of the public
//!    exceptions (login, `GET /api/contact-info`)
//! 2. Send with the configured timeout and optional cancellation token
//! 3. On 401 with a session held (non-auth endpoints only): refresh through
//!    the single-flight coordinator and retry exactly once with the new token
//! 4. Decode the `{success, message, data}` envelope
//!
//! A refresh failure or a second 401 ends the session and returns
//! `Error::SessionExpired`; nothing loops.

use std::sync::Arc;

use common::Secret;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use studio_auth::{
    CredentialStore, Envelope, LOGIN_PATH, LOGOUT_PATH, LoginData, LoginRequest, REQUEST_ID_HEADER,
    RefreshRequest, TUNNEL_HEADER_NAME, TUNNEL_HEADER_VALUE, TokenStorage,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::metrics;
use crate::refresh;
use crate::request::{ApiRequest, RequestBody};
use crate::resources::UploadedImage;
use crate::session::{Inner, SessionState};

/// Authenticated client for the site backend.
///
/// Clone is cheap: clones share the session, the connection pool and the
/// refresh scheduler. Must be constructed inside a Tokio runtime.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// Build a client, rehydrating any persisted credential pair.
    ///
    /// If both tokens are found the session starts Authenticated and the
    /// proactive refresh scheduler is started.
    pub fn new(config: ClientConfig, storage: Arc<dyn TokenStorage>) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        if config.tunnel_header {
            headers.insert(
                TUNNEL_HEADER_NAME,
                HeaderValue::from_static(TUNNEL_HEADER_VALUE),
            );
        }
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Http(format!("building HTTP client: {e}")))?;

        let store = CredentialStore::new(storage);
        let credentials = store.load().map_err(Error::storage)?;
        let interval = credentials.as_ref().map(|pair| {
            let lifetime = studio_auth::token_lifetime(pair.access_token.expose(), None);
            config.refresh_interval_for(lifetime)
        });

        let inner = Arc::new_cyclic(|weak| {
            let mut session = SessionState::new(credentials);
            if let Some(interval) = interval {
                info!(
                    refresh_interval_secs = interval.as_secs(),
                    "restored persisted session"
                );
                session.restart_scheduler(weak.clone(), interval);
            }
            Inner {
                http,
                config,
                store,
                session: Mutex::new(session),
            }
        });

        Ok(Self { inner })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.session.lock().await.credentials.is_some()
    }

    /// The current access token, if a session is held.
    pub async fn access_token(&self) -> Option<Secret<String>> {
        self.inner.snapshot().await.0
    }

    /// Whether the proactive refresh scheduler is currently running.
    pub async fn is_refresh_scheduled(&self) -> bool {
        self.inner
            .session
            .lock()
            .await
            .scheduler
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Log in with username/password.
    ///
    /// Bad credentials come back as an `Ok` envelope with `success: false`;
    /// only transport failures are errors.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Envelope<LoginData>> {
        let request = ApiRequest::post(LOGIN_PATH).json(&LoginRequest { username, password })?;
        let envelope: Envelope<LoginData> = self.request(request).await?;

        match envelope.data.as_ref().filter(|_| envelope.success) {
            Some(data) => {
                self.inner
                    .begin_session(data.credentials(), data.lifetime())
                    .await
                    .map_err(Error::storage)?;
                info!("logged in");
            }
            None => info!(message = %envelope.message, "login rejected"),
        }
        Ok(envelope)
    }

    /// Log out.
    ///
    /// Tells the backend to invalidate the refresh token (best effort, any
    /// failure is ignored), then clears the session regardless. Calling it
    /// while logged out is a no-op. Only a failure to clear durable storage
    /// is reported.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let refresh = self
            .inner
            .session
            .lock()
            .await
            .credentials
            .as_ref()
            .map(|pair| pair.refresh_token.clone());

        if let Some(refresh) = refresh {
            let notify = ApiRequest::post(LOGOUT_PATH).json(&RefreshRequest {
                refresh_token: refresh.expose(),
            });
            let outcome = match notify {
                Ok(request) => self.request::<serde_json::Value>(request).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(envelope) if envelope.success => debug!("backend invalidated refresh token"),
                Ok(envelope) => debug!(message = %envelope.message, "backend declined logout"),
                Err(e) => warn!(error = %e, "logout notify failed, clearing session anyway"),
            }
        }

        self.inner.end_session().await.map_err(Error::storage)?;
        info!("logged out");
        Ok(())
    }

    /// Upload an image (multipart field `image`). Always authenticated and
    /// subject to the same refresh-and-retry contract as `request`.
    pub async fn upload_image(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Envelope<UploadedImage>> {
        self.request(ApiRequest::image(file_name, content_type, bytes))
            .await
    }

    /// Send a request to the backend and decode its envelope.
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Envelope<T>> {
        match request.cancellation().cloned() {
            Some(token) => tokio::select! {
                result = self.execute(&request) => result,
                _ = token.cancelled() => {
                    debug!(path = request.path(), "request cancelled");
                    Err(Error::Cancelled)
                }
            },
            None => self.execute(&request).await,
        }
    }

    #[instrument(skip_all, fields(method = %request.method(), path = request.path()))]
    async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<Envelope<T>> {
        let (token, epoch) = self.inner.snapshot().await;
        let bearer = token.as_ref().filter(|_| request.requires_bearer());

        let response = self.send(request, bearer).await?;
        // A 401 to an anonymous request says nothing about the session
        if response.status() != StatusCode::UNAUTHORIZED
            || bearer.is_none()
            || request.is_auth_endpoint()
            || !self.inner.can_refresh(epoch).await
        {
            return decode(response).await;
        }

        debug!("unauthorized, refreshing access token");
        let fresh = match refresh::ensure_fresh_token(&self.inner, token.as_ref()).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(error = %e, "refresh failed, session expired");
                self.inner.force_logout(epoch, "refresh_failed").await;
                return Err(Error::SessionExpired);
            }
        };

        let retry = self
            .send(request, Some(&fresh).filter(|_| request.requires_bearer()))
            .await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            warn!("still unauthorized after refresh, session expired");
            self.inner.force_logout(epoch, "unauthorized_after_retry").await;
            return Err(Error::SessionExpired);
        }
        decode(retry).await
    }

    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&Secret<String>>,
    ) -> Result<reqwest::Response> {
        let config = &self.inner.config;
        let timeout = config.timeout();
        let request_id = studio_auth::new_request_id();

        let mut builder = self
            .inner
            .http
            .request(request.method().clone(), config.url(request.path()))
            .headers(request.headers().clone())
            .header(REQUEST_ID_HEADER, request_id.as_str())
            .timeout(timeout);

        builder = match request.body() {
            Some(RequestBody::Json(body)) => builder.json(body),
            Some(RequestBody::Image(image)) => builder.multipart(image.to_form()?),
            None => builder.header(CONTENT_TYPE, "application/json"),
        };
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token.expose());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, timeout))?;

        let status = response.status().as_u16();
        metrics::record_response(status);
        debug!(request_id, status, bearer = bearer.is_some(), "backend responded");
        Ok(response)
    }
}

/// Decode any response (2xx or not) as an envelope.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<Envelope<T>> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::Http(format!("reading response body: {e}")))?;
    serde_json::from_slice(&body)
        .map_err(|e| Error::Decode(format!("status {status}: {e}")))
}

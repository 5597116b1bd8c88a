//! Request descriptors and the bearer attachment rules
//!
//! An `ApiRequest` is built per call and handed to `ApiClient::request`. It
//! is kept intact across the 401 retry, so bodies are held in a form that
//! can be serialized again (JSON value, raw image bytes).

use std::str::FromStr;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use studio_auth::{AUTH_PATH_PREFIX, CONTACT_INFO_PATH, LOGIN_PATH, UPLOAD_FIELD, UPLOAD_IMAGE_PATH};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Error, Result};

/// Image payload for `POST /api/upload/image`.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Build a fresh multipart form. Forms are consumed by sending, so the
    /// retry after a refresh builds a second one from the same bytes.
    pub(crate) fn to_form(&self) -> Result<Form> {
        let part = Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.content_type)
            .map_err(|e| Error::InvalidRequest(format!("invalid image content type: {e}")))?;
        Ok(Form::new().part(UPLOAD_FIELD, part))
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Image(ImageUpload),
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<RequestBody>,
    cancel: Option<CancellationToken>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            cancel: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// `POST /api/upload/image` with a multipart `image` field.
    pub fn image(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let mut request = Self::post(UPLOAD_IMAGE_PATH);
        request.body = Some(RequestBody::Image(ImageUpload {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }));
        request
    }

    /// Attach a JSON body. Serialization happens here, before any network call.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| Error::InvalidRequest(format!("body is not JSON-serializable: {e}")))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    /// Add a caller header. `Authorization` is owned by the client and is
    /// never taken from the caller.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_str(name)
            .map_err(|e| Error::InvalidRequest(format!("invalid header name {name}: {e}")))?;
        if name == AUTHORIZATION {
            warn!(header = %name, "refusing caller-supplied authorization header");
            return Ok(self);
        }
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidRequest(format!("invalid value for header {name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Abort the request (including a pending 401 retry) when `token` fires.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub(crate) fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    fn endpoint(&self) -> &str {
        self.path.split('?').next().unwrap_or_default()
    }

    /// Whether a bearer token is attached.
    ///
    /// Exactly two exceptions: the login endpoint, and `GET` on the contact
    /// info resource (the public site reads it anonymously; `PUT` still
    /// needs credentials).
    pub fn requires_bearer(&self) -> bool {
        let endpoint = self.endpoint();
        if endpoint == LOGIN_PATH {
            return false;
        }
        !(self.method == Method::GET && endpoint == CONTACT_INFO_PATH)
    }

    /// Auth endpoints never trigger a refresh on 401.
    pub fn is_auth_endpoint(&self) -> bool {
        self.endpoint().starts_with(AUTH_PATH_PREFIX)
    }
}

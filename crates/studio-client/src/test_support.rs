//! Fake site backend for client tests
//!
//! One axum app on `127.0.0.1:0` that records every request and implements
//! just enough of the backend: login, rotating refresh tokens, logout,
//! bearer-checked resources, the public contact-info read and image upload.
//! Knobs let a test expire the access token, fail refreshes, change the
//! reported token lifetime or slow the backend down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::to_bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use studio_auth::{
    CONTACT_INFO_PATH, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH, REQUEST_ID_HEADER,
    TUNNEL_HEADER_NAME, TokenStorage, UPLOAD_IMAGE_PATH,
};
use tokio::net::TcpListener;

use crate::{ApiClient, ClientConfig};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub tunnel: Option<String>,
    pub request_id: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct BackendState {
    requests: Vec<RecordedRequest>,
    valid_access: Option<String>,
    current_refresh: Option<String>,
    generation: u32,
    login_token: Option<String>,
    reject_refresh: bool,
    refresh_server_error: bool,
    reject_all_bearers: bool,
    reject_contact_info: bool,
    login_expires_in: Option<u64>,
    refresh_expires_in: Option<u64>,
    refresh_delay: Duration,
    resource_delay: Duration,
}

pub(crate) struct Backend {
    pub url: String,
    state: Arc<Mutex<BackendState>>,
}

impl Backend {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(BackendState::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let app = Router::new().fallback(handle).with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { url, state }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    /// Stop accepting the current access token until the next refresh.
    pub fn expire_access_token(&self) {
        self.state.lock().unwrap().valid_access = None;
    }

    pub fn reject_refresh(&self) {
        self.state.lock().unwrap().reject_refresh = true;
    }

    /// Answer refresh calls with a 500 instead of a rejection.
    pub fn fail_refresh_with_server_error(&self) {
        self.state.lock().unwrap().refresh_server_error = true;
    }

    /// Make the public contact-info read answer 401.
    pub fn reject_contact_info(&self) {
        self.state.lock().unwrap().reject_contact_info = true;
    }

    /// `expiresIn` reported by login and refresh responses.
    pub fn set_expires_in(&self, login: Option<u64>, refresh: Option<u64>) {
        let mut s = self.state.lock().unwrap();
        s.login_expires_in = login;
        s.refresh_expires_in = refresh;
    }

    pub fn reject_all_bearers(&self) {
        self.state.lock().unwrap().reject_all_bearers = true;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.lock().unwrap().refresh_delay = delay;
    }

    pub fn set_resource_delay(&self, delay: Duration) {
        self.state.lock().unwrap().resource_delay = delay;
    }

    /// Access token handed out by the next login (default `A1`).
    pub fn set_login_token(&self, token: String) {
        self.state.lock().unwrap().login_token = Some(token);
    }
}

pub(crate) fn client_for(backend: &Backend, storage: Arc<dyn TokenStorage>) -> ApiClient {
    ApiClient::new(ClientConfig::new(backend.url.clone()), storage).unwrap()
}

/// A JWT-shaped access token whose `exp - iat` is `secs`.
pub(crate) fn jwt_with_lifetime(subject: &str, secs: u64) -> String {
    let iat = 1_700_000_000u64;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = json!({"sub": subject, "iat": iat, "exp": iat + secs});
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

fn envelope(status: StatusCode, success: bool, message: &str, data: Value) -> Response {
    (
        status,
        axum::Json(json!({"success": success, "message": message, "data": data})),
    )
        .into_response()
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn read_body(req: Request, is_multipart: bool) -> Value {
    if is_multipart {
        let mut multipart = Multipart::from_request(req, &()).await.unwrap();
        let mut recorded = json!({});
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().map(str::to_owned);
            let filename = field.file_name().map(str::to_owned);
            let bytes = field.bytes().await.unwrap();
            recorded = json!({"field": name, "filename": filename, "size": bytes.len()});
        }
        return recorded;
    }
    let bytes = to_bytes(req.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

async fn handle(State(state): State<Arc<Mutex<BackendState>>>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let headers = req.headers().clone();
    let content_type = header_value(&headers, header::CONTENT_TYPE.as_str());
    let is_multipart = content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));
    let body = read_body(req, is_multipart).await;

    let authorization = header_value(&headers, header::AUTHORIZATION.as_str());
    let (refresh_delay, resource_delay) = {
        let mut s = state.lock().unwrap();
        s.requests.push(RecordedRequest {
            method: method.to_string(),
            path: path.clone(),
            authorization: authorization.clone(),
            tunnel: header_value(&headers, TUNNEL_HEADER_NAME),
            request_id: header_value(&headers, REQUEST_ID_HEADER),
            content_type,
            body: body.clone(),
        });
        (s.refresh_delay, s.resource_delay)
    };

    match (method.clone(), path.as_str()) {
        (Method::POST, LOGIN_PATH) => {
            if body["password"] != "secret" {
                return envelope(
                    StatusCode::UNAUTHORIZED,
                    false,
                    "Invalid credentials",
                    Value::Null,
                );
            }
            let mut s = state.lock().unwrap();
            let access = s.login_token.clone().unwrap_or_else(|| "A1".into());
            s.generation = 1;
            s.valid_access = Some(access.clone());
            s.current_refresh = Some("R1".into());
            envelope(
                StatusCode::OK,
                true,
                "Login successful",
                json!({
                    "accessToken": access,
                    "refreshToken": "R1",
                    "expiresIn": s.login_expires_in,
                    "user": {"username": body["username"]},
                }),
            )
        }
        (Method::POST, REFRESH_PATH) => {
            // Validated on arrival, issued after the delay
            let failure = {
                let s = state.lock().unwrap();
                let presented = body["refreshToken"].as_str().map(str::to_owned);
                if s.refresh_server_error {
                    Some((StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"))
                } else if s.reject_refresh
                    || presented.is_none()
                    || presented != s.current_refresh
                {
                    Some((StatusCode::UNAUTHORIZED, "Invalid refresh token"))
                } else {
                    None
                }
            };
            tokio::time::sleep(refresh_delay).await;
            if let Some((status, message)) = failure {
                return envelope(status, false, message, Value::Null);
            }

            let mut s = state.lock().unwrap();
            s.generation += 1;
            let access = format!("A{}", s.generation);
            let refresh = format!("R{}", s.generation);
            s.valid_access = Some(access.clone());
            s.current_refresh = Some(refresh.clone());
            envelope(
                StatusCode::OK,
                true,
                "Token refreshed",
                json!({
                    "accessToken": access,
                    "refreshToken": refresh,
                    "expiresIn": s.refresh_expires_in,
                }),
            )
        }
        (Method::POST, LOGOUT_PATH) => {
            state.lock().unwrap().current_refresh = None;
            envelope(StatusCode::OK, true, "Logged out", Value::Null)
        }
        (Method::GET, "/plain-text") => (StatusCode::OK, "not json").into_response(),
        (Method::GET, CONTACT_INFO_PATH) => {
            tokio::time::sleep(resource_delay).await;
            if state.lock().unwrap().reject_contact_info {
                return envelope(StatusCode::UNAUTHORIZED, false, "Unauthorized", Value::Null);
            }
            envelope(
                StatusCode::OK,
                true,
                "",
                json!({"email": "hello@studio.test", "phone": "+1 555 0100"}),
            )
        }
        _ => {
            tokio::time::sleep(resource_delay).await;
            let authorized = {
                let s = state.lock().unwrap();
                !s.reject_all_bearers
                    && s.valid_access.is_some()
                    && authorization == s.valid_access.as_ref().map(|t| format!("Bearer {t}"))
            };
            if !authorized {
                return envelope(StatusCode::UNAUTHORIZED, false, "Unauthorized", Value::Null);
            }
            resource(&method, &path, body)
        }
    }
}

fn resource(method: &Method, path: &str, body: Value) -> Response {
    match (method.clone(), path) {
        (Method::GET, "/api/services") => envelope(
            StatusCode::OK,
            true,
            "",
            json!([{"id": 1, "title": "Branding", "description": "Identity systems"}]),
        ),
        (Method::GET, "/api/projects") | (Method::GET, "/api/messages") => {
            envelope(StatusCode::OK, true, "", json!([]))
        }
        (Method::GET, "/api/messages/404") => {
            envelope(StatusCode::NOT_FOUND, false, "Message not found", Value::Null)
        }
        (Method::POST, UPLOAD_IMAGE_PATH) => {
            let filename = body["filename"].as_str().unwrap_or_default().to_owned();
            envelope(
                StatusCode::OK,
                true,
                "Image uploaded",
                json!({"filename": filename, "url": format!("/uploads/{filename}")}),
            )
        }
        (Method::DELETE, _) => envelope(StatusCode::OK, true, "Deleted", Value::Null),
        (Method::PATCH, _) => envelope(
            StatusCode::OK,
            true,
            "Marked as read",
            json!({"id": 3, "read": true}),
        ),
        _ => envelope(StatusCode::OK, true, "", body),
    }
}

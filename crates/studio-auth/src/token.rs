//! Auth wire types, refresh-token exchange and token lifetime derivation
//!
//! The refresh call is issued directly against `REFRESH_PATH` rather than
//! through the client's dispatcher, so a rejected refresh can never recurse
//! into another refresh. Login and logout go through the dispatcher.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{REFRESH_PATH, REQUEST_ID_HEADER};
use crate::credentials::CredentialPair;
use crate::envelope::Envelope;
use crate::error::{Error, Result};

/// Body of `POST /api/auth/login`. No `Debug`, it carries the password.
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// `data` of a successful login envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires, when the backend reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Profile of the logged-in admin, passed through untouched
    #[serde(default)]
    pub user: serde_json::Value,
}

impl LoginData {
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair::new(self.access_token.clone(), self.refresh_token.clone())
    }

    pub fn lifetime(&self) -> Option<Duration> {
        token_lifetime(&self.access_token, self.expires_in)
    }
}

/// Body of `POST /api/auth/refresh-token` and `POST /api/auth/logout`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// `data` of a successful refresh envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl TokenData {
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair::new(self.access_token.clone(), self.refresh_token.clone())
    }

    pub fn lifetime(&self) -> Option<Duration> {
        token_lifetime(&self.access_token, self.expires_in)
    }
}

/// Exchange a refresh token for a new access/refresh pair.
///
/// `client` is expected to carry the default headers (tunnel bypass) the
/// rest of the client uses. 400/401/403 and `success: false` envelopes mean
/// the backend no longer accepts the refresh token.
pub async fn refresh_token(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
    timeout: Duration,
) -> Result<TokenData> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH);
    let response = client
        .post(&url)
        .header(REQUEST_ID_HEADER, crate::new_request_id())
        .json(&RefreshRequest {
            refresh_token: refresh,
        })
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(timeout)
            } else {
                Error::Http(format!("token refresh request failed: {e}"))
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if matches!(status.as_u16(), 400 | 401 | 403) {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    let envelope = response
        .json::<Envelope<TokenData>>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))?;

    match envelope {
        Envelope {
            success: true,
            data: Some(data),
            ..
        } => {
            debug!("refresh endpoint issued a new token pair");
            Ok(data)
        }
        Envelope {
            success: false,
            message,
            ..
        } => Err(Error::InvalidCredentials(format!(
            "refresh token rejected: {message}"
        ))),
        Envelope { .. } => Err(Error::TokenExchange(
            "refresh response had no token data".into(),
        )),
    }
}

/// Derive the access token's validity window.
///
/// Prefers the explicit `expires_in` seconds. Otherwise, if the token is a
/// JWT, uses `exp - iat`, falling back to `exp - now`. Returns `None` for
/// opaque tokens or unusable claims.
pub fn token_lifetime(access_token: &str, expires_in: Option<u64>) -> Option<Duration> {
    if let Some(secs) = expires_in.filter(|s| *s > 0) {
        return Some(Duration::from_secs(secs));
    }

    let claims = jwt_claims(access_token)?;
    let exp = claims.exp?;
    let start = match claims.iat {
        Some(iat) => iat,
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
    };
    (exp > start).then(|| Duration::from_secs(exp - start))
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    exp: Option<u64>,
    iat: Option<u64>,
}

fn jwt_claims(token: &str) -> Option<JwtClaims> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::StatusCode;
    use axum::routing::post;
    use tokio::net::TcpListener;

    fn jwt(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    /// Start a backend whose refresh endpoint answers with a fixed status/body.
    async fn start_refresh_backend(status: StatusCode, body: serde_json::Value) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let app = axum::Router::new().route(
                REFRESH_PATH,
                post(move |Json(req): Json<serde_json::Value>| {
                    let body = body.clone();
                    async move {
                        assert!(req["refreshToken"].is_string());
                        (status, Json(body))
                    }
                }),
            );
            axum::serve(listener, app).await.unwrap();
        });
        url
    }

    #[test]
    fn login_data_deserializes_camel_case() {
        let json = r#"{"accessToken":"A1","refreshToken":"R1","user":{"username":"admin"}}"#;
        let data: LoginData = serde_json::from_str(json).unwrap();
        assert_eq!(data.access_token, "A1");
        assert_eq!(data.refresh_token, "R1");
        assert_eq!(data.user["username"], "admin");
        assert_eq!(data.expires_in, None);
    }

    #[test]
    fn refresh_request_serializes_camel_case() {
        let json = serde_json::to_string(&RefreshRequest { refresh_token: "R1" }).unwrap();
        assert_eq!(json, r#"{"refreshToken":"R1"}"#);
    }

    #[test]
    fn lifetime_prefers_expires_in() {
        let token = jwt(serde_json::json!({"iat": 1000, "exp": 1900}));
        assert_eq!(
            token_lifetime(&token, Some(600)),
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn lifetime_from_jwt_claims() {
        let token = jwt(serde_json::json!({"sub": "1", "iat": 1_700_000_000u64, "exp": 1_700_000_900u64}));
        assert_eq!(token_lifetime(&token, None), Some(Duration::from_secs(900)));
    }

    #[test]
    fn lifetime_unknown_for_opaque_or_bad_tokens() {
        assert_eq!(token_lifetime("opaque-token", None), None);
        assert_eq!(token_lifetime("a.%%%.c", None), None);
        assert_eq!(token_lifetime("a.b.c.d", None), None);
        let expired = jwt(serde_json::json!({"iat": 2000, "exp": 1000}));
        assert_eq!(token_lifetime(&expired, None), None);
        assert_eq!(token_lifetime("opaque-token", Some(0)), None);
    }

    #[tokio::test]
    async fn refresh_returns_new_pair() {
        let url = start_refresh_backend(
            StatusCode::OK,
            serde_json::json!({
                "success": true,
                "message": "Token refreshed",
                "data": {"accessToken": "A2", "refreshToken": "R2"}
            }),
        )
        .await;

        let data = refresh_token(&reqwest::Client::new(), &url, "R1", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(data.access_token, "A2");
        assert_eq!(data.refresh_token, "R2");
    }

    #[tokio::test]
    async fn refresh_rejection_is_invalid_credentials() {
        for status in [StatusCode::BAD_REQUEST, StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let url = start_refresh_backend(
                status,
                serde_json::json!({"success": false, "message": "Invalid refresh token", "data": null}),
            )
            .await;
            let result =
                refresh_token(&reqwest::Client::new(), &url, "R1", Duration::from_secs(5)).await;
            assert!(
                matches!(result, Err(Error::InvalidCredentials(_))),
                "status {status} must reject, got {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn refresh_failure_envelope_is_invalid_credentials() {
        let url = start_refresh_backend(
            StatusCode::OK,
            serde_json::json!({"success": false, "message": "expired"}),
        )
        .await;
        let result = refresh_token(&reqwest::Client::new(), &url, "R1", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn refresh_server_error_is_token_exchange() {
        let url = start_refresh_backend(
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({"success": false, "message": "db down"}),
        )
        .await;
        let result = refresh_token(&reqwest::Client::new(), &url, "R1", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::TokenExchange(_))));
    }

    #[tokio::test]
    async fn refresh_against_dead_backend_is_http_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let result = refresh_token(&reqwest::Client::new(), &url, "R1", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::Http(_))), "got {result:?}");
    }
}

//! Backend endpoint paths, storage keys and fixed headers
//!
//! Paths are relative to the configured base URL. The site backend fronts
//! every resource with an `/api` prefix.

/// Credential exchange (username/password → token pair). Never sent with a bearer.
pub const LOGIN_PATH: &str = "/api/auth/login";

/// Refresh token exchange.
pub const REFRESH_PATH: &str = "/api/auth/refresh-token";

/// Server-side refresh token invalidation.
pub const LOGOUT_PATH: &str = "/api/auth/logout";

/// Prefix shared by every auth endpoint. A 401 from these never triggers a refresh.
pub const AUTH_PATH_PREFIX: &str = "/api/auth/";

/// Contact info resource. GET is public, PUT requires a bearer.
pub const CONTACT_INFO_PATH: &str = "/api/contact-info";

pub const SERVICES_PATH: &str = "/api/services";
pub const PROJECTS_PATH: &str = "/api/projects";
pub const MESSAGES_PATH: &str = "/api/messages";

/// Multipart image upload, form field `UPLOAD_FIELD`.
pub const UPLOAD_IMAGE_PATH: &str = "/api/upload/image";
pub const UPLOAD_FIELD: &str = "image";

/// Durable storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Durable storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Tunnel interstitial bypass header. The backend is published through an
/// ngrok tunnel, which serves a browser warning page unless this is present.
pub const TUNNEL_HEADER_NAME: &str = "ngrok-skip-browser-warning";
pub const TUNNEL_HEADER_VALUE: &str = "true";

/// Correlation header attached to every outgoing request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

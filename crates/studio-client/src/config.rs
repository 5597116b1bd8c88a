//! Client configuration
//!
//! Deserialized from the `[client]` table of the admin console config, or
//! built in code with `ClientConfig::new`. The proactive refresh interval is
//! normally derived from the access token's lifetime (half of it, bounded
//! below by `min_refresh_interval_secs`); `refresh_interval_secs` is only
//! used when the backend reports no lifetime and the token carries no
//! readable expiry.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Backend origin, e.g. `https://studio-api.example.com`
    pub base_url: String,
    /// Per-request timeout
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Proactive refresh interval when the token lifetime is unknown
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Floor for a lifetime-derived refresh interval
    #[serde(default = "default_min_refresh_interval")]
    pub min_refresh_interval_secs: u64,
    /// Send `ngrok-skip-browser-warning: true` with every request
    #[serde(default = "default_tunnel_header")]
    pub tunnel_header: bool,
}

fn default_timeout() -> u64 {
    30
}

/// Half of the backend's 15-minute access token.
fn default_refresh_interval() -> u64 {
    7 * 60
}

fn default_min_refresh_interval() -> u64 {
    30
}

fn default_tunnel_header() -> bool {
    true
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout(),
            refresh_interval_secs: default_refresh_interval(),
            min_refresh_interval_secs: default_min_refresh_interval(),
            tunnel_header: default_tunnel_header(),
        }
    }

    pub fn validate(&self) -> common::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.refresh_interval_secs == 0 {
            return Err(common::Error::Config(
                "refresh_interval_secs must be greater than 0".into(),
            ));
        }
        if self.min_refresh_interval_secs == 0 {
            return Err(common::Error::Config(
                "min_refresh_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Proactive refresh interval for a token with the given lifetime.
    pub fn refresh_interval_for(&self, lifetime: Option<Duration>) -> Duration {
        match lifetime {
            Some(lifetime) => (lifetime / 2).max(Duration::from_secs(self.min_refresh_interval_secs)),
            None => Duration::from_secs(self.refresh_interval_secs),
        }
    }

    /// Absolute URL for an endpoint path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_minimal_toml() {
        let config: ClientConfig = toml::from_str(r#"base_url = "https://api.example.com""#).unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.refresh_interval_secs, 420);
        assert_eq!(config.min_refresh_interval_secs, 30);
        assert!(config.tunnel_header);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = ClientConfig::new("ftp://api.example.com").validate().unwrap_err();
        assert!(err.to_string().contains("base_url"), "got: {err}");
    }

    #[test]
    fn rejects_zero_values() {
        let mut config = ClientConfig::new("http://localhost:5000");
        config.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::new("http://localhost:5000");
        config.refresh_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::new("http://localhost:5000");
        config.min_refresh_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn interval_is_half_the_lifetime() {
        let config = ClientConfig::new("http://localhost:5000");
        assert_eq!(
            config.refresh_interval_for(Some(Duration::from_secs(900))),
            Duration::from_secs(450)
        );
    }

    #[test]
    fn interval_has_a_floor_and_a_fallback() {
        let config = ClientConfig::new("http://localhost:5000");
        assert_eq!(
            config.refresh_interval_for(Some(Duration::from_secs(10))),
            Duration::from_secs(30)
        );
        assert_eq!(config.refresh_interval_for(None), Duration::from_secs(420));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let config = ClientConfig::new("http://localhost:5000/");
        assert_eq!(
            config.url("/api/projects"),
            "http://localhost:5000/api/projects"
        );
        assert_eq!(
            ClientConfig::new("http://localhost:5000").url("api/services/3"),
            "http://localhost:5000/api/services/3"
        );
    }
}

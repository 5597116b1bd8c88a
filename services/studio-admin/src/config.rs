//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The admin password is loaded from STUDIO_ADMIN_PASSWORD or password_file,
//! never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use studio_client::ClientConfig;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub client: ClientConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Where the credential pair is persisted between runs
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
        }
    }
}

/// Login defaults
#[derive(Debug, Default, Deserialize)]
pub struct AdminConfig {
    /// Used by `login` when no username is given on the command line
    #[serde(default)]
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
    /// Path to a file containing the password (alternative to STUDIO_ADMIN_PASSWORD)
    #[serde(default)]
    pub password_file: Option<PathBuf>,
}

fn default_token_file() -> PathBuf {
    PathBuf::from(".studio-admin/tokens.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Password resolution order:
    /// 1. STUDIO_ADMIN_PASSWORD env var
    /// 2. password_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        config.client.validate()?;

        if config.storage.token_file.as_os_str().is_empty() {
            return Err(common::Error::Config(
                "storage.token_file must not be empty".into(),
            ));
        }

        if let Ok(password) = std::env::var("STUDIO_ADMIN_PASSWORD") {
            config.admin.password = Some(Secret::new(password));
        } else if let Some(ref password_file) = config.admin.password_file {
            let password = std::fs::read_to_string(password_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read password_file {}: {e}",
                    password_file.display()
                ))
            })?;
            let password = password.trim_end_matches(['\r', '\n']).to_owned();
            if !password.is_empty() {
                config.admin.password = Some(Secret::new(password));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("studio-admin.toml")
    }
}

//! Credential pair and durable token storage
//!
//! The pair is mirrored into a key-value store under two fixed keys
//! (`accessToken`, `refreshToken`). Writes are synchronous and happen every
//! time the in-memory pair changes; the store is read once when a client is
//! constructed so a restart does not force a new login.
//!
//! `FileTokenStorage` keeps the map in a JSON file and writes it with an
//! atomic temp-file + rename. `MemoryTokenStorage` keeps it in process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use common::Secret;
use tracing::{debug, info, warn};

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::error::{Error, Result};

/// Access/refresh token pair. Both tokens are opaque backend-issued strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            refresh_token: Secret::new(refresh_token.into()),
        }
    }
}

/// Durable string key-value storage.
///
/// Object safe so the client can hold `Arc<dyn TokenStorage>` and tests can
/// substitute an in-memory implementation.
pub trait TokenStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Write several keys. Implementations backed by a single file override
    /// this to persist all entries in one write.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Remove several keys, see `set_many`.
    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Token storage backed by a JSON object file.
pub struct FileTokenStorage {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileTokenStorage {
    /// Load the storage file, creating it as `{}` if it doesn't exist.
    pub fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Io(format!("reading token file: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), keys = entries.len(), "loaded token storage");
            entries
        } else {
            info!(path = %path.display(), "token file not found, starting empty");
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .map_err(|e| Error::Io(format!("creating token directory: {e}")))?;
            }
            let entries = HashMap::new();
            write_atomic(&path, &entries)?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.state
            .lock()
            .map_err(|_| Error::Io("token storage lock poisoned".into()))
    }
}

impl TokenStorage for FileTokenStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)])
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_many(&[key])
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut state = self.lock()?;
        for (key, value) in entries {
            state.insert((*key).to_owned(), (*value).to_owned());
        }
        write_atomic(&self.path, &state)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut state = self.lock()?;
        let mut changed = false;
        for key in keys {
            changed |= state.remove(*key).is_some();
        }
        if changed {
            write_atomic(&self.path, &state)?;
        }
        Ok(())
    }
}

/// In-process token storage. Nothing survives the process.
#[derive(Default)]
pub struct MemoryTokenStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Io("token storage lock poisoned".into()))
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Reads and writes the credential pair under the fixed storage keys.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn TokenStorage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self { storage }
    }

    /// Read the persisted pair.
    ///
    /// Returns `None` unless both tokens are present and non-empty. A record
    /// with only one key (e.g. a crash between writes by another storage
    /// implementation) is cleared so the pair invariant holds on disk too.
    pub fn load(&self) -> Result<Option<CredentialPair>> {
        let access = self.storage.get(ACCESS_TOKEN_KEY)?.filter(|t| !t.is_empty());
        let refresh = self.storage.get(REFRESH_TOKEN_KEY)?.filter(|t| !t.is_empty());
        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(Some(CredentialPair::new(access, refresh))),
            (None, None) => Ok(None),
            (access, refresh) => {
                warn!(
                    has_access = access.is_some(),
                    has_refresh = refresh.is_some(),
                    "discarding half-persisted credential record"
                );
                self.clear()?;
                Ok(None)
            }
        }
    }

    pub fn save(&self, pair: &CredentialPair) -> Result<()> {
        self.storage.set_many(&[
            (ACCESS_TOKEN_KEY, pair.access_token.expose()),
            (REFRESH_TOKEN_KEY, pair.refresh_token.expose()),
        ])?;
        debug!("persisted credential pair");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.storage
            .remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])?;
        debug!("cleared persisted credential pair");
        Ok(())
    }
}

/// Write the token map atomically (temp file in the same directory, then
/// rename). The file holds live credentials, so it is created 0600 on unix.
fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing tokens: {e}")))?;

    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token file");
    Ok(())
}

//! Persistent key/value storage for the access token and session snapshot.
//!
//! Three backends are available: an in-memory map, one file per key under a
//! directory, and the OS keychain via the `keyring` crate.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use keyring::Entry;
use thiserror::Error;
use zeroize::Zeroize;

/// Keychain service name for the keychain backend.
const SERVICE_NAME: &str = "com.moc.admin";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Keychain operation failed: {0}")]
    Keychain(String),
    #[error("Session file {path} could not be accessed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Session store lock poisoned")]
    Poisoned,
    #[error("Session snapshot could not be serialized: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl From<keyring::Error> for StoreError {
    fn from(err: keyring::Error) -> Self {
        StoreError::Keychain(err.to_string())
    }
}

/// String storage keyed by fixed names (`accessToken`, `user`).
///
/// Reads and writes are not transactional; concurrent writers race and the
/// last write wins.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// ── Memory ────────────────────────────────────────────────────────────────────

/// Process-local store. Removed or overwritten values are zeroed.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        if let Some(mut old) = entries.insert(key.to_string(), value.to_string()) {
            old.zeroize();
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        if let Some(mut old) = entries.remove(key) {
            old.zeroize();
        }
        Ok(())
    }
}

// ── File ──────────────────────────────────────────────────────────────────────

/// One file per key inside `dir`. The directory is created on first write.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default location: `<user config dir>/moc-admin`.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("moc-admin"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(key);
        let write = || -> std::io::Result<()> {
            let mut options = std::fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&path)?;
            // `mode` only applies on creation; tighten files left by older writes.
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
            }
            file.write_all(value.as_bytes())
        };
        write().map_err(|source| StoreError::Io { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

// ── Keychain ──────────────────────────────────────────────────────────────────

/// OS keychain store: one credential entry per key under [`SERVICE_NAME`].
#[derive(Default)]
pub struct KeychainStore;

impl KeychainStore {
    pub fn new() -> Self {
        Self
    }
}

impl SessionStore for KeychainStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entry = Entry::new(SERVICE_NAME, key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let entry = Entry::new(SERVICE_NAME, key)?;
        entry.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let entry = Entry::new(SERVICE_NAME, key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn SessionStore) {
        assert_eq!(store.get("accessToken").unwrap(), None);

        store.set("accessToken", "first").unwrap();
        assert_eq!(store.get("accessToken").unwrap().as_deref(), Some("first"));

        store.set("accessToken", "second").unwrap();
        assert_eq!(store.get("accessToken").unwrap().as_deref(), Some("second"));

        store.set("user", "{}").unwrap();
        store.remove("accessToken").unwrap();
        assert_eq!(store.get("accessToken").unwrap(), None);
        assert_eq!(store.get("user").unwrap().as_deref(), Some("{}"));

        // Idempotent
        store.remove("accessToken").unwrap();
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("session"));
        exercise(&store);
        assert!(store.dir().join("user").exists());
        assert!(!store.dir().join("accessToken").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("session"));
        store.set("accessToken", "secret").unwrap();

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(store.dir()), 0o700);
        assert_eq!(mode(&store.dir().join("accessToken")), 0o600);

        // A file written with looser permissions is tightened on the next write.
        let user = store.dir().join("user");
        std::fs::write(&user, "{}").unwrap();
        std::fs::set_permissions(&user, std::fs::Permissions::from_mode(0o644)).unwrap();
        store.set("user", "{\"email\":\"a@b.c\"}").unwrap();
        assert_eq!(mode(&user), 0o600);
        assert_eq!(store.get("user").unwrap().as_deref(), Some("{\"email\":\"a@b.c\"}"));
    }

    #[test]
    fn test_file_store_missing_dir_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("never-created"));
        assert_eq!(store.get("user").unwrap(), None);
        store.remove("user").unwrap();
    }
}

//! Persisted session storage.
//!
//! Login state survives between runs as two keys: the bearer token (plain
//! string) and the serialized user record (JSON). Both are written and cleared
//! together.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Storage key for the bearer token
pub const TOKEN_KEY: &str = "token";
/// Storage key for the serialized user record
pub const USER_KEY: &str = "user";

/// The locally cached user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Always false on locally built records; privilege is tracked by the
    /// admin check, not by this field.
    #[serde(default)]
    pub is_staff: bool,
}

/// A complete persisted login: token and user, never one without the other
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    pub user: User,
}

/// Key/value storage backing the session.
///
/// Implementations only provide raw key access; `load`, `save` and `clear`
/// are shared so every backend fails closed the same way.
pub trait SessionStore {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;

    /// Current token, if any. An empty token counts as absent.
    fn token(&self) -> Option<String> {
        self.read(TOKEN_KEY).filter(|t| !t.trim().is_empty())
    }

    /// Load the persisted session. Partial or malformed data yields `None`.
    fn load(&self) -> Option<StoredSession> {
        let token = self.token()?;
        let raw_user = self.read(USER_KEY)?;
        let user: User = serde_json::from_str(&raw_user).ok()?;
        Some(StoredSession { token, user })
    }

    /// True when either key holds something, usable or not
    fn has_residue(&self) -> bool {
        self.read(TOKEN_KEY).is_some() || self.read(USER_KEY).is_some()
    }

    /// Write user then token. A failed write leaves neither key behind.
    fn save(&self, token: &str, user: &User) -> io::Result<()> {
        let json = serde_json::to_string(user)?;
        let written = self
            .write(USER_KEY, &json)
            .and_then(|()| self.write(TOKEN_KEY, token));
        if written.is_err() {
            let _ = self.clear();
        }
        written
    }

    fn clear(&self) -> io::Result<()> {
        self.remove(TOKEN_KEY)?;
        self.remove(USER_KEY)
    }
}

/// File-backed store: one file per key inside a directory
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl SessionStore for FileSessionStore {
    fn read(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.tmp", key));
        // A leftover temp file would keep its old permissions
        match std::fs::remove_file(&tmp) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            // The token is a bearer credential: owner-only
            options.mode(0o600);
        }
        let mut file = options.open(&tmp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp, &path)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// In-memory store for `--ephemeral` runs and tests
#[derive(Default)]
pub struct MemorySessionStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn alice() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            email: None,
            is_staff: false,
        }
    }

    #[test]
    fn test_file_store_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(&dir.path().join("session"));
        assert!(store.load().is_none());

        store.save("T1", &alice()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.token, "T1");
        assert_eq!(loaded.user, alice());
        assert_eq!(store.token().as_deref(), Some("T1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path());
        // a stale temp file with loose permissions must not leak through
        let stale = dir.path().join(".token.tmp");
        std::fs::write(&stale, "old").unwrap();
        std::fs::set_permissions(&stale, std::fs::Permissions::from_mode(0o644)).unwrap();

        store.save("T1", &alice()).unwrap();
        for key in [TOKEN_KEY, USER_KEY] {
            let mode = std::fs::metadata(dir.path().join(key)).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "{} is readable by others", key);
        }
        assert_eq!(store.token().as_deref(), Some("T1"));
    }

    #[test]
    fn test_file_store_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.save("T1", &alice()).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
        assert!(!store.has_residue());
    }

    #[test]
    fn test_malformed_user_fails_closed() {
        let store = MemorySessionStore::new();
        store.write(TOKEN_KEY, "T1").unwrap();
        store.write(USER_KEY, "{not json").unwrap();
        assert!(store.load().is_none());
        assert!(store.has_residue());
    }

    #[test]
    fn test_token_without_user_fails_closed() {
        let store = MemorySessionStore::new();
        store.write(TOKEN_KEY, "T1").unwrap();
        assert!(store.load().is_none());
    }

    struct TokenWriteFails(MemorySessionStore);

    impl SessionStore for TokenWriteFails {
        fn read(&self, key: &str) -> Option<String> {
            self.0.read(key)
        }

        fn write(&self, key: &str, value: &str) -> io::Result<()> {
            if key == TOKEN_KEY {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            self.0.write(key, value)
        }

        fn remove(&self, key: &str) -> io::Result<()> {
            self.0.remove(key)
        }
    }

    #[test]
    fn test_failed_save_clears_partial_record() {
        let store = TokenWriteFails(MemorySessionStore::new());
        assert!(store.save("T1", &alice()).is_err());
        assert!(!store.has_residue());
        assert!(store.token().is_none());
    }

    #[test]
    fn test_empty_token_is_absent() {
        let store = MemorySessionStore::new();
        store.save("", &alice()).unwrap();
        assert!(store.token().is_none());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_user_json_shape() {
        let json = serde_json::to_value(alice()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 7, "username": "alice", "is_staff": false})
        );
    }
}

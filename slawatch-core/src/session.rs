//! Session store with durable key-value persistence
//!
//! Handles:
//! - Restoring the operator session at startup (corrupt data = logged out)
//! - Login/logout mirrored into durable storage under a single key
//! - Role checks for the presentation layer
//!
//! Storage backends: JSON file in the user config dir, OS keyring, memory.

use crate::error::SessionError;
use crate::models::{Role, Session};
use keyring::Entry;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key under which `{token, role, email}` is persisted.
pub const SESSION_KEY: &str = "sla_auth";

/// Durable client-side key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// JSON object on disk, one entry per key.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// `<config_dir>/slawatch/session.json`
    pub fn default_location() -> Result<Self, SessionError> {
        let mut path = dirs::config_dir().ok_or(SessionError::NoConfigDir)?;
        path.push("slawatch");
        path.push("session.json");
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>, SessionError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // write-then-rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(map)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        // a corrupt file is overwritten rather than blocking login
        let mut map = self.read_map().unwrap_or_default();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut map = self.read_map().unwrap_or_default();
        if map.remove(key).is_some() || self.path.exists() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// OS keyring (Secret Service, Keychain, Credential Manager).
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: &str) -> Self {
        Self { service: service.to_string() }
    }
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let entry = Entry::new(&self.service, key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        Entry::new(&self.service, key)?.set_password(value)?;
        // a fresh entry must see the write, otherwise the store is in-memory only
        match Entry::new(&self.service, key)?.get_password() {
            Ok(stored) if stored == value => Ok(()),
            Ok(_) | Err(keyring::Error::NoEntry) => Err(SessionError::NotPersisted(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let entry = Entry::new(&self.service, key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store. Clones share the same map, which lets tests
/// simulate a restart by loading a second `SessionStore` from a clone.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Authenticated identity shared by every component that calls the backend.
///
/// Built once at startup and passed around as `Arc<SessionStore>`.
pub struct SessionStore {
    session: RwLock<Session>,
    storage: Box<dyn KeyValueStore>,
}

impl SessionStore {
    /// Restore the persisted session. Missing or unreadable data yields an
    /// anonymous session; this never fails.
    pub fn load(storage: Box<dyn KeyValueStore>) -> Self {
        let session = match storage.get(SESSION_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => {
                    debug!("Restored session for {:?}", session.identity);
                    session
                }
                Err(e) => {
                    warn!("Discarding corrupt persisted session: {}", e);
                    Session::anonymous()
                }
            },
            Ok(None) => Session::anonymous(),
            Err(e) => {
                warn!("Could not read persisted session: {}", e);
                Session::anonymous()
            }
        };

        Self { session: RwLock::new(session), storage }
    }

    /// Replace the session in memory and in durable storage.
    ///
    /// The write lock is held across the durable write; if that write fails
    /// the previous session is put back before the error is returned.
    pub fn login(&self, token: &str, role: Role, identity: &str) -> Result<(), SessionError> {
        let next = Session {
            token: Some(token.to_string()),
            role: Some(role),
            identity: Some(identity.to_string()),
        };
        let encoded = serde_json::to_string(&next)?;

        let mut guard = self.session.write();
        let previous = std::mem::replace(&mut *guard, next);
        if let Err(e) = self.storage.set(SESSION_KEY, &encoded) {
            *guard = previous;
            warn!("Login not persisted, session unchanged: {}", e);
            return Err(e);
        }

        info!("Logged in as {} ({})", identity, role);
        Ok(())
    }

    /// Clear the session in memory and in durable storage.
    pub fn logout(&self) -> Result<(), SessionError> {
        let mut guard = self.session.write();
        let previous = std::mem::take(&mut *guard);
        if let Err(e) = self.storage.remove(SESSION_KEY) {
            *guard = previous;
            warn!("Logout not persisted, session unchanged: {}", e);
            return Err(e);
        }

        info!("Logged out");
        Ok(())
    }

    pub fn snapshot(&self) -> Session {
        self.session.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.session.read().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().token.is_some()
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        match self.session.read().role {
            Some(role) => roles.contains(&role),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, SessionError> {
            Err(SessionError::NoConfigDir)
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), SessionError> {
            Err(SessionError::NoConfigDir)
        }
        fn remove(&self, _key: &str) -> Result<(), SessionError> {
            Err(SessionError::NoConfigDir)
        }
    }

    #[test]
    fn test_round_trip_across_reload() {
        let storage = MemoryStore::new();
        let store = SessionStore::load(Box::new(storage.clone()));
        assert!(!store.is_authenticated());

        store.login("tok-1", Role::Operator, "ops@example.com").unwrap();

        let reloaded = SessionStore::load(Box::new(storage.clone()));
        assert_eq!(
            reloaded.snapshot(),
            Session {
                token: Some("tok-1".into()),
                role: Some(Role::Operator),
                identity: Some("ops@example.com".into()),
            }
        );

        reloaded.logout().unwrap();
        let after_logout = SessionStore::load(Box::new(storage));
        assert_eq!(after_logout.snapshot(), Session::anonymous());
    }

    #[test]
    fn test_corrupt_storage_resets() {
        let storage = MemoryStore::new();
        storage.put_raw(SESSION_KEY, "{not json");
        let store = SessionStore::load(Box::new(storage.clone()));
        assert_eq!(store.snapshot(), Session::anonymous());

        storage.put_raw(SESSION_KEY, r#"{"token":"x","role":"superuser"}"#);
        let store = SessionStore::load(Box::new(storage));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_unreadable_storage_is_anonymous() {
        let store = SessionStore::load(Box::new(FailingStore));
        assert_eq!(store.snapshot(), Session::anonymous());
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let store = SessionStore::load(Box::new(FailingStore));
        assert!(store.login("t", Role::Admin, "a@example.com").is_err());
        assert!(!store.is_authenticated());
        assert_eq!(store.snapshot(), Session::anonymous());
    }

    #[test]
    fn test_has_role() {
        let store = SessionStore::load(Box::new(MemoryStore::new()));
        assert!(!store.has_role(&[Role::Admin, Role::Operator, Role::Viewer]));

        store.login("t", Role::Viewer, "v@example.com").unwrap();
        assert!(store.has_role(&[Role::Viewer]));
        assert!(store.has_role(&[Role::Admin, Role::Viewer]));
        assert!(!store.has_role(&[Role::Admin, Role::Operator]));
        assert!(!store.has_role(&[]));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = SessionStore::load(Box::new(FileStore::new(&path)));
        store.login("tok", Role::Admin, "admin@example.com").unwrap();
        assert!(path.exists());

        let reloaded = SessionStore::load(Box::new(FileStore::new(&path)));
        assert_eq!(reloaded.token().as_deref(), Some("tok"));
        assert!(reloaded.has_role(&[Role::Admin]));

        reloaded.logout().unwrap();
        let cleared = SessionStore::load(Box::new(FileStore::new(&path)));
        assert_eq!(cleared.snapshot(), Session::anonymous());
    }

    #[test]
    fn test_keyring_without_backing_store_fails_login() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());

        let store = SessionStore::load(Box::new(KeyringStore::new("slawatch-test")));
        let err = store.login("tok-k", Role::Operator, "ops@example.com").unwrap_err();
        assert!(matches!(err, SessionError::NotPersisted(ref key) if key == SESSION_KEY));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "garbage").unwrap();

        let store = SessionStore::load(Box::new(FileStore::new(&path)));
        assert!(!store.is_authenticated());

        // login still succeeds and repairs the file
        store.login("tok", Role::Viewer, "v@example.com").unwrap();
        let reloaded = SessionStore::load(Box::new(FileStore::new(&path)));
        assert_eq!(reloaded.token().as_deref(), Some("tok"));
    }
}

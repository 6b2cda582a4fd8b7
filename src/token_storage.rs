use crate::errors::StorageError;
use crate::traits::TokenStore;
use keyring::Entry;
use secrecy::{ExposeSecret, SecretString};

use std::fs;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

const KEYRING_SERVICE: &str = "kbadmin";

/// Directory holding the token file and the saved session cookies
pub fn storage_dir() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("kbadmin");
    dir
}

/// Token slot backed by the OS keyring, with a file fallback
#[derive(Debug)]
pub struct TokenStorage {
    pub keyring_entry: Option<Entry>,
    pub token_file_path: PathBuf,
}

impl TokenStorage {
    pub fn new(token_key: &str, use_keyring: bool) -> Result<Self, StorageError> {
        let keyring_entry = if use_keyring {
            match Entry::new(KEYRING_SERVICE, token_key) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(
                        "Keyring is not available on this system ({}), will use file-based storage.",
                        e
                    );
                    None
                }
            }
        } else {
            None
        };

        let token_file_path = storage_dir().join(format!("{}.token", token_key));
        Self::with_file(keyring_entry, token_file_path)
    }

    /// File-only storage at an explicit path
    pub fn file_only(token_file_path: PathBuf) -> Result<Self, StorageError> {
        Self::with_file(None, token_file_path)
    }

    fn with_file(
        keyring_entry: Option<Entry>,
        token_file_path: PathBuf,
    ) -> Result<Self, StorageError> {
        if let Some(parent) = token_file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        Ok(TokenStorage {
            keyring_entry,
            token_file_path,
        })
    }

    fn save_to_file(&self, token: &SecretString) -> Result<(), StorageError> {
        fs::write(&self.token_file_path, token.expose_secret())?;
        tracing::debug!("Token saved to file: {:?}", self.token_file_path);
        Ok(())
    }

    fn remove_file(&self) -> Result<(), StorageError> {
        if self.token_file_path.exists() {
            fs::remove_file(&self.token_file_path)?;
            tracing::debug!("Token file deleted: {:?}", self.token_file_path);
        }
        Ok(())
    }

    fn load_from_keyring(&self, entry: &Entry) -> Result<Option<SecretString>, StorageError> {
        match entry.get_password() {
            Ok(token) if !token.trim().is_empty() => Ok(Some(SecretString::new(token))),
            Ok(_) => Ok(None),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn load_from_file(&self) -> Result<Option<SecretString>, StorageError> {
        if !self.token_file_path.exists() {
            return Ok(None);
        }

        let token = fs::read_to_string(&self.token_file_path)?;
        if token.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(SecretString::new(token.trim().to_string())))
    }
}

impl TokenStore for TokenStorage {
    fn save(&self, token: &SecretString) -> Result<(), StorageError> {
        if let Some(ref entry) = self.keyring_entry {
            match entry.set_password(token.expose_secret()) {
                Ok(()) => {
                    tracing::debug!("Token saved to keyring");
                    // a token left by an earlier fallback must not outlive this one
                    if let Err(e) = self.remove_file() {
                        tracing::warn!("Failed to remove old token file: {}", e);
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to save token to keyring: {:?}. Trying fallback storage.",
                        e
                    );
                    // load reads the keyring first, so an older entry would shadow the file
                    match entry.delete_password() {
                        Ok(()) | Err(keyring::Error::NoEntry) => {}
                        Err(e) => tracing::warn!("Failed to delete stale keyring token: {:?}", e),
                    }
                }
            }
        }

        self.save_to_file(token)
    }

    fn load(&self) -> Result<Option<SecretString>, StorageError> {
        if let Some(ref entry) = self.keyring_entry {
            match self.load_from_keyring(entry) {
                Ok(Some(token)) => return Ok(Some(token)),
                Ok(None) => tracing::debug!("No token found in keyring, checking file storage"),
                Err(e) => tracing::warn!(
                    "Failed to load token from keyring: {:?}. Checking file storage.",
                    e
                ),
            }
        }

        self.load_from_file()
    }

    fn clear(&self) -> Result<(), StorageError> {
        if let Some(ref entry) = self.keyring_entry {
            match entry.delete_password() {
                Ok(()) => tracing::debug!("Token deleted from keyring"),
                Err(keyring::Error::NoEntry) => {}
                Err(e) => tracing::warn!("Failed to delete token from keyring: {:?}", e),
            }
        }

        self.remove_file()
    }
}

/// In-process token slot
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: RwLock<Option<SecretString>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<SecretString>, StorageError> {
        Ok(self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, token: &SecretString) -> Result<(), StorageError> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::file_only(dir.path().join("kb").join("csrf.token")).unwrap();

        assert!(storage.load().unwrap().is_none());

        storage.save(&SecretString::new("abc".to_string())).unwrap();
        assert_eq!(storage.load().unwrap().unwrap().expose_secret(), "abc");

        storage.save(&SecretString::new("def".to_string())).unwrap();
        assert_eq!(storage.load().unwrap().unwrap().expose_secret(), "def");

        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_none());
        assert!(!storage.token_file_path.exists());
    }

    #[test]
    fn test_clear_without_token_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::file_only(dir.path().join("csrf.token")).unwrap();
        assert!(storage.clear().is_ok());
    }

    #[test]
    fn test_blank_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csrf.token");
        fs::write(&path, "  \n").unwrap();
        let storage = TokenStorage::file_only(path).unwrap();
        assert!(storage.load().unwrap().is_none());
    }

    fn mock_keyring_storage(dir: &std::path::Path, user: &str) -> TokenStorage {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        let entry = Entry::new(KEYRING_SERVICE, user).unwrap();
        TokenStorage::with_file(Some(entry), dir.join(format!("{}.token", user))).unwrap()
    }

    fn mock_credential(storage: &TokenStorage) -> &keyring::mock::MockCredential {
        storage
            .keyring_entry
            .as_ref()
            .unwrap()
            .get_credential()
            .downcast_ref()
            .unwrap()
    }

    #[test]
    fn test_keyring_failure_does_not_leave_stale_token() {
        let dir = tempfile::tempdir().unwrap();
        let storage = mock_keyring_storage(dir.path(), "stale_keyring");

        storage.save(&SecretString::new("old".to_string())).unwrap();
        assert!(!storage.token_file_path.exists());

        mock_credential(&storage).set_error(keyring::Error::Invalid(
            "password".to_string(),
            "rejected".to_string(),
        ));
        storage.save(&SecretString::new("new".to_string())).unwrap();

        assert!(storage.token_file_path.exists());
        assert_eq!(storage.load().unwrap().unwrap().expose_secret(), "new");
    }

    #[test]
    fn test_keyring_save_removes_fallback_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = mock_keyring_storage(dir.path(), "leftover_file");
        fs::write(&storage.token_file_path, "from-fallback").unwrap();

        storage.save(&SecretString::new("fresh".to_string())).unwrap();

        assert!(!storage.token_file_path.exists());
        assert_eq!(storage.load().unwrap().unwrap().expose_secret(), "fresh");

        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert!(store.load().unwrap().is_none());
        store.save(&SecretString::new("t1".to_string())).unwrap();
        assert_eq!(store.load().unwrap().unwrap().expose_secret(), "t1");
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}

use crate::errors::{AuthError, StorageError};
use crate::models::{Credentials, Profile, TokenGrant};
use secrecy::SecretString;
use std::future::Future;

/// Authentication endpoints of the backend, abstracted so the session can be tested
pub trait AuthBackend: Send + Sync + 'static {
    /// Fetch the current profile; `Ok` means the backend accepts the session.
    ///
    /// `Ok(None)` is a success answer whose body did not describe a profile.
    fn fetch_profile(&self) -> impl Future<Output = Result<Option<Profile>, AuthError>> + Send;

    /// Exchange credentials for a fresh token
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<TokenGrant, AuthError>> + Send;

    /// Rotate the token
    fn refresh(&self) -> impl Future<Output = Result<TokenGrant, AuthError>> + Send;

    /// Tell the backend the session is over
    fn logout_remote(&self) -> impl Future<Output = Result<(), AuthError>> + Send;
}

/// Persistent key-value slot holding the security token
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<SecretString>, StorageError>;
    fn save(&self, token: &SecretString) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// Trait for configuration loading, allowing for testable configuration
pub trait ConfigProvider: Send + Sync {
    fn load_config(&self) -> Result<crate::Config, crate::errors::ConfigError>;
}

/// Loads from the default location, or from an explicit path when given
pub struct DefaultConfigProvider {
    pub path: Option<std::path::PathBuf>,
}

impl ConfigProvider for DefaultConfigProvider {
    fn load_config(&self) -> Result<crate::Config, crate::errors::ConfigError> {
        match &self.path {
            Some(path) => crate::config::load_config_from(path),
            None => crate::config::load_config(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::sync::Mutex;

    #[test]
    fn test_mock_token_store() {
        struct MockStore {
            slot: Mutex<Option<String>>,
        }

        impl TokenStore for MockStore {
            fn load(&self) -> Result<Option<SecretString>, StorageError> {
                Ok(self.slot.lock().unwrap().clone().map(SecretString::new))
            }

            fn save(&self, token: &SecretString) -> Result<(), StorageError> {
                *self.slot.lock().unwrap() = Some(token.expose_secret().clone());
                Ok(())
            }

            fn clear(&self) -> Result<(), StorageError> {
                *self.slot.lock().unwrap() = None;
                Ok(())
            }
        }

        let store: Box<dyn TokenStore> = Box::new(MockStore {
            slot: Mutex::new(None),
        });
        store.save(&SecretString::new("abc".to_string())).unwrap();
        assert_eq!(store.load().unwrap().unwrap().expose_secret(), "abc");
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_default_config_provider_with_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DefaultConfigProvider {
            path: Some(dir.path().join("missing.toml")),
        };
        let config = provider.load_config().unwrap();
        assert_eq!(config.session.refresh_interval_sec, 1500);
    }
}

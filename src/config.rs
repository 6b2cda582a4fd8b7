use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Paths of the authentication endpoints, relative to the base URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_profile_path")]
    pub profile: String,

    #[serde(default = "default_login_path")]
    pub login: String,

    #[serde(default = "default_refresh_path")]
    pub refresh: String,

    #[serde(default = "default_logout_path")]
    pub logout: String,
}

fn default_profile_path() -> String {
    "/api/auth/profile".to_string()
}

fn default_login_path() -> String {
    "/api/auth/login".to_string()
}

fn default_refresh_path() -> String {
    "/api/auth/refresh".to_string()
}

fn default_logout_path() -> String {
    "/api/auth/logout".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_path(),
            login: default_login_path(),
            refresh: default_refresh_path(),
            logout: default_logout_path(),
        }
    }
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the REST backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout (seconds)
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,

    /// Header that carries the security token, both in responses and on mutating requests
    #[serde(default = "default_token_header")]
    pub token_header: String,

    /// Dotted path of the token inside a JSON response body (e.g. "data.csrfToken")
    #[serde(default = "default_token_body_field")]
    pub token_body_field: String,

    #[serde(default)]
    pub endpoints: EndpointConfig,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_sec() -> u64 {
    30
}

fn default_token_header() -> String {
    "X-CSRF-Token".to_string()
}

fn default_token_body_field() -> String {
    "csrfToken".to_string()
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_sec: default_timeout_sec(),
            token_header: default_token_header(),
            token_body_field: default_token_body_field(),
            endpoints: EndpointConfig::default(),
        }
    }
}

/// Session lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Background refresh interval (seconds, default 25 minutes)
    #[serde(default = "default_refresh_interval_sec")]
    pub refresh_interval_sec: u64,

    /// Fixed key of the token slot
    #[serde(default = "default_token_key")]
    pub token_key: String,

    /// Store the token in the OS keyring when available
    #[serde(default = "default_use_keyring")]
    pub use_keyring: bool,

    /// Keep session cookies in a file next to the token so separate runs share one server session
    #[serde(default = "default_persist_cookies")]
    pub persist_cookies: bool,
}

fn default_refresh_interval_sec() -> u64 {
    1500
}

fn default_token_key() -> String {
    "csrf_token".to_string()
}

fn default_use_keyring() -> bool {
    true
}

fn default_persist_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_sec: default_refresh_interval_sec(),
            token_key: default_token_key(),
            use_keyring: default_use_keyring(),
            persist_cookies: default_persist_cookies(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path; stderr when unset
    #[serde(default)]
    pub file_path: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.session.refresh_interval_sec)
    }

    pub fn log_level(&self) -> &str {
        &self.logging.level
    }

    pub fn log_file_path(&self) -> &Option<String> {
        &self.logging.file_path
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.backend.base_url).map_err(|e| ConfigError::ValidationError {
            reason: format!("invalid backend.base_url {:?}: {}", self.backend.base_url, e),
        })?;

        if self.backend.timeout_sec == 0 {
            return Err(ConfigError::ValidationError {
                reason: "backend.timeout_sec must be greater than 0".to_string(),
            });
        }

        if self.session.refresh_interval_sec == 0 {
            return Err(ConfigError::ValidationError {
                reason: "session.refresh_interval_sec must be greater than 0".to_string(),
            });
        }

        if self.session.token_key.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                reason: "session.token_key must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

/// Default config file path
pub fn config_file_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("kbadmin");
    path.push("config.toml");
    path
}

/// Load the config from the default location; defaults when the file is missing
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_file_path())
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config = if path.exists() {
        let contents =
            fs::read_to_string(path).map_err(|source| ConfigError::LoadError { source })?;
        toml::from_str(&contents)?
    } else {
        tracing::debug!("No config file at {:?}, using defaults", path);
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent_dir) = path.parent()
        && !parent_dir.as_os_str().is_empty()
    {
        fs::create_dir_all(parent_dir).map_err(|source| ConfigError::WriteError { source })?;
    }

    let contents = toml::to_string_pretty(config)?;
    fs::write(path, contents).map_err(|source| ConfigError::WriteError { source })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.backend.base_url, "http://localhost:8080");
        assert_eq!(config.backend.token_header, "X-CSRF-Token");
        assert_eq!(config.backend.token_body_field, "csrfToken");
        assert_eq!(config.refresh_interval(), Duration::from_millis(1_500_000));
        assert_eq!(config.backend.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.session.token_key, "csrf_token");
        assert!(config.session.use_keyring);
        assert!(config.session.persist_cookies);
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.log_file_path(), &None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let toml_str = r#"
            [backend]
            base_url = "https://kb.example.com"
            [backend.endpoints]
            refresh = "/api/token/refresh"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.base_url, "https://kb.example.com");
        assert_eq!(config.backend.endpoints.refresh, "/api/token/refresh");
        assert_eq!(config.backend.endpoints.login, "/api/auth/login");
        assert_eq!(config.session.refresh_interval_sec, 1500);
    }

    #[test]
    fn test_log_level_custom() {
        let toml_str = r#"
            [logging]
            level = "debug"
            file_path = "/tmp/kbadmin.log"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_file_path().as_deref(), Some("/tmp/kbadmin.log"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.backend.base_url = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));

        let mut config = Config::default();
        config.session.refresh_interval_sec = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.backend.timeout_sec = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.session.refresh_interval_sec = 600;
        config.backend.token_header = "X-XSRF-TOKEN".to_string();
        save_config_to(&config, &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[session]"));
        assert!(contents.contains("refresh_interval_sec = 600"));

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.session.refresh_interval_sec, 600);
        assert_eq!(loaded.backend.token_header, "X-XSRF-TOKEN");
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[session]\nrefresh_interval_sec = 0\n").unwrap();
        assert!(load_config_from(&path).is_err());

        fs::write(&path, "[session\n").unwrap();
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }
}

use thiserror::Error;

/// Top-level error for the binary
#[derive(Error, Debug)]
pub enum AppError {
    /// Authentication / transport error
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Token storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{message}")]
    Generic { message: String },
}

/// Errors raised by calls to the backend
#[derive(Error, Debug)]
pub enum AuthError {
    /// HTTP request failed (connect error, timeout, body read)
    #[error("Request error: {source}")]
    RequestError {
        #[source]
        source: reqwest::Error,
    },

    /// Backend answered with a non-success status
    #[error("Backend returned {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// Response body could not be parsed
    #[error("JSON parsing error: {source}")]
    JsonError {
        #[source]
        source: serde_json::Error,
    },

    /// Invalid request URL
    #[error("Invalid URL: {source}")]
    UrlError {
        #[source]
        source: url::ParseError,
    },

    #[error("Token storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// True for 401/403 answers from the backend
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::HttpStatus { status: 401 | 403, .. })
    }
}

/// Errors raised by the persistent token slot
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Keyring error: {source}")]
    KeyringError {
        #[source]
        source: keyring::Error,
    },

    #[error("Token file error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {source}")]
    LoadError {
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {source}")]
    ParseError {
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {source}")]
    SerializeError {
        #[source]
        source: toml::ser::Error,
    },

    #[error("Failed to write config file: {source}")]
    WriteError {
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration validation failed: {reason}")]
    ValidationError { reason: String },
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        AuthError::RequestError { source: error }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        AuthError::JsonError { source: error }
    }
}

impl From<url::ParseError> for AuthError {
    fn from(error: url::ParseError) -> Self {
        AuthError::UrlError { source: error }
    }
}

impl From<keyring::Error> for StorageError {
    fn from(error: keyring::Error) -> Self {
        StorageError::KeyringError { source: error }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        StorageError::Io { source: error }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::ParseError { source: error }
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(error: toml::ser::Error) -> Self {
        ConfigError::SerializeError { source: error }
    }
}

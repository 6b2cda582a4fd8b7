pub mod cli;
pub mod client;
pub mod config;
pub mod cookie_jar;
pub mod errors;
pub mod guard;
pub mod logger;
pub mod models;
pub mod session;
pub mod token_storage;
pub mod traits;

pub use client::BackendClient;
pub use config::Config;
pub use errors::{AppError, AuthError, ConfigError, StorageError};
pub use models::{Credentials, Profile, RefreshOutcome, TokenGrant};
pub use session::{SessionAuthenticator, SessionState};
pub use token_storage::{MemoryTokenStore, TokenStorage};
pub use traits::{AuthBackend, TokenStore};

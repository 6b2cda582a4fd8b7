use crate::models::Profile;
use chrono::{DateTime, Utc};

/// Observable snapshot of the session, published to subscribers on every change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub is_authenticated: bool,
    /// True from construction until the first login check resolves.
    /// Logout leaves it false; `has_completed_initial_check` gates later checks.
    pub is_bootstrapping: bool,
    /// Set once the first check has resolved; only logout resets it
    pub has_completed_initial_check: bool,
    pub has_security_token: bool,
    pub profile: Option<Profile>,
    /// When the current token was stored (login or refresh)
    pub token_issued_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Shape after logout: everything back to defaults
    pub(crate) fn reset(&mut self) {
        *self = SessionState::default();
    }
}

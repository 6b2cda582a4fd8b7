//! Client-side session lifecycle
//!
//! [`SessionAuthenticator`] is the only writer of [`SessionState`]. Route guards
//! and other readers subscribe to it; the HTTP transport shares its token slot.

mod check;
mod logout;
mod refresh;
mod state;
mod timer;


pub use state::SessionState;
pub use timer::RefreshTimer;

use crate::errors::StorageError;
use crate::models::Credentials;
use crate::traits::{AuthBackend, TokenStore};
use secrecy::SecretString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

/// Default background refresh interval (25 minutes)
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(1_500_000);

/// Cheaply cloneable handle to one session
pub struct SessionAuthenticator<B: AuthBackend> {
    inner: Arc<Inner<B>>,
}

impl<B: AuthBackend> Clone for SessionAuthenticator<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<B> {
    backend: B,
    token_store: Arc<dyn TokenStore>,
    state: watch::Sender<SessionState>,
    refresh_in_flight: AtomicBool,
    check_in_flight: AtomicBool,
    timer: Mutex<RefreshTimer>,
    refresh_interval: Duration,
    /// Bumped by logout; work started under an older value must not commit
    epoch: Mutex<u64>,
}

/// Holds an in-flight flag for the lifetime of the guard
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    /// None when the flag was already set
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(InFlight(flag))
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<B: AuthBackend> SessionAuthenticator<B> {
    pub fn new(backend: B, token_store: Arc<dyn TokenStore>, refresh_interval: Duration) -> Self {
        let has_security_token = match token_store.load() {
            Ok(token) => token.is_some(),
            Err(e) => {
                tracing::warn!("Could not read stored security token: {}", e);
                false
            }
        };

        let (state, _) = watch::channel(SessionState {
            is_bootstrapping: true,
            has_security_token,
            ..SessionState::default()
        });

        SessionAuthenticator {
            inner: Arc::new(Inner {
                backend,
                token_store,
                state,
                refresh_in_flight: AtomicBool::new(false),
                check_in_flight: AtomicBool::new(false),
                timer: Mutex::new(RefreshTimer::new()),
                refresh_interval,
                epoch: Mutex::new(0),
            }),
        }
    }

    /// Current snapshot
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that is notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated
    }

    pub fn security_token(&self) -> Option<SecretString> {
        self.inner.token_store.load().ok().flatten()
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn refresh_interval(&self) -> Duration {
        self.inner.refresh_interval
    }

    /// Whether a background refresh is pending
    pub fn is_refresh_scheduled(&self) -> bool {
        self.timer().is_armed()
    }

    /// Log in with credentials. Returns false (and leaves state untouched) on failure.
    ///
    /// A logout that lands while the login is on the network wins: the result is
    /// dropped and false is returned.
    pub async fn login(&self, credentials: &Credentials) -> bool {
        let epoch = self.epoch();

        let grant = match self.inner.backend.login(credentials).await {
            Ok(grant) => grant,
            Err(e) => {
                tracing::warn!("Login failed for {}: {}", credentials.username, e);
                return false;
            }
        };

        let stored = self.commit_if_current(epoch, || match grant.preferred() {
            Some(token) => self.store_token(&token),
            None => {
                tracing::warn!("Login response carried no security token");
                Ok(())
            }
        });
        match stored {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                tracing::error!("Login succeeded but the token could not be stored: {}", e);
                return false;
            }
            None => {
                tracing::info!("Logged out while logging in, discarding login");
                return false;
            }
        }

        let profile = match self.inner.backend.fetch_profile().await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("Logged in but profile fetch failed: {}", e);
                None
            }
        };

        let committed = self.commit_if_current(epoch, || {
            self.inner.state.send_modify(|s| {
                s.is_authenticated = true;
                s.is_bootstrapping = false;
                s.has_completed_initial_check = true;
                s.profile = profile;
            });
            self.schedule_periodic_refresh();
        });
        if committed.is_none() {
            tracing::info!("Logged out while logging in, discarding login");
            return false;
        }

        tracing::info!("Logged in as {}", credentials.username);
        true
    }

    fn store_token(&self, token: &SecretString) -> Result<(), StorageError> {
        self.inner.token_store.save(token)?;
        self.inner.state.send_modify(|s| {
            s.has_security_token = true;
            s.token_issued_at = Some(chrono::Utc::now());
        });
        Ok(())
    }

    fn epoch(&self) -> u64 {
        *self.lifecycle()
    }

    /// Runs `commit` only when no logout happened since `epoch` was read.
    ///
    /// Logout holds the same lock while it cleans up, so a commit either lands
    /// before the cleanup or not at all.
    fn commit_if_current<T>(&self, epoch: u64, commit: impl FnOnce() -> T) -> Option<T> {
        let current = self.lifecycle();
        if *current != epoch {
            return None;
        }
        Some(commit())
    }

    fn lifecycle(&self) -> MutexGuard<'_, u64> {
        self.inner
            .epoch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn timer(&self) -> MutexGuard<'_, RefreshTimer> {
        self.inner
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

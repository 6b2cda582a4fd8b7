use super::{InFlight, SessionAuthenticator};
use crate::models::{Profile, RefreshOutcome};
use crate::traits::AuthBackend;

impl<B: AuthBackend> SessionAuthenticator<B> {
    /// Runs the initial session check once per login lifecycle.
    ///
    /// No-op after the first check has completed, and while another check is
    /// still waiting on the network. A failed profile fetch gets one refresh and
    /// one retry. If a logout lands meanwhile, the result is dropped.
    pub async fn check_login_status(&self) {
        let completed = self.inner.state.borrow().has_completed_initial_check;
        if completed {
            tracing::debug!("Initial login check already completed, skipping");
            return;
        }

        let Some(_guard) = InFlight::acquire(&self.inner.check_in_flight) else {
            tracing::debug!("Login check already in progress, ignoring re-entrant call");
            return;
        };

        let epoch = self.epoch();
        self.inner.state.send_modify(|s| s.is_bootstrapping = true);

        let verified = self.verify_session(epoch).await;
        let authenticated = verified.is_some();

        let committed = self.commit_if_current(epoch, || {
            self.inner.state.send_modify(|s| {
                s.is_authenticated = authenticated;
                if let Some(profile) = verified {
                    s.profile = profile;
                }
                s.is_bootstrapping = false;
                s.has_completed_initial_check = true;
            });
            if authenticated {
                self.schedule_periodic_refresh();
            }
        });

        match committed {
            None => tracing::debug!("Logged out during the login check, discarding result"),
            Some(()) if authenticated => tracing::info!("Session is valid"),
            Some(()) => tracing::info!("No valid session, login required"),
        }
    }

    /// Some(profile) when the backend accepts the session
    async fn verify_session(&self, epoch: u64) -> Option<Option<Profile>> {
        let err = match self.inner.backend.fetch_profile().await {
            Ok(profile) => return Some(profile),
            Err(e) => e,
        };

        if err.is_unauthorized() {
            tracing::info!("Session rejected ({}), attempting token refresh", err);
        } else {
            tracing::warn!("Profile fetch failed ({}), attempting token refresh", err);
        }

        match self.refresh_in_epoch(epoch).await {
            Ok(RefreshOutcome::Discarded) => None,
            Ok(outcome) => {
                tracing::debug!("Refresh before retry: {:?}", outcome);
                match self.inner.backend.fetch_profile().await {
                    Ok(profile) => Some(profile),
                    Err(e) => {
                        tracing::warn!("Profile fetch failed after refresh: {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Token refresh failed during login check: {}", e);
                None
            }
        }
    }
}

use super::{InFlight, SessionAuthenticator};
use crate::errors::AuthError;
use crate::models::RefreshOutcome;
use crate::traits::AuthBackend;
use std::sync::Arc;
use std::time::Duration;

impl<B: AuthBackend> SessionAuthenticator<B> {
    /// Rotate the security token now.
    ///
    /// Calls made while a refresh is already in flight return `Skipped` without
    /// touching the network. A response without a token keeps the current one.
    /// A response that lands after a logout is dropped and reported as `Discarded`.
    pub async fn refresh_now(&self) -> Result<RefreshOutcome, AuthError> {
        let epoch = self.epoch();
        self.refresh_in_epoch(epoch).await
    }

    pub(super) async fn refresh_in_epoch(&self, epoch: u64) -> Result<RefreshOutcome, AuthError> {
        let Some(_guard) = InFlight::acquire(&self.inner.refresh_in_flight) else {
            tracing::debug!("Token refresh already in flight, skipping");
            return Ok(RefreshOutcome::Skipped);
        };

        let token = self.inner.backend.refresh().await?.preferred();
        let committed = self.commit_if_current(epoch, || match &token {
            Some(token) => self.store_token(token).map(|()| RefreshOutcome::Rotated),
            None => Ok(RefreshOutcome::Unchanged),
        });

        match committed {
            Some(Ok(RefreshOutcome::Rotated)) => tracing::debug!("Security token rotated"),
            Some(Ok(_)) => {
                tracing::debug!("Refresh response carried no token, keeping the current one")
            }
            Some(Err(_)) => {}
            None => tracing::debug!("Session ended while refreshing, discarding response"),
        }

        Ok(committed.transpose()?.unwrap_or(RefreshOutcome::Discarded))
    }

    /// Re-arm the background refresh with the configured interval
    pub fn schedule_periodic_refresh(&self) {
        self.schedule_periodic_refresh_every(self.inner.refresh_interval);
    }

    /// Cancel any pending refresh and arm a new chain: wait `interval`, refresh, repeat.
    ///
    /// The next wait only starts once the previous refresh has finished.
    /// Failures are logged; they never mark the session unauthenticated.
    pub fn schedule_periodic_refresh_every(&self, interval: Duration) {
        let weak = Arc::downgrade(&self.inner);

        self.timer().arm(async move {
            loop {
                tokio::time::sleep(interval).await;

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let session = SessionAuthenticator { inner };

                match session.refresh_now().await {
                    Ok(outcome) => tracing::debug!("Scheduled token refresh: {:?}", outcome),
                    Err(e) => tracing::warn!("Scheduled token refresh failed: {}", e),
                }
            }
        });

        tracing::debug!("Next token refresh in {:?}", interval);
    }
}

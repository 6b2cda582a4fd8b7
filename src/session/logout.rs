use super::{SessionAuthenticator, SessionState};
use crate::traits::AuthBackend;

impl<B: AuthBackend> SessionAuthenticator<B> {
    /// End the session.
    ///
    /// The remote call is best effort. Local cleanup always runs, so the next
    /// `check_login_status` performs a full check again. A refresh, check or
    /// login still on the network when logout starts is discarded when it lands.
    pub async fn logout(&self) {
        *self.lifecycle() += 1;

        if let Err(e) = self.inner.backend.logout_remote().await {
            tracing::warn!("Remote logout failed, clearing local session anyway: {}", e);
        }

        let mut epoch = self.lifecycle();
        self.timer().cancel();
        if let Err(e) = self.inner.token_store.clear() {
            tracing::warn!("Failed to clear stored security token: {}", e);
        }
        self.inner.state.send_modify(SessionState::reset);
        *epoch += 1;
        drop(epoch);

        tracing::info!("Logged out");
    }
}

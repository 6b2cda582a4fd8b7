//! Route guard decisions
//!
//! Pure functions over a [`SessionState`] plus an async helper that waits for the
//! first login check to settle before deciding.

use crate::session::{SessionAuthenticator, SessionState};
use crate::traits::AuthBackend;
use std::fmt::Display;
use tokio::sync::watch;

/// Admin console routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppRoute {
    #[default]
    Login,
    Dashboard,
    Categories,
    Files,
    Departments,
    Users,
    Settings,
    NotFound,
}

impl AppRoute {
    pub fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "" | "/login" => Self::Login,
            "/dashboard" => Self::Dashboard,
            "/categories" => Self::Categories,
            "/files" => Self::Files,
            "/departments" => Self::Departments,
            "/users" => Self::Users,
            "/settings" => Self::Settings,
            _ => Self::NotFound,
        }
    }

    pub fn to_path(&self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Dashboard => "/dashboard",
            Self::Categories => "/categories",
            Self::Files => "/files",
            Self::Departments => "/departments",
            Self::Users => "/users",
            Self::Settings => "/settings",
            Self::NotFound => "/404",
        }
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, Self::Login | Self::NotFound)
    }

    /// Signed-in users are sent away from these routes
    pub fn should_redirect_when_authenticated(&self) -> bool {
        matches!(self, Self::Login)
    }
}

impl Display for AppRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_path())
    }
}

/// What a guard should do with a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// First check not resolved yet; show a loading state
    Pending,
    Allow,
    Redirect(AppRoute),
}

pub fn evaluate(route: AppRoute, state: &SessionState) -> Access {
    if route == AppRoute::NotFound {
        return Access::Allow;
    }

    if state.is_bootstrapping || !state.has_completed_initial_check {
        return Access::Pending;
    }

    if route.requires_auth() && !state.is_authenticated {
        Access::Redirect(AppRoute::Login)
    } else if route.should_redirect_when_authenticated() && state.is_authenticated {
        Access::Redirect(AppRoute::Dashboard)
    } else {
        Access::Allow
    }
}

/// Wait until the decision for `route` is no longer pending
pub async fn resolve(route: AppRoute, rx: &mut watch::Receiver<SessionState>) -> Access {
    loop {
        let access = evaluate(route, &rx.borrow_and_update());
        if access != Access::Pending {
            return access;
        }

        if rx.changed().await.is_err() {
            // session gone; treat as signed out
            return Access::Redirect(AppRoute::Login);
        }
    }
}

/// Guard entry point: run the login check (no-op after the first) and decide
pub async fn enter<B: AuthBackend>(session: &SessionAuthenticator<B>, route: AppRoute) -> Access {
    let mut rx = session.subscribe();
    session.check_login_status().await;
    resolve(route, &mut rx).await
}

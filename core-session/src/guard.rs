//! Navigation guard backed by the session store.

use crate::store::SessionStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Access requirements attached to a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMeta {
    pub requires_auth: bool,
    /// Only reachable while signed out, e.g. the login page.
    pub requires_guest: bool,
}

impl RouteMeta {
    pub const OPEN: RouteMeta = RouteMeta {
        requires_auth: false,
        requires_guest: false,
    };
    pub const AUTH: RouteMeta = RouteMeta {
        requires_auth: true,
        requires_guest: false,
    };
    pub const GUEST: RouteMeta = RouteMeta {
        requires_auth: false,
        requires_guest: true,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(String),
}

/// Decide whether a navigation may proceed.
///
/// ```
/// use core_session::{decide, GuardDecision, RouteMeta};
///
/// assert_eq!(
///     decide(&RouteMeta::AUTH, false, "/login", "/"),
///     GuardDecision::Redirect("/login".to_string())
/// );
/// assert_eq!(
///     decide(&RouteMeta::GUEST, true, "/login", "/"),
///     GuardDecision::Redirect("/".to_string())
/// );
/// assert_eq!(decide(&RouteMeta::OPEN, false, "/login", "/"), GuardDecision::Proceed);
/// ```
pub fn decide(
    meta: &RouteMeta,
    authenticated: bool,
    login_path: &str,
    home_path: &str,
) -> GuardDecision {
    if meta.requires_auth && !authenticated {
        GuardDecision::Redirect(login_path.to_string())
    } else if meta.requires_guest && authenticated {
        GuardDecision::Redirect(home_path.to_string())
    } else {
        GuardDecision::Proceed
    }
}

pub struct RouteGuard {
    session: Arc<SessionStore>,
    login_path: String,
    home_path: String,
}

impl RouteGuard {
    pub fn new(
        session: Arc<SessionStore>,
        login_path: impl Into<String>,
        home_path: impl Into<String>,
    ) -> Self {
        Self {
            session,
            login_path: login_path.into(),
            home_path: home_path.into(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    /// Wait for the first session initialization, then decide.
    pub async fn check(&self, meta: &RouteMeta) -> GuardDecision {
        self.session.ensure_initialized().await;

        let decision = decide(
            meta,
            self.session.is_authenticated(),
            &self.login_path,
            &self.home_path,
        );
        debug!(?meta, ?decision, "Route guard evaluated");
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_route_without_user_goes_to_login() {
        assert_eq!(
            decide(&RouteMeta::AUTH, false, "/login", "/"),
            GuardDecision::Redirect("/login".into())
        );
        assert_eq!(decide(&RouteMeta::AUTH, true, "/login", "/"), GuardDecision::Proceed);
    }

    #[test]
    fn guest_route_with_user_goes_home() {
        assert_eq!(
            decide(&RouteMeta::GUEST, true, "/login", "/"),
            GuardDecision::Redirect("/".into())
        );
        assert_eq!(decide(&RouteMeta::GUEST, false, "/login", "/"), GuardDecision::Proceed);
    }

    #[test]
    fn auth_check_wins_over_guest_check() {
        let both = RouteMeta {
            requires_auth: true,
            requires_guest: true,
        };
        assert_eq!(
            decide(&both, false, "/login", "/"),
            GuardDecision::Redirect("/login".into())
        );
        assert_eq!(
            decide(&both, true, "/login", "/"),
            GuardDecision::Redirect("/".into())
        );
    }

    #[test]
    fn default_meta_is_open() {
        assert_eq!(RouteMeta::default(), RouteMeta::OPEN);
    }
}

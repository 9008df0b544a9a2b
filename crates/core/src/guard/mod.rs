//! Route guard decisions.
//!
//! [`guard`] is a pure function of the access policy and the resolved
//! session state. Performing the redirect is left to whatever adapter
//! drives navigation.

use serde::{Deserialize, Serialize};

use crate::session::SessionStateKind;

/// Access policy a view declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessPolicy {
    /// Public-only views such as login and registration.
    RedirectIfAuthenticated,
    /// Views that need a confirmed session.
    RequireAuthenticated,
}

/// Redirect targets known to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
    Login,
    ConfirmEmail,
    Dashboard,
}

/// Paths for each [`Route`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardRoutes {
    pub login: String,
    pub confirm_email: String,
    pub dashboard: String,
}

impl Default for GuardRoutes {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            confirm_email: "/auth/confirm-email".to_string(),
            dashboard: "/dashboard".to_string(),
        }
    }
}

impl GuardRoutes {
    pub fn path(&self, route: Route) -> &str {
        match route {
            Route::Login => &self.login,
            Route::ConfirmEmail => &self.confirm_email,
            Route::Dashboard => &self.dashboard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "route", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardDecision {
    Allow,
    RedirectTo(Route),
}

impl GuardDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

pub fn guard(policy: AccessPolicy, state: SessionStateKind) -> GuardDecision {
    use AccessPolicy::*;
    use SessionStateKind::*;

    match (policy, state) {
        (_, PendingConfirmation) => GuardDecision::RedirectTo(Route::ConfirmEmail),
        (RedirectIfAuthenticated, Anonymous) => GuardDecision::Allow,
        (RedirectIfAuthenticated, Active) => GuardDecision::RedirectTo(Route::Dashboard),
        (RequireAuthenticated, Anonymous) => GuardDecision::RedirectTo(Route::Login),
        (RequireAuthenticated, Active) => GuardDecision::Allow,
    }
}

/// Decision used when the session could not be resolved at all.
///
/// Protected views fall back to login; public views stay reachable.
pub fn guard_on_failure(policy: AccessPolicy) -> GuardDecision {
    match policy {
        AccessPolicy::RedirectIfAuthenticated => GuardDecision::Allow,
        AccessPolicy::RequireAuthenticated => GuardDecision::RedirectTo(Route::Login),
    }
}

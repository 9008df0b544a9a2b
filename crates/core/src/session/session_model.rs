//! Identity session domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{Result, ValidationError};
use crate::secrets::Secret;

/// The identity record behind a session, as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUser {
    pub id: Uuid,
    pub email: String,
    /// Set once the user has followed the confirmation link.
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

impl IdentityUser {
    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// A live identity session.
///
/// Owned by the session resolver; everything else gets clones.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub identity_token: String,
    pub refresh_token: Option<String>,
    pub is_confirmed: bool,
    pub user: IdentityUser,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        identity_token: impl Into<String>,
        refresh_token: Option<String>,
        user: IdentityUser,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            identity_token: identity_token.into(),
            refresh_token,
            is_confirmed: user.is_confirmed(),
            user,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Returns a copy carrying a fresh view of the identity record.
    pub fn with_user(&self, user: IdentityUser) -> Self {
        Self {
            is_confirmed: user.is_confirmed(),
            user,
            ..self.clone()
        }
    }

    pub fn state(&self) -> SessionState {
        if self.is_confirmed {
            SessionState::Active(self.clone())
        } else {
            SessionState::PendingConfirmation(self.clone())
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity_token", &"***")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("is_confirmed", &self.is_confirmed)
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Resolved session state.
///
/// ```text
/// ANONYMOUS --exchange(unconfirmed)--> PENDING_CONFIRMATION --confirmed--> ACTIVE
/// ANONYMOUS --exchange(confirmed)----> ACTIVE
/// any --sign out--> ANONYMOUS
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    PendingConfirmation(Session),
    Active(Session),
}

impl SessionState {
    pub fn from_session(session: Option<&Session>) -> Self {
        session.map(Session::state).unwrap_or(SessionState::Anonymous)
    }

    pub fn kind(&self) -> SessionStateKind {
        match self {
            SessionState::Anonymous => SessionStateKind::Anonymous,
            SessionState::PendingConfirmation(_) => SessionStateKind::PendingConfirmation,
            SessionState::Active(_) => SessionStateKind::Active,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Anonymous => None,
            SessionState::PendingConfirmation(s) | SessionState::Active(s) => Some(s),
        }
    }

    /// The bearer credential, only for a confirmed session.
    pub fn bearer(&self) -> Option<&str> {
        match self {
            SessionState::Active(s) => Some(s.identity_token.as_str()),
            _ => None,
        }
    }
}

/// Field-less view of [`SessionState`], handy for matching and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStateKind {
    Anonymous,
    PendingConfirmation,
    Active,
}

/// Sign-up input.
///
/// `username` travels with the identity record as metadata; `name` and
/// `surname` are also mirrored into the application's user store.
#[derive(Debug)]
pub struct SignUpProfile {
    pub email: String,
    pub password: Secret,
    pub username: String,
    pub name: String,
    pub surname: String,
}

impl SignUpProfile {
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            return Err(ValidationError::MissingField("email").into());
        }
        if !self.email.contains('@') {
            return Err(ValidationError::invalid("email", "not an email address").into());
        }
        if self.password.is_blank() {
            return Err(ValidationError::MissingField("password").into());
        }
        for (field, value) in [
            ("username", &self.username),
            ("name", &self.name),
            ("surname", &self.surname),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field).into());
            }
        }
        Ok(())
    }
}

/// Profile record mirrored into the application's own user store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSyncRecord {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub surname: String,
}

/// Non-fatal failure of the profile sync step of registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWarning {
    pub user_id: Uuid,
    pub detail: String,
}

/// Outcome of a completed registration.
///
/// `session` is `None` when the identity service withholds a session until
/// the email address is confirmed.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: IdentityUser,
    pub session: Option<Session>,
    pub sync_warning: Option<SyncWarning>,
}

/// What registration does when the profile sync call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationSyncPolicy {
    /// Log a [`SyncWarning`] and report the registration as successful.
    #[default]
    BestEffort,
    /// Fail the registration with the sync error.
    Required,
}

impl std::str::FromStr for RegistrationSyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" => Ok(Self::BestEffort),
            "required" => Ok(Self::Required),
            other => Err(format!("unknown registration sync policy '{}'", other)),
        }
    }
}

//! Session resolver: the single owner of the identity session.

use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::broker::ProfileSyncApi;
use crate::identity::IdentityProvider;
use brokerlink_core::errors::{Error, Result, ValidationError};
use brokerlink_core::secrets::Secret;
use brokerlink_core::session::{
    NoOpSessionEventSink, ProfileSyncRecord, Registration, RegistrationSyncPolicy, Session,
    SessionEndReason, SessionEvent, SessionEventSink, SessionState, SessionStateKind,
    SignUpProfile, SyncWarning,
};

/// Resolves, creates and destroys the identity session.
///
/// Other components only ever see clones of the session or its bearer token.
/// Whenever a stored session ends, a [`SessionEvent::Ended`] goes to the
/// event sink so that caches tied to it can be dropped.
pub struct SessionResolver {
    identity: Arc<dyn IdentityProvider>,
    profile_sync: Arc<dyn ProfileSyncApi>,
    sync_policy: RegistrationSyncPolicy,
    password_reset_redirect: Option<String>,
    event_sink: Arc<dyn SessionEventSink>,
    session: RwLock<Option<Session>>,
}

impl SessionResolver {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profile_sync: Arc<dyn ProfileSyncApi>,
        sync_policy: RegistrationSyncPolicy,
    ) -> Self {
        Self {
            identity,
            profile_sync,
            sync_policy,
            password_reset_redirect: None,
            event_sink: Arc::new(NoOpSessionEventSink),
            session: RwLock::new(None),
        }
    }

    pub fn with_event_sink(mut self, event_sink: Arc<dyn SessionEventSink>) -> Self {
        self.event_sink = event_sink;
        self
    }

    pub fn with_password_reset_redirect(mut self, redirect: Option<String>) -> Self {
        self.password_reset_redirect = redirect;
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.session.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.session.write().unwrap_or_else(|e| e.into_inner())
    }

    fn ended(&self, session: &Session, reason: SessionEndReason) {
        debug!("[SessionResolver] Session of {} ended ({:?})", session.user.id, reason);
        self.event_sink.emit(SessionEvent::Ended {
            user_id: session.user.id,
            reason,
        });
    }

    /// Stores `session`. The previous one has ended unless the same user
    /// stays active, as after a refresh.
    fn store(&self, session: Session) {
        let active = session.state().kind() == SessionStateKind::Active;
        let user_id = session.user.id;
        let previous = self.write().replace(session);
        if let Some(previous) = previous {
            if !active || previous.user.id != user_id {
                self.ended(&previous, SessionEndReason::Replaced);
            }
        }
    }

    /// Drops the stored session, but only if it still carries `token`.
    fn clear_if_current(&self, token: &str, reason: SessionEndReason) {
        let cleared = {
            let mut guard = self.write();
            if guard
                .as_ref()
                .map(|s| s.identity_token == token)
                .unwrap_or(false)
            {
                guard.take()
            } else {
                None
            }
        };
        if let Some(session) = cleared {
            self.ended(&session, reason);
        }
    }

    /// The locally known state, without querying the identity service.
    pub fn current_state(&self) -> SessionState {
        SessionState::from_session(self.read().as_ref())
    }

    /// Bearer token of the active session, if any.
    pub fn bearer(&self) -> Option<String> {
        self.current_state().bearer().map(str::to_string)
    }

    /// Re-validates the stored session against the identity service.
    ///
    /// Safe to call repeatedly. An expired or rejected token ends the session
    /// and resolves to `Anonymous`; a transport failure is returned as-is and
    /// leaves the stored session alone.
    pub async fn resolve(&self) -> Result<SessionState> {
        let Some(session) = self.read().clone() else {
            return Ok(SessionState::Anonymous);
        };

        if session.is_expired_at(Utc::now()) {
            debug!("[SessionResolver] Session for {} expired", session.user.id);
            self.clear_if_current(&session.identity_token, SessionEndReason::Expired);
            return Ok(SessionState::Anonymous);
        }

        match self.identity.get_user(&session.identity_token).await {
            Ok(user) => {
                let refreshed = session.with_user(user);
                let mut guard = self.write();
                // A concurrent sign-out or sign-in wins over this lookup.
                if guard
                    .as_ref()
                    .map(|s| s.identity_token == session.identity_token)
                    .unwrap_or(false)
                {
                    *guard = Some(refreshed.clone());
                }
                Ok(refreshed.state())
            }
            Err(Error::Auth(detail)) => {
                info!("[SessionResolver] Session rejected by identity service: {}", detail);
                self.clear_if_current(&session.identity_token, SessionEndReason::Rejected);
                Ok(SessionState::Anonymous)
            }
            Err(e) => {
                warn!("[SessionResolver] Failed to resolve session: {}", e);
                Err(e)
            }
        }
    }

    /// Signs in with email and password.
    pub async fn exchange_credentials(&self, email: &str, password: Secret) -> Result<Session> {
        if email.trim().is_empty() {
            return Err(ValidationError::MissingField("email").into());
        }
        if password.is_blank() {
            return Err(ValidationError::MissingField("password").into());
        }

        let session = self.identity.sign_in_with_password(email, &password).await?;
        info!(
            "[SessionResolver] Signed in {} ({:?})",
            session.user.id,
            session.state().kind()
        );
        self.store(session.clone());
        Ok(session)
    }

    /// Creates the identity record, then mirrors the profile into the
    /// application's user store.
    ///
    /// A failed identity call aborts registration. A failed sync is handled
    /// according to the [`RegistrationSyncPolicy`].
    pub async fn register(&self, profile: SignUpProfile) -> Result<Registration> {
        profile.validate()?;

        let (user, session) = self.identity.sign_up(&profile).await?;
        info!("[SessionResolver] Created identity record {}", user.id);

        let record = ProfileSyncRecord {
            id: user.id,
            email: if user.email.is_empty() {
                profile.email.trim().to_string()
            } else {
                user.email.clone()
            },
            name: profile.name.trim().to_string(),
            surname: profile.surname.trim().to_string(),
        };

        let sync_warning = match self.profile_sync.sync_profile(&record).await {
            Ok(()) => None,
            Err(e) => match self.sync_policy {
                RegistrationSyncPolicy::BestEffort => {
                    warn!("[SessionResolver] Sync warning for {}: {}", user.id, e);
                    Some(SyncWarning {
                        user_id: user.id,
                        detail: e.to_string(),
                    })
                }
                RegistrationSyncPolicy::Required => {
                    error!("[SessionResolver] Profile sync failed for {}: {}", user.id, e);
                    return Err(e);
                }
            },
        };

        if let Some(session) = &session {
            self.store(session.clone());
        }

        Ok(Registration {
            user,
            session,
            sync_warning,
        })
    }

    /// Exchanges the refresh token for a new session.
    ///
    /// A rejected refresh ends the session.
    pub async fn refresh(&self) -> Result<SessionState> {
        let Some(session) = self.read().clone() else {
            return Err(Error::auth("No session to refresh"));
        };
        let Some(refresh_token) = session.refresh_token.as_deref() else {
            return Err(Error::auth("Session has no refresh token"));
        };

        match self.identity.refresh_session(refresh_token).await {
            Ok(renewed) => {
                debug!("[SessionResolver] Refreshed session for {}", renewed.user.id);
                let state = renewed.state();
                self.store(renewed);
                Ok(state)
            }
            Err(Error::Auth(detail)) => {
                info!("[SessionResolver] Refresh rejected: {}", detail);
                self.clear_if_current(&session.identity_token, SessionEndReason::Rejected);
                Err(Error::Auth(detail))
            }
            Err(e) => Err(e),
        }
    }

    /// Ends the session. Idempotent; a failed remote logout is only logged.
    pub async fn sign_out(&self) {
        let Some(session) = self.write().take() else {
            debug!("[SessionResolver] Sign out without a session");
            return;
        };

        self.ended(&session, SessionEndReason::SignedOut);

        if let Err(e) = self.identity.sign_out(&session.identity_token).await {
            warn!("[SessionResolver] Remote sign out failed: {}", e);
        }
        info!("[SessionResolver] Signed out {}", session.user.id);
    }

    /// Asks the identity service to mail a password reset link.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        if email.trim().is_empty() {
            return Err(ValidationError::MissingField("email").into());
        }
        self.identity
            .request_password_reset(email, self.password_reset_redirect.as_deref())
            .await?;
        info!("[SessionResolver] Password reset requested");
        Ok(())
    }
}

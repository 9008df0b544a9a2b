//! Session module - identity session models.

mod session_events;
mod session_model;

#[cfg(test)]
mod session_model_tests;

pub use session_events::{NoOpSessionEventSink, SessionEndReason, SessionEvent, SessionEventSink};
pub use session_model::{
    IdentityUser, ProfileSyncRecord, Registration, RegistrationSyncPolicy, Session, SessionState,
    SessionStateKind, SignUpProfile, SyncWarning,
};

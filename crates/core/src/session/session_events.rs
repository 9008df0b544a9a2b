//! Notifications about the identity session.

use uuid::Uuid;

/// Why a session stopped being usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    SignedOut,
    Expired,
    /// The identity service refused the token.
    Rejected,
    /// A different user signed in, or the new session is not confirmed.
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Ended {
        user_id: Uuid,
        reason: SessionEndReason,
    },
}

/// Receives session events from the resolver.
///
/// `emit()` runs on the caller's task and must not block.
pub trait SessionEventSink: Send + Sync {
    fn emit(&self, event: SessionEvent);
}

/// Discards every event.
#[derive(Clone, Default)]
pub struct NoOpSessionEventSink;

impl SessionEventSink for NoOpSessionEventSink {
    fn emit(&self, _event: SessionEvent) {}
}

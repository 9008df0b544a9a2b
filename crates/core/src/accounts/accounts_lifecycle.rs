//! Per-account link lifecycle.
//!
//! ```text
//! ABSENT --submit link--> PENDING_LINK --ok--> LINKED
//! LINKED --submit unlink--> PENDING_UNLINK --ok--> ABSENT
//! ```
//! A failure at a pending state falls back to the stable state it came from.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Absent,
    PendingLink,
    Linked,
    PendingUnlink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    SubmitLink,
    SubmitUnlink,
    Succeeded,
    Failed,
}

impl LifecycleState {
    pub fn stable(linked: bool) -> Self {
        if linked {
            LifecycleState::Linked
        } else {
            LifecycleState::Absent
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            LifecycleState::PendingLink | LifecycleState::PendingUnlink
        )
    }

    /// Applies `event`, returning `None` when the transition is not allowed.
    pub fn transition(self, event: LifecycleEvent) -> Option<Self> {
        use LifecycleEvent::*;
        use LifecycleState::*;

        match (self, event) {
            (Absent, SubmitLink) => Some(PendingLink),
            (PendingLink, Succeeded) => Some(Linked),
            (PendingLink, Failed) => Some(Absent),
            (Linked, SubmitUnlink) => Some(PendingUnlink),
            (PendingUnlink, Succeeded) => Some(Absent),
            (PendingUnlink, Failed) => Some(Linked),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LifecycleEvent::*;
    use super::LifecycleState::*;
    use super::*;

    #[test]
    fn test_happy_path_round_trip() {
        let state = Absent
            .transition(SubmitLink)
            .and_then(|s| s.transition(Succeeded))
            .and_then(|s| s.transition(SubmitUnlink))
            .and_then(|s| s.transition(Succeeded));
        assert_eq!(state, Some(Absent));
    }

    #[test]
    fn test_failures_return_to_prior_stable_state() {
        assert_eq!(PendingLink.transition(Failed), Some(Absent));
        assert_eq!(PendingUnlink.transition(Failed), Some(Linked));
    }

    #[test]
    fn test_illegal_transitions() {
        assert_eq!(Absent.transition(SubmitUnlink), None);
        assert_eq!(Linked.transition(SubmitLink), None);
        assert_eq!(PendingLink.transition(SubmitLink), None);
        assert_eq!(PendingUnlink.transition(SubmitUnlink), None);
        assert_eq!(Absent.transition(Succeeded), None);
        assert_eq!(Linked.transition(Failed), None);
    }

    #[test]
    fn test_pending_flags() {
        assert!(PendingLink.is_pending());
        assert!(PendingUnlink.is_pending());
        assert!(!Absent.is_pending());
        assert_eq!(LifecycleState::stable(true), Linked);
        assert_eq!(LifecycleState::stable(false), Absent);
    }
}

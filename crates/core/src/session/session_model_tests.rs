use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use super::*;
use crate::errors::{Error, ValidationError};

fn user(confirmed: bool) -> IdentityUser {
    IdentityUser {
        id: Uuid::nil(),
        email: "trader@example.com".to_string(),
        email_confirmed_at: confirmed.then(|| Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()),
    }
}

fn profile() -> SignUpProfile {
    SignUpProfile {
        email: "trader@example.com".to_string(),
        password: "s3cret".into(),
        username: "trader".to_string(),
        name: "Ada".to_string(),
        surname: "Lovelace".to_string(),
    }
}

#[test]
fn test_session_state_follows_confirmation() {
    let pending = Session::new("tok", None, user(false), None);
    assert_eq!(pending.state().kind(), SessionStateKind::PendingConfirmation);
    assert_eq!(pending.state().bearer(), None);

    let active = pending.with_user(user(true));
    assert!(active.is_confirmed);
    assert_eq!(active.state().kind(), SessionStateKind::Active);
    assert_eq!(active.state().bearer(), Some("tok"));
}

#[test]
fn test_anonymous_from_none() {
    let state = SessionState::from_session(None);
    assert_eq!(state, SessionState::Anonymous);
    assert!(state.session().is_none());
}

#[test]
fn test_expiry() {
    let now = Utc::now();
    let session = Session::new("tok", None, user(true), Some(now - Duration::seconds(1)));
    assert!(session.is_expired_at(now));

    let open_ended = Session::new("tok", None, user(true), None);
    assert!(!open_ended.is_expired_at(now));
}

#[test]
fn test_session_debug_hides_tokens() {
    let session = Session::new("very-secret-token", Some("refresh-me".into()), user(true), None);
    let rendered = format!("{:?}", session);
    assert!(!rendered.contains("very-secret-token"));
    assert!(!rendered.contains("refresh-me"));
}

#[test]
fn test_profile_validation() {
    assert!(profile().validate().is_ok());

    let mut missing_surname = profile();
    missing_surname.surname = "  ".to_string();
    match missing_surname.validate() {
        Err(Error::Validation(ValidationError::MissingField(field))) => {
            assert_eq!(field, "surname")
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let mut blank_password = profile();
    blank_password.password = "".into();
    assert!(blank_password.validate().is_err());

    let mut bad_email = profile();
    bad_email.email = "nope".to_string();
    assert!(bad_email.validate().is_err());
}

#[test]
fn test_sync_policy_parsing() {
    assert_eq!(
        "best-effort".parse::<RegistrationSyncPolicy>(),
        Ok(RegistrationSyncPolicy::BestEffort)
    );
    assert_eq!(
        "REQUIRED".parse::<RegistrationSyncPolicy>(),
        Ok(RegistrationSyncPolicy::Required)
    );
    assert!("sometimes".parse::<RegistrationSyncPolicy>().is_err());
    assert_eq!(
        RegistrationSyncPolicy::default(),
        RegistrationSyncPolicy::BestEffort
    );
}

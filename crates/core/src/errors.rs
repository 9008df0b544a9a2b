//! Core error types for brokerlink.
//!
//! This module defines transport-agnostic error types. HTTP-specific errors
//! (from reqwest) are converted to these types by the connect layer.

use thiserror::Error;

use crate::accounts::AccountKey;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the account-linking subsystem.
///
/// `Auth`, `ServerRejection` and `Http` carry messages meant to be shown to
/// the user as-is. `Validation`, `LimitExceeded`, `LimitsUnavailable`,
/// `RegistryUnavailable` and `AlreadyLinked` are raised locally and guarantee
/// that nothing was sent over the network.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Account limit reached: {current} of {max} accounts on the {plan} plan")]
    LimitExceeded { plan: String, max: u32, current: u32 },

    #[error("Plan limits are unknown; linking is disabled until they load")]
    LimitsUnavailable,

    #[error("Account registry is unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Account {0} is already linked")]
    AlreadyLinked(AccountKey),

    #[error("{0}")]
    ServerRejection(String),

    #[error("HTTP error{}: {detail}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Http { status: Option<u16>, detail: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn http(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::Http {
            status,
            detail: detail.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// True for errors raised before any request was dispatched.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::LimitExceeded { .. }
                | Error::LimitsUnavailable
                | Error::RegistryUnavailable(_)
                | Error::AlreadyLinked(_)
                | Error::Config(_)
        )
    }
}

/// Errors raised while checking user input at the boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Unknown broker type: {0}")]
    UnknownBroker(String),
}

impl ValidationError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

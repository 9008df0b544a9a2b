//! Linked broker account domain models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::accounts_constants::{broker_display_name, broker_types};
use crate::errors::{Result, ValidationError};
use crate::secrets::Secret;

/// Supported external brokers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BrokerKind {
    #[serde(rename = "MT5")]
    Mt5,
    #[serde(rename = "CAPITAL")]
    Capital,
}

impl BrokerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerKind::Mt5 => broker_types::MT5,
            BrokerKind::Capital => broker_types::CAPITAL,
        }
    }

    pub fn display_name(&self) -> &'static str {
        broker_display_name(self.as_str())
    }
}

impl fmt::Display for BrokerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrokerKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            broker_types::MT5 => Ok(BrokerKind::Mt5),
            broker_types::CAPITAL => Ok(BrokerKind::Capital),
            other => Err(ValidationError::UnknownBroker(other.to_string())),
        }
    }
}

/// Identity key of a linked account: `(broker kind, login)`.
///
/// MT5 logins are numeric and kept in their canonical decimal form so that
/// keys built from a form string and from a parsed integer compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountKey {
    pub kind: BrokerKind,
    pub login: String,
}

impl AccountKey {
    pub fn new(kind: BrokerKind, login: impl Into<String>) -> Self {
        Self {
            kind,
            login: login.into(),
        }
    }

    pub fn mt5(login: i64) -> Self {
        Self::new(BrokerKind::Mt5, login.to_string())
    }

    pub fn capital(login: impl Into<String>) -> Self {
        Self::new(BrokerKind::Capital, login)
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.login)
    }
}

/// A linked MetaTrader 5 account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mt5Account {
    pub login: i64,
    pub server: String,
    pub balance: Option<Decimal>,
    pub currency: Option<String>,
}

/// A linked Capital.com account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapitalAccount {
    pub login: String,
    pub email: Option<String>,
}

/// A connected external broker account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "brokerType")]
pub enum LinkedAccount {
    #[serde(rename = "MT5")]
    Mt5(Mt5Account),
    #[serde(rename = "CAPITAL")]
    Capital(CapitalAccount),
}

impl LinkedAccount {
    pub fn kind(&self) -> BrokerKind {
        match self {
            LinkedAccount::Mt5(_) => BrokerKind::Mt5,
            LinkedAccount::Capital(_) => BrokerKind::Capital,
        }
    }

    pub fn key(&self) -> AccountKey {
        match self {
            LinkedAccount::Mt5(a) => AccountKey::mt5(a.login),
            LinkedAccount::Capital(a) => AccountKey::capital(a.login.clone()),
        }
    }
}

/// A request to link a new broker account.
///
/// Each variant statically requires exactly the fields its broker needs.
/// Credentials are [`Secret`]s; the request is consumed on submission so
/// nothing holds on to them afterwards.
#[derive(Debug)]
pub enum LinkRequest {
    Mt5 {
        login: i64,
        server: String,
        password: Secret,
    },
    Capital {
        login: String,
        password: Secret,
        api_key: Secret,
    },
}

impl LinkRequest {
    pub fn kind(&self) -> BrokerKind {
        match self {
            LinkRequest::Mt5 { .. } => BrokerKind::Mt5,
            LinkRequest::Capital { .. } => BrokerKind::Capital,
        }
    }

    pub fn key(&self) -> AccountKey {
        match self {
            LinkRequest::Mt5 { login, .. } => AccountKey::mt5(*login),
            LinkRequest::Capital { login, .. } => AccountKey::capital(login.trim()),
        }
    }

    /// Checks that every field required by the broker kind is present and
    /// well-formed.
    pub fn validate(&self) -> Result<()> {
        match self {
            LinkRequest::Mt5 {
                login,
                server,
                password,
            } => {
                if *login <= 0 {
                    return Err(
                        ValidationError::invalid("mt5_login", "must be a positive integer").into(),
                    );
                }
                if server.trim().is_empty() {
                    return Err(ValidationError::MissingField("mt5_server").into());
                }
                if password.is_blank() {
                    return Err(ValidationError::MissingField("mt5_investor_password").into());
                }
            }
            LinkRequest::Capital {
                login,
                password,
                api_key,
            } => {
                if login.trim().is_empty() {
                    return Err(ValidationError::MissingField("capital_login").into());
                }
                if password.is_blank() {
                    return Err(ValidationError::MissingField("capital_password").into());
                }
                if api_key.is_blank() {
                    return Err(ValidationError::MissingField("capital_api_key").into());
                }
            }
        }
        Ok(())
    }
}

/// Raw, string-typed link form input as collected by a view.
#[derive(Debug)]
pub struct LinkForm {
    pub broker: BrokerKind,
    pub login: String,
    pub server: Option<String>,
    pub password: Secret,
    pub api_key: Option<Secret>,
}

impl TryFrom<LinkForm> for LinkRequest {
    type Error = crate::errors::Error;

    fn try_from(form: LinkForm) -> Result<Self> {
        let request = match form.broker {
            BrokerKind::Mt5 => {
                let raw_login = form.login.trim();
                if raw_login.is_empty() {
                    return Err(ValidationError::MissingField("mt5_login").into());
                }
                let login = raw_login
                    .parse::<i64>()
                    .map_err(|_| ValidationError::invalid("mt5_login", "must be an integer"))?;
                let server = form
                    .server
                    .map(|s| s.trim().to_string())
                    .ok_or(ValidationError::MissingField("mt5_server"))?;
                LinkRequest::Mt5 {
                    login,
                    server,
                    password: form.password,
                }
            }
            BrokerKind::Capital => LinkRequest::Capital {
                login: form.login.trim().to_string(),
                password: form.password,
                api_key: form
                    .api_key
                    .ok_or(ValidationError::MissingField("capital_api_key"))?,
            },
        };
        request.validate()?;
        Ok(request)
    }
}

//! Wire models for the accounts API.
//! Responses are parsed into these schemas and then converted into domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use brokerlink_core::accounts::{CapitalAccount, LinkRequest, LinkedAccount, Mt5Account};
use brokerlink_core::limits::{LimitsMismatch, PlanLimits};

/// Plan limits as returned by `GET /api/accounts/limits`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiPlanLimits {
    pub plan_name: String,
    pub max_accounts: u32,
    pub current_accounts: u32,
    pub remaining_slots: i64,
    pub can_add_account: bool,
}

impl TryFrom<ApiPlanLimits> for PlanLimits {
    type Error = LimitsMismatch;

    fn try_from(api: ApiPlanLimits) -> Result<Self, Self::Error> {
        PlanLimits::from_reported(
            api.plan_name,
            api.max_accounts,
            api.current_accounts,
            api.remaining_slots,
            api.can_add_account,
        )
    }
}

/// Response of `GET /api/accounts/list`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiAccountsResponse {
    pub mt5_accounts: Vec<ApiMt5Account>,
    pub capital_accounts: Vec<ApiCapitalAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiMt5Account {
    pub mt5_login: i64,
    pub mt5_server: String,
    #[serde(default)]
    pub portfolio_value: Option<Decimal>,
    #[serde(default)]
    pub portfolio_currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiCapitalAccount {
    pub capital_login: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl ApiAccountsResponse {
    /// MT5 accounts first, then Capital.com accounts, each in server order.
    pub fn into_accounts(self) -> Vec<LinkedAccount> {
        let mt5 = self.mt5_accounts.into_iter().map(|a| {
            LinkedAccount::Mt5(Mt5Account {
                login: a.mt5_login,
                server: a.mt5_server,
                balance: a.portfolio_value,
                currency: a.portfolio_currency,
            })
        });
        let capital = self.capital_accounts.into_iter().map(|a| {
            LinkedAccount::Capital(CapitalAccount {
                login: a.capital_login,
                email: a.email,
            })
        });
        mt5.chain(capital).collect()
    }
}

/// Body of `POST /api/accounts/link`.
///
/// Borrows the credentials from the request for the duration of the call.
#[derive(Serialize)]
#[serde(tag = "broker_type")]
pub(crate) enum LinkAccountBody<'a> {
    #[serde(rename = "MT5")]
    Mt5 {
        mt5_login: i64,
        mt5_investor_password: &'a str,
        mt5_server: &'a str,
    },
    #[serde(rename = "CAPITAL")]
    Capital {
        capital_login: &'a str,
        capital_password: &'a str,
        capital_api_key: &'a str,
    },
}

impl<'a> From<&'a LinkRequest> for LinkAccountBody<'a> {
    fn from(request: &'a LinkRequest) -> Self {
        match request {
            LinkRequest::Mt5 {
                login,
                server,
                password,
            } => LinkAccountBody::Mt5 {
                mt5_login: *login,
                mt5_investor_password: password.expose(),
                mt5_server: server.trim(),
            },
            LinkRequest::Capital {
                login,
                password,
                api_key,
            } => LinkAccountBody::Capital {
                capital_login: login.trim(),
                capital_password: password.expose(),
                capital_api_key: api_key.expose(),
            },
        }
    }
}

/// Renders the JSON body that a link submission sends for `request`.
pub fn link_request_body(request: &LinkRequest) -> serde_json::Value {
    serde_json::to_value(LinkAccountBody::from(request)).unwrap_or(serde_json::Value::Null)
}

/// Response of `POST /api/accounts/link`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkResponse {
    pub success: bool,
    pub message: String,
}

/// Optional body of a successful `DELETE /api/accounts/{broker_type}/{login}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlinkResponse {
    #[serde(default)]
    pub message: Option<String>,
}

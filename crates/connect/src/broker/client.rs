//! HTTP client for the accounts API.
//!
//! Covers plan limits, the linked accounts list, link and unlink, and the
//! registration sync call. Every response is checked against an explicit
//! schema; anything that does not match fails as [`Error::Http`].

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::models::{
    ApiAccountsResponse, ApiPlanLimits, LinkAccountBody, LinkResponse, UnlinkResponse,
};
use super::traits::{BrokerLinkApi, ProfileSyncApi};
use crate::config::ConnectConfig;
use crate::http::{
    build_http_client, parse_json, parse_response, read_body, status_error, transport_error,
};
use brokerlink_core::accounts::{AccountKey, LinkRequest, LinkedAccount};
use brokerlink_core::errors::{Error, Result};
use brokerlink_core::limits::PlanLimits;
use brokerlink_core::session::ProfileSyncRecord;

const LOG_PREFIX: &str = "[BrokerLinkApi]";

#[derive(Debug, Clone)]
pub struct BrokerLinkClient {
    client: reqwest::Client,
    base_url: String,
}

impl BrokerLinkClient {
    /// Create a new accounts API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ConnectConfig) -> Result<Self> {
        Self::new(&config.api_url, config.request_timeout)
    }

    fn headers(token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::auth(format!("Invalid access token format: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, token: &str, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("[BrokerLinkApi] GET {}", url);

        let response = self
            .client
            .get(&url)
            .headers(Self::headers(Some(token))?)
            .send()
            .await
            .map_err(transport_error)?;

        let (status, body) = read_body(response).await?;
        parse_response(LOG_PREFIX, status, &body)
    }
}

/// Path of the unlink endpoint for `key`.
pub(crate) fn unlink_path(key: &AccountKey) -> String {
    format!(
        "/api/accounts/{}/{}",
        key.kind.as_str(),
        urlencoding::encode(&key.login)
    )
}

#[async_trait]
impl BrokerLinkApi for BrokerLinkClient {
    async fn fetch_limits(&self, token: &str) -> Result<PlanLimits> {
        let api_limits: ApiPlanLimits = self.get(token, "/api/accounts/limits").await?;
        let limits = PlanLimits::try_from(api_limits).map_err(|mismatch| {
            warn!("[BrokerLinkApi] Plan limits violate invariant: {}", mismatch);
            Error::http(Some(200), format!("Inconsistent plan limits: {}", mismatch))
        })?;

        debug!(
            "[BrokerLinkApi] Plan {}: {}/{} accounts",
            limits.plan_name(),
            limits.current_accounts(),
            limits.max_accounts()
        );
        Ok(limits)
    }

    async fn fetch_accounts(&self, token: &str) -> Result<Vec<LinkedAccount>> {
        let api_response: ApiAccountsResponse = self.get(token, "/api/accounts/list").await?;
        let accounts = api_response.into_accounts();

        info!("[BrokerLinkApi] Fetched {} linked accounts", accounts.len());
        Ok(accounts)
    }

    async fn link_account(&self, token: &str, request: LinkRequest) -> Result<LinkResponse> {
        let url = self.url("/api/accounts/link");
        debug!("[BrokerLinkApi] POST {} ({})", url, request.key());

        let response = self
            .client
            .post(&url)
            .headers(Self::headers(Some(token))?)
            .json(&LinkAccountBody::from(&request))
            .send()
            .await
            .map_err(transport_error)?;

        let (status, body) = read_body(response).await?;
        parse_response(LOG_PREFIX, status, &body)
    }

    async fn unlink_account(&self, token: &str, key: &AccountKey) -> Result<UnlinkResponse> {
        let url = self.url(&unlink_path(key));
        debug!("[BrokerLinkApi] DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .headers(Self::headers(Some(token))?)
            .send()
            .await
            .map_err(transport_error)?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(UnlinkResponse::default());
        }
        parse_json(LOG_PREFIX, status, &body)
    }
}

#[async_trait]
impl ProfileSyncApi for BrokerLinkClient {
    async fn sync_profile(&self, record: &ProfileSyncRecord) -> Result<()> {
        let url = self.url("/api/auth/register-sync");
        debug!("[BrokerLinkApi] POST {} for user {}", url, record.id);

        let response = self
            .client
            .post(&url)
            .headers(Self::headers(None)?)
            .json(record)
            .send()
            .await
            .map_err(transport_error)?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::models::link_request_body;
    use brokerlink_core::accounts::BrokerKind;
    use brokerlink_core::secrets::Secret;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_client_url_normalization() {
        let client =
            BrokerLinkClient::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "http://localhost:8000");
        assert_eq!(
            client.url("/api/accounts/list"),
            "http://localhost:8000/api/accounts/list"
        );
    }

    #[test]
    fn test_mt5_link_body() {
        let request = LinkRequest::Mt5 {
            login: 12345,
            server: "Demo-1".to_string(),
            password: Secret::new("x"),
        };
        assert_eq!(
            link_request_body(&request),
            json!({
                "broker_type": "MT5",
                "mt5_login": 12345,
                "mt5_investor_password": "x",
                "mt5_server": "Demo-1"
            })
        );
    }

    #[test]
    fn test_capital_link_body() {
        let request = LinkRequest::Capital {
            login: "trader1".to_string(),
            password: Secret::new("pw"),
            api_key: Secret::new("key"),
        };
        assert_eq!(
            link_request_body(&request),
            json!({
                "broker_type": "CAPITAL",
                "capital_login": "trader1",
                "capital_password": "pw",
                "capital_api_key": "key"
            })
        );
    }

    #[test]
    fn test_unlink_path_encodes_login() {
        assert_eq!(unlink_path(&AccountKey::mt5(12345)), "/api/accounts/MT5/12345");
        assert_eq!(
            unlink_path(&AccountKey::new(BrokerKind::Capital, "trader 1/a")),
            "/api/accounts/CAPITAL/trader%201%2Fa"
        );
    }

    #[test]
    fn test_parse_accounts_response() {
        let body = r#"{
            "mt5_accounts": [
                {"mt5_login": 12345, "mt5_server": "Demo-1", "portfolio_value": 1520.75, "portfolio_currency": "USD"},
                {"mt5_login": 777, "mt5_server": "Live-2"}
            ],
            "capital_accounts": [
                {"capital_login": "trader1", "email": "t@example.com"}
            ]
        }"#;
        let parsed: ApiAccountsResponse =
            parse_response(LOG_PREFIX, reqwest::StatusCode::OK, body).unwrap();
        let accounts = parsed.into_accounts();

        assert_eq!(accounts.len(), 3);
        match &accounts[0] {
            LinkedAccount::Mt5(a) => {
                assert_eq!(a.login, 12345);
                assert_eq!(a.balance, Some(dec!(1520.75)));
                assert_eq!(a.currency.as_deref(), Some("USD"));
            }
            other => panic!("expected MT5 account, got {:?}", other),
        }
        assert_eq!(accounts[1].key(), AccountKey::mt5(777));
        assert_eq!(accounts[2].key(), AccountKey::capital("trader1"));
    }

    #[test]
    fn test_accounts_schema_is_strict() {
        let missing_list = r#"{"mt5_accounts": []}"#;
        assert!(
            parse_response::<ApiAccountsResponse>(LOG_PREFIX, reqwest::StatusCode::OK, missing_list)
                .is_err()
        );

        let string_login = r#"{"mt5_accounts": [{"mt5_login": "12345", "mt5_server": "Demo-1"}], "capital_accounts": []}"#;
        assert!(
            parse_response::<ApiAccountsResponse>(LOG_PREFIX, reqwest::StatusCode::OK, string_login)
                .is_err()
        );
    }

    #[test]
    fn test_limits_schema_and_invariant() {
        let body = r#"{"plan_name":"Pro","max_accounts":5,"current_accounts":3,"remaining_slots":2,"can_add_account":true}"#;
        let api: ApiPlanLimits = parse_response(LOG_PREFIX, reqwest::StatusCode::OK, body).unwrap();
        let limits = PlanLimits::try_from(api).unwrap();
        assert_eq!(limits.remaining_slots(), 2);
        assert!(limits.can_add_account());

        let lying = r#"{"plan_name":"Pro","max_accounts":5,"current_accounts":5,"remaining_slots":1,"can_add_account":true}"#;
        let api: ApiPlanLimits = parse_response(LOG_PREFIX, reqwest::StatusCode::OK, lying).unwrap();
        assert!(PlanLimits::try_from(api).is_err());
    }

    #[test]
    fn test_link_response_parsing() {
        let ok: LinkResponse = parse_response(
            LOG_PREFIX,
            reqwest::StatusCode::OK,
            r#"{"success":false,"message":"Invalid MT5 credentials"}"#,
        )
        .unwrap();
        assert!(!ok.success);
        assert_eq!(ok.message, "Invalid MT5 credentials");

        let missing_message =
            parse_response::<LinkResponse>(LOG_PREFIX, reqwest::StatusCode::OK, r#"{"success":true}"#);
        assert!(matches!(missing_message, Err(Error::Http { .. })));
    }
}

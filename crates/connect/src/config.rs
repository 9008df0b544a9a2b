//! Runtime configuration for the connect layer.

use std::time::Duration;

use brokerlink_core::guard::GuardRoutes;
use brokerlink_core::session::RegistrationSyncPolicy;
use brokerlink_core::{Error, Result};

/// Default base URL of the accounts API.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub api_url: String,
    pub identity_url: String,
    pub identity_anon_key: String,
    pub request_timeout: Duration,
    pub registration_sync: RegistrationSyncPolicy,
    pub password_reset_redirect: Option<String>,
    pub routes: GuardRoutes,
}

impl ConnectConfig {
    /// Reads configuration from the process environment, loading `.env` first.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = get("BROKERLINK_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let identity_url = get("BROKERLINK_IDENTITY_URL")
            .ok_or_else(|| Error::config("BROKERLINK_IDENTITY_URL is not set"))?;
        let identity_anon_key = get("BROKERLINK_IDENTITY_ANON_KEY")
            .ok_or_else(|| Error::config("BROKERLINK_IDENTITY_ANON_KEY is not set"))?;

        let timeout_ms = match get("BROKERLINK_REQUEST_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Error::config(format!("BROKERLINK_REQUEST_TIMEOUT_MS is not a number: {}", raw))
            })?,
            None => DEFAULT_TIMEOUT_MS,
        };
        if timeout_ms == 0 {
            return Err(Error::config("BROKERLINK_REQUEST_TIMEOUT_MS must be positive"));
        }

        let registration_sync = match get("BROKERLINK_REGISTRATION_SYNC") {
            Some(raw) => raw.parse().map_err(Error::config)?,
            None => RegistrationSyncPolicy::default(),
        };

        Ok(Self {
            api_url: normalize_url(&api_url),
            identity_url: normalize_url(&identity_url),
            identity_anon_key,
            request_timeout: Duration::from_millis(timeout_ms),
            registration_sync,
            password_reset_redirect: get("BROKERLINK_PASSWORD_RESET_REDIRECT"),
            routes: GuardRoutes::default(),
        })
    }
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

//! HTTP client for the identity service.
//!
//! Speaks the GoTrue REST dialect: every request carries the public `apikey`
//! header, and user-scoped calls add the session's bearer token.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::traits::IdentityProvider;
use crate::config::ConnectConfig;
use crate::http::{
    build_http_client, error_detail, parse_json, read_body_unlogged, status_error, transport_error,
};
use brokerlink_core::errors::{Error, Result};
use brokerlink_core::secrets::Secret;
use brokerlink_core::session::{IdentityUser, Session, SignUpProfile};

const LOG_PREFIX: &str = "[IdentityApi]";

// ─────────────────────────────────────────────────────────────────────────────
// API Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<DateTime<Utc>>,
}

impl From<ApiUser> for IdentityUser {
    fn from(user: ApiUser) -> Self {
        IdentityUser {
            id: user.id,
            email: user.email.unwrap_or_default(),
            email_confirmed_at: user.email_confirmed_at,
        }
    }
}

#[derive(Deserialize)]
struct ApiTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: ApiUser,
}

impl ApiTokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .or_else(|| self.expires_in.map(|secs| now + ChronoDuration::seconds(secs)));
        Session::new(
            self.access_token,
            self.refresh_token,
            self.user.into(),
            expires_at,
        )
    }
}

/// Sign-up answers with a full session when email confirmation is disabled,
/// and with the bare user record otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum ApiSignUpResponse {
    Session(ApiTokenResponse),
    User(ApiUser),
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpMetadata<'a>,
}

#[derive(Serialize)]
struct SignUpMetadata<'a> {
    username: &'a str,
    name: &'a str,
    surname: &'a str,
}

#[derive(Serialize)]
struct RecoverBody<'a> {
    email: &'a str,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl IdentityClient {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    pub fn from_config(config: &ConnectConfig) -> Result<Self> {
        Self::new(
            &config.identity_url,
            &config.identity_anon_key,
            config.request_timeout,
        )
    }

    /// Headers for a request; without a user token the anon key doubles as bearer.
    fn headers(&self, token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let apikey = HeaderValue::from_str(&self.anon_key)
            .map_err(|e| Error::config(format!("Invalid identity API key: {}", e)))?;
        headers.insert("apikey", apikey);

        let bearer = token.unwrap_or(&self.anon_key);
        let auth = HeaderValue::from_str(&format!("Bearer {}", bearer))
            .map_err(|e| Error::auth(format!("Invalid access token format: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<(StatusCode, String)> {
        let url = self.url(path);
        debug!("[IdentityApi] POST {}", url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers(token)?)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        read_body_unlogged(response).await
    }

    async fn exchange_token<B: Serialize + ?Sized>(
        &self,
        grant: &str,
        body: &B,
    ) -> Result<Session> {
        let (status, body) = self
            .post(&format!("/token?grant_type={}", grant), None, body)
            .await?;
        let token: ApiTokenResponse = parse_identity_response(status, &body)?;
        Ok(token.into_session(Utc::now()))
    }
}

/// Credential and token rejections become `Error::Auth`; everything else is
/// a transport-level `Error::Http`.
fn identity_error(status: StatusCode, body: &str) -> Error {
    match status.as_u16() {
        400 | 401 | 403 | 422 => Error::auth(
            error_detail(body).unwrap_or_else(|| format!("HTTP {}", status)),
        ),
        _ => status_error(status, body),
    }
}

fn parse_identity_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    if !status.is_success() {
        return Err(identity_error(status, body));
    }
    parse_json(LOG_PREFIX, status, body)
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    async fn sign_in_with_password(&self, email: &str, password: &Secret) -> Result<Session> {
        let session = self
            .exchange_token(
                "password",
                &PasswordGrant {
                    email: email.trim(),
                    password: password.expose(),
                },
            )
            .await?;
        info!("[IdentityApi] Signed in user {}", session.user.id);
        Ok(session)
    }

    async fn sign_up(&self, profile: &SignUpProfile) -> Result<(IdentityUser, Option<Session>)> {
        let body = SignUpBody {
            email: profile.email.trim(),
            password: profile.password.expose(),
            data: SignUpMetadata {
                username: profile.username.trim(),
                name: profile.name.trim(),
                surname: profile.surname.trim(),
            },
        };
        let (status, raw) = self.post("/signup", None, &body).await?;

        match parse_identity_response::<ApiSignUpResponse>(status, &raw)? {
            ApiSignUpResponse::Session(token) => {
                let session = token.into_session(Utc::now());
                info!("[IdentityApi] Registered user {} with a live session", session.user.id);
                Ok((session.user.clone(), Some(session)))
            }
            ApiSignUpResponse::User(user) => {
                let user = IdentityUser::from(user);
                info!("[IdentityApi] Registered user {}, awaiting confirmation", user.id);
                Ok((user, None))
            }
        }
    }

    async fn get_user(&self, token: &str) -> Result<IdentityUser> {
        let url = self.url("/user");
        debug!("[IdentityApi] GET {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers(Some(token))?)
            .send()
            .await
            .map_err(transport_error)?;

        let (status, body) = read_body_unlogged(response).await?;
        let user: ApiUser = parse_identity_response(status, &body)?;
        Ok(user.into())
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        self.exchange_token("refresh_token", &RefreshGrant { refresh_token })
            .await
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        let (status, body) = self
            .post("/logout", Some(token), &serde_json::json!({}))
            .await?;
        if !status.is_success() {
            return Err(identity_error(status, &body));
        }
        Ok(())
    }

    async fn request_password_reset(&self, email: &str, redirect_to: Option<&str>) -> Result<()> {
        let path = match redirect_to {
            Some(redirect) => format!("/recover?redirect_to={}", urlencoding::encode(redirect)),
            None => "/recover".to_string(),
        };
        let (status, body) = self
            .post(&path, None, &RecoverBody { email: email.trim() })
            .await?;
        if !status.is_success() {
            return Err(identity_error(status, &body));
        }
        Ok(())
    }
}

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use brokerlink_connect::broker::link_request_body;
use brokerlink_connect::{
    AppState, BrokerLinkApi, ConnectConfig, IdentityProvider, LinkResponse, Navigator,
    ProfileSyncApi, UnlinkResponse,
};
use brokerlink_core::accounts::{AccountKey, CapitalAccount, LinkRequest, LinkedAccount, Mt5Account};
use brokerlink_core::errors::{Error, Result};
use brokerlink_core::limits::PlanLimits;
use brokerlink_core::secrets::Secret;
use brokerlink_core::session::{IdentityUser, ProfileSyncRecord, Session, SignUpProfile};

pub const EMAIL: &str = "trader@example.com";
pub const PASSWORD: &str = "correct horse";

pub fn test_config() -> ConnectConfig {
    ConnectConfig::from_lookup(|key| match key {
        "BROKERLINK_IDENTITY_URL" => Some("https://id.example.com".to_string()),
        "BROKERLINK_IDENTITY_ANON_KEY" => Some("anon".to_string()),
        "BROKERLINK_PASSWORD_RESET_REDIRECT" => {
            Some("https://app.example.com/auth/reset".to_string())
        }
        _ => None,
    })
    .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity service
// ─────────────────────────────────────────────────────────────────────────────

pub struct FakeIdentity {
    pub user_id: Uuid,
    confirmed_at: DateTime<Utc>,
    pub confirmed: AtomicBool,
    pub reject_tokens: AtomicBool,
    pub lookup_unavailable: AtomicBool,
    pub reject_sign_up: AtomicBool,
    pub sign_up_returns_session: AtomicBool,
    pub fail_logout: AtomicBool,
    pub lookup_delay: Mutex<Duration>,
    /// Lifetime of issued sessions in seconds; negative issues expired sessions.
    pub session_ttl_secs: Mutex<i64>,
    pub sign_in_calls: AtomicUsize,
    pub sign_up_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub reset_requests: Mutex<Vec<(String, Option<String>)>>,
    issued: AtomicUsize,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            confirmed_at: Utc::now(),
            confirmed: AtomicBool::new(true),
            reject_tokens: AtomicBool::new(false),
            lookup_unavailable: AtomicBool::new(false),
            reject_sign_up: AtomicBool::new(false),
            sign_up_returns_session: AtomicBool::new(false),
            fail_logout: AtomicBool::new(false),
            lookup_delay: Mutex::new(Duration::ZERO),
            session_ttl_secs: Mutex::new(3600),
            sign_in_calls: AtomicUsize::new(0),
            sign_up_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            reset_requests: Mutex::new(Vec::new()),
            issued: AtomicUsize::new(0),
        }
    }

    fn user(&self) -> IdentityUser {
        IdentityUser {
            id: self.user_id,
            email: EMAIL.to_string(),
            email_confirmed_at: if self.confirmed.load(Ordering::SeqCst) {
                Some(self.confirmed_at)
            } else {
                None
            },
        }
    }

    fn issue(&self) -> Session {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let ttl = *self.session_ttl_secs.lock().unwrap();
        Session::new(
            format!("token-{}", n),
            Some(format!("refresh-{}", n)),
            self.user(),
            Some(Utc::now() + ChronoDuration::seconds(ttl)),
        )
    }

    pub fn total_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
            + self.sign_up_calls.load(Ordering::SeqCst)
            + self.lookup_calls.load(Ordering::SeqCst)
            + self.logout_calls.load(Ordering::SeqCst)
            + self.refresh_calls.load(Ordering::SeqCst)
            + self.reset_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_in_with_password(&self, email: &str, password: &Secret) -> Result<Session> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        if email != EMAIL || password.expose() != PASSWORD {
            return Err(Error::auth("Invalid login credentials"));
        }
        Ok(self.issue())
    }

    async fn sign_up(&self, profile: &SignUpProfile) -> Result<(IdentityUser, Option<Session>)> {
        self.sign_up_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_sign_up.load(Ordering::SeqCst) {
            return Err(Error::auth("User already registered"));
        }
        let mut user = self.user();
        user.email = profile.email.clone();
        if self.sign_up_returns_session.load(Ordering::SeqCst) {
            let session = self.issue();
            Ok((session.user.clone(), Some(session)))
        } else {
            Ok((user, None))
        }
    }

    async fn get_user(&self, token: &str) -> Result<IdentityUser> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.lookup_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.lookup_unavailable.load(Ordering::SeqCst) {
            return Err(Error::http(Some(503), "HTTP 503 Service Unavailable"));
        }
        if self.reject_tokens.load(Ordering::SeqCst) || !token.starts_with("token-") {
            return Err(Error::auth("invalid JWT"));
        }
        Ok(self.user())
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_tokens.load(Ordering::SeqCst) || !refresh_token.starts_with("refresh-") {
            return Err(Error::auth("Invalid Refresh Token"));
        }
        Ok(self.issue())
    }

    async fn sign_out(&self, _token: &str) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(Error::http(None, "request timed out"));
        }
        Ok(())
    }

    async fn request_password_reset(&self, email: &str, redirect_to: Option<&str>) -> Result<()> {
        self.reset_requests
            .lock()
            .unwrap()
            .push((email.to_string(), redirect_to.map(str::to_string)));
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Accounts API
// ─────────────────────────────────────────────────────────────────────────────

pub struct FakeBrokerApi {
    plan: String,
    max_accounts: u32,
    accounts: Mutex<Vec<LinkedAccount>>,
    pub fail_limits: AtomicBool,
    pub fail_accounts: AtomicBool,
    /// Overrides the reply to the next link submissions.
    pub link_reply: Mutex<Option<LinkResponse>>,
    /// Status and detail returned by unlink instead of deleting.
    pub unlink_error: Mutex<Option<(u16, String)>>,
    pub accounts_delay: Mutex<Duration>,
    pub link_delay: Mutex<Duration>,
    pub link_bodies: Mutex<Vec<serde_json::Value>>,
    pub limits_calls: AtomicUsize,
    pub accounts_calls: AtomicUsize,
    pub link_calls: AtomicUsize,
    pub unlink_calls: AtomicUsize,
}

impl FakeBrokerApi {
    pub fn new(plan: &str, max_accounts: u32, accounts: Vec<LinkedAccount>) -> Self {
        Self {
            plan: plan.to_string(),
            max_accounts,
            accounts: Mutex::new(accounts),
            fail_limits: AtomicBool::new(false),
            fail_accounts: AtomicBool::new(false),
            link_reply: Mutex::new(None),
            unlink_error: Mutex::new(None),
            accounts_delay: Mutex::new(Duration::ZERO),
            link_delay: Mutex::new(Duration::ZERO),
            link_bodies: Mutex::new(Vec::new()),
            limits_calls: AtomicUsize::new(0),
            accounts_calls: AtomicUsize::new(0),
            link_calls: AtomicUsize::new(0),
            unlink_calls: AtomicUsize::new(0),
        }
    }

    pub fn mutation_calls(&self) -> usize {
        self.link_calls.load(Ordering::SeqCst) + self.unlink_calls.load(Ordering::SeqCst)
    }

    pub fn server_accounts(&self) -> Vec<LinkedAccount> {
        self.accounts.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerLinkApi for FakeBrokerApi {
    async fn fetch_limits(&self, _token: &str) -> Result<PlanLimits> {
        self.limits_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_limits.load(Ordering::SeqCst) {
            return Err(Error::http(Some(500), "limits service down"));
        }
        let current = self.accounts.lock().unwrap().len() as u32;
        Ok(PlanLimits::new(self.plan.clone(), self.max_accounts, current))
    }

    async fn fetch_accounts(&self, _token: &str) -> Result<Vec<LinkedAccount>> {
        self.accounts_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.accounts_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_accounts.load(Ordering::SeqCst) {
            return Err(Error::http(Some(500), "accounts service down"));
        }
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn link_account(&self, _token: &str, request: LinkRequest) -> Result<LinkResponse> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        self.link_bodies
            .lock()
            .unwrap()
            .push(link_request_body(&request));
        let delay = *self.link_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(reply) = self.link_reply.lock().unwrap().clone() {
            return Ok(reply);
        }

        let account = match &request {
            LinkRequest::Mt5 { login, server, .. } => LinkedAccount::Mt5(Mt5Account {
                login: *login,
                server: server.clone(),
                balance: None,
                currency: None,
            }),
            LinkRequest::Capital { login, .. } => LinkedAccount::Capital(CapitalAccount {
                login: login.clone(),
                email: None,
            }),
        };
        self.accounts.lock().unwrap().push(account);
        Ok(LinkResponse {
            success: true,
            message: "Account linked successfully".to_string(),
        })
    }

    async fn unlink_account(&self, _token: &str, key: &AccountKey) -> Result<UnlinkResponse> {
        self.unlink_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if let Some((status, detail)) = self.unlink_error.lock().unwrap().clone() {
            return Err(Error::http(Some(status), detail));
        }

        let mut accounts = self.accounts.lock().unwrap();
        let before = accounts.len();
        accounts.retain(|a| &a.key() != key);
        if accounts.len() == before {
            return Err(Error::http(Some(404), "not found"));
        }
        Ok(UnlinkResponse {
            message: Some("Account unlinked".to_string()),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile sync and navigation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeProfileSync {
    pub fail: AtomicBool,
    pub records: Mutex<Vec<ProfileSyncRecord>>,
}

#[async_trait]
impl ProfileSyncApi for FakeProfileSync {
    async fn sync_profile(&self, record: &ProfileSyncRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::http(Some(500), "database unavailable"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    pub paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn replace(&self, path: &str) {
        self.paths.lock().unwrap().push(path.to_string());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

pub struct Harness {
    pub state: AppState,
    pub identity: Arc<FakeIdentity>,
    pub broker: Arc<FakeBrokerApi>,
    pub sync: Arc<FakeProfileSync>,
    pub navigator: Arc<RecordingNavigator>,
}

impl Harness {
    pub fn new(broker: FakeBrokerApi) -> Self {
        Self::with_config(test_config(), broker)
    }

    pub fn with_config(config: ConnectConfig, broker: FakeBrokerApi) -> Self {
        let identity = Arc::new(FakeIdentity::new());
        let broker = Arc::new(broker);
        let sync = Arc::new(FakeProfileSync::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let state = AppState::with_providers(
            &config,
            identity.clone(),
            broker.clone(),
            sync.clone(),
            navigator.clone(),
        );
        Self {
            state,
            identity,
            broker,
            sync,
            navigator,
        }
    }

    /// Signs in with a confirmed account, which also loads the registry.
    pub async fn signed_in(broker: FakeBrokerApi) -> Self {
        let harness = Self::new(broker);
        harness
            .state
            .sign_in(EMAIL, Secret::new(PASSWORD))
            .await
            .unwrap();
        harness
    }

    pub fn token(&self) -> String {
        self.state.session.bearer().unwrap()
    }
}

pub fn mt5(login: i64) -> LinkedAccount {
    LinkedAccount::Mt5(Mt5Account {
        login,
        server: "Demo-1".to_string(),
        balance: None,
        currency: None,
    })
}

pub fn capital(login: &str) -> LinkedAccount {
    LinkedAccount::Capital(CapitalAccount {
        login: login.to_string(),
        email: Some(format!("{}@example.com", login)),
    })
}

pub fn profile() -> SignUpProfile {
    SignUpProfile {
        email: EMAIL.to_string(),
        password: Secret::new(PASSWORD),
        username: "trader".to_string(),
        name: "Ada".to_string(),
        surname: "Lovelace".to_string(),
    }
}

//! Traits defining the contract with the accounts API.

use async_trait::async_trait;

use super::models::{LinkResponse, UnlinkResponse};
use brokerlink_core::accounts::{AccountKey, LinkRequest, LinkedAccount};
use brokerlink_core::errors::Result;
use brokerlink_core::limits::PlanLimits;
use brokerlink_core::session::ProfileSyncRecord;

/// Trait for the account-linking endpoints of the accounts API.
///
/// Every call takes the bearer credential of an active session.
#[async_trait]
pub trait BrokerLinkApi: Send + Sync {
    /// Fetch the plan limits of the signed-in user.
    async fn fetch_limits(&self, token: &str) -> Result<PlanLimits>;

    /// Fetch every linked account, MT5 first, in server order.
    async fn fetch_accounts(&self, token: &str) -> Result<Vec<LinkedAccount>>;

    /// Submit a link request. The request is consumed so its credentials
    /// are dropped once the call returns.
    ///
    /// A 2xx response with `success == false` is returned as `Ok`; only a
    /// transport failure or a non-2xx status is an error.
    async fn link_account(&self, token: &str, request: LinkRequest) -> Result<LinkResponse>;

    /// Delete a linked account by identity key.
    async fn unlink_account(&self, token: &str, key: &AccountKey) -> Result<UnlinkResponse>;
}

/// Trait for mirroring a freshly registered user into the application's user store.
#[async_trait]
pub trait ProfileSyncApi: Send + Sync {
    async fn sync_profile(&self, record: &ProfileSyncRecord) -> Result<()>;
}

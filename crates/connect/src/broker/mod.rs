//! Accounts API: plan limits, linked accounts, link and unlink.

mod client;
mod models;
mod traits;

pub use client::BrokerLinkClient;
pub use models::{link_request_body, LinkResponse, UnlinkResponse};
pub use traits::{BrokerLinkApi, ProfileSyncApi};

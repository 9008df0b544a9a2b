//! Brokerlink Connect - Session-gated broker account linking.
//!
//! HTTP clients for the identity service and the accounts API, plus the
//! components built on top of them: the session resolver, the route guard
//! adapter, the account registry and the linking workflow.

pub mod app_state;
pub mod broker;
pub mod config;
pub mod guard;
mod http;
pub mod identity;
pub mod linking;
pub mod registry;
pub mod session;

// Re-export commonly used types
pub use app_state::{build_state, AppState};
pub use broker::{BrokerLinkApi, BrokerLinkClient, LinkResponse, ProfileSyncApi, UnlinkResponse};
pub use config::ConnectConfig;
pub use guard::{GuardHandle, GuardStatus, Navigator, RouteGuard};
pub use identity::{IdentityClient, IdentityProvider};
pub use linking::{LinkOutcome, LinkingWorkflow, UnlinkOutcome};
pub use registry::AccountRegistry;
pub use session::SessionResolver;

use log::info;
use std::sync::Arc;

use crate::broker::{BrokerLinkApi, BrokerLinkClient, ProfileSyncApi};
use crate::config::ConnectConfig;
use crate::guard::{Navigator, RouteGuard};
use crate::identity::{IdentityClient, IdentityProvider};
use crate::linking::LinkingWorkflow;
use crate::registry::AccountRegistry;
use crate::session::SessionResolver;
use brokerlink_core::errors::Result;
use brokerlink_core::secrets::Secret;
use brokerlink_core::session::Session;

/// Every component of the subsystem, wired to one identity session.
pub struct AppState {
    pub session: Arc<SessionResolver>,
    pub registry: Arc<AccountRegistry>,
    pub linking: Arc<LinkingWorkflow>,
    pub guard: Arc<RouteGuard>,
}

impl AppState {
    /// Wires the components around explicitly constructed providers.
    pub fn with_providers(
        config: &ConnectConfig,
        identity: Arc<dyn IdentityProvider>,
        broker_api: Arc<dyn BrokerLinkApi>,
        profile_sync: Arc<dyn ProfileSyncApi>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let registry = Arc::new(AccountRegistry::new(broker_api.clone()));
        let session = Arc::new(
            SessionResolver::new(identity, profile_sync, config.registration_sync)
                .with_password_reset_redirect(config.password_reset_redirect.clone())
                .with_event_sink(registry.clone()),
        );
        let linking = Arc::new(LinkingWorkflow::new(
            session.clone(),
            registry.clone(),
            broker_api,
        ));
        let guard = Arc::new(RouteGuard::new(
            session.clone(),
            navigator,
            config.routes.clone(),
            config.request_timeout,
        ));

        Self {
            session,
            registry,
            linking,
            guard,
        }
    }

    /// Signs in and, for a confirmed session, loads the registry. An
    /// unconfirmed session starts from an empty registry.
    pub async fn sign_in(&self, email: &str, password: Secret) -> Result<Session> {
        let session = self.session.exchange_credentials(email, password).await?;
        if session.is_confirmed {
            self.registry.load(&session.identity_token).await;
        } else {
            self.registry.reset();
        }
        Ok(session)
    }

    /// Ends the session and forgets the cached accounts.
    pub async fn sign_out(&self) {
        self.session.sign_out().await;
        self.registry.reset();
    }
}

/// Builds the production state: HTTP clients for both services.
pub fn build_state(
    config: &ConnectConfig,
    navigator: Arc<dyn Navigator>,
) -> Result<Arc<AppState>> {
    let identity = Arc::new(IdentityClient::from_config(config)?);
    let broker = Arc::new(BrokerLinkClient::from_config(config)?);
    info!(
        "[AppState] Using accounts API at {} and identity service at {}",
        config.api_url, config.identity_url
    );

    Ok(Arc::new(AppState::with_providers(
        config,
        identity,
        broker.clone(),
        broker,
        navigator,
    )))
}

//! Account registry: the client-side cache of plan limits and linked accounts.

use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::broker::BrokerLinkApi;
use crate::session::SessionResolver;
use brokerlink_core::errors::{Error, Result};
use brokerlink_core::limits::LimitsState;
use brokerlink_core::registry::RegistrySnapshot;
use brokerlink_core::session::{SessionEvent, SessionEventSink};

/// Holds the current [`RegistrySnapshot`] and replaces it on every load.
///
/// Each load takes a generation number when it starts. A load that finishes
/// after a newer one has been installed is discarded, so a reload always
/// reflects the latest request rather than whichever response arrived last.
pub struct AccountRegistry {
    api: Arc<dyn BrokerLinkApi>,
    current: RwLock<Arc<RegistrySnapshot>>,
    generation: AtomicU64,
}

impl AccountRegistry {
    pub fn new(api: Arc<dyn BrokerLinkApi>) -> Self {
        Self {
            api,
            current: RwLock::new(Arc::new(RegistrySnapshot::default())),
            generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fetches limits and accounts concurrently and installs the result.
    ///
    /// Never fails: a limits failure yields `LimitsState::Unknown`, an
    /// accounts failure yields a `Failed` snapshot that blocks mutations.
    /// Returns the snapshot that is current once this load settles.
    pub async fn load(&self, token: &str) -> Arc<RegistrySnapshot> {
        let generation = self.next_generation();
        debug!("[AccountRegistry] Load #{} started", generation);

        let (limits, accounts) = tokio::join!(
            self.api.fetch_limits(token),
            self.api.fetch_accounts(token)
        );

        let limits = match limits {
            Ok(limits) => LimitsState::Known(limits),
            Err(e) => {
                warn!("[AccountRegistry] Plan limits unavailable: {}", e);
                LimitsState::Unknown
            }
        };

        let snapshot = match accounts {
            Ok(accounts) => RegistrySnapshot::loaded(generation, limits, accounts),
            Err(e) => {
                error!("[AccountRegistry] Failed to load linked accounts: {}", e);
                RegistrySnapshot::failed(generation, limits, e.to_string())
            }
        };

        self.install(snapshot)
    }

    /// Reloads with the bearer token of the active session.
    pub async fn refresh(&self, session: &SessionResolver) -> Result<Arc<RegistrySnapshot>> {
        let token = session
            .bearer()
            .ok_or_else(|| Error::auth("No active session"))?;
        Ok(self.load(&token).await)
    }

    /// Forgets everything, e.g. after sign out. Loads still in flight are discarded.
    pub fn reset(&self) {
        let generation = self.next_generation();
        self.install(RegistrySnapshot::not_loaded(generation));
    }

    fn install(&self, snapshot: RegistrySnapshot) -> Arc<RegistrySnapshot> {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        if snapshot.generation() > current.generation() {
            info!(
                "[AccountRegistry] Installed snapshot #{} ({} accounts)",
                snapshot.generation(),
                snapshot.accounts().len()
            );
            *current = Arc::new(snapshot);
        } else {
            debug!(
                "[AccountRegistry] Discarding stale snapshot #{} (current #{})",
                snapshot.generation(),
                current.generation()
            );
        }
        Arc::clone(&current)
    }
}

impl SessionEventSink for AccountRegistry {
    /// The snapshot belongs to the session that loaded it.
    fn emit(&self, event: SessionEvent) {
        match event {
            SessionEvent::Ended { user_id, reason } => {
                info!(
                    "[AccountRegistry] Dropping accounts of {} after session end ({:?})",
                    user_id, reason
                );
                self.reset();
            }
        }
    }
}

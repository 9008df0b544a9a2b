use log::{debug, info, warn};
use std::sync::Arc;

use super::queue::{KeyedQueue, LinkReservations, Reservation};
use crate::broker::BrokerLinkApi;
use crate::registry::AccountRegistry;
use crate::session::SessionResolver;
use brokerlink_core::accounts::{
    AccountKey, BrokerKind, LifecycleEvent, LifecycleState, LinkRequest,
};
use brokerlink_core::errors::{Error, Result, ValidationError};
use brokerlink_core::limits::LimitsState;
use brokerlink_core::registry::{RegistrySnapshot, RegistryStatus};

/// Result of an accepted link request.
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub key: AccountKey,
    /// Success notice from the server.
    pub message: String,
    /// Snapshot loaded after the link was accepted.
    pub snapshot: Arc<RegistrySnapshot>,
}

#[derive(Debug, Clone)]
pub enum UnlinkOutcome {
    Unlinked {
        key: AccountKey,
        message: Option<String>,
        snapshot: Arc<RegistrySnapshot>,
    },
    /// Another call unlinked the key while this one waited for its turn;
    /// nothing was sent.
    AlreadyAbsent { key: AccountKey },
}

/// Validates, submits and serializes link and unlink operations.
///
/// Calls for the same identity key wait for each other; calls for different
/// keys run independently. Every accepted mutation reloads the registry
/// before its turn ends.
pub struct LinkingWorkflow {
    session: Arc<SessionResolver>,
    registry: Arc<AccountRegistry>,
    api: Arc<dyn BrokerLinkApi>,
    queue: KeyedQueue,
    reservations: LinkReservations,
}

impl LinkingWorkflow {
    pub fn new(
        session: Arc<SessionResolver>,
        registry: Arc<AccountRegistry>,
        api: Arc<dyn BrokerLinkApi>,
    ) -> Self {
        Self {
            session,
            registry,
            api,
            queue: KeyedQueue::default(),
            reservations: LinkReservations::default(),
        }
    }

    fn bearer(&self) -> Result<String> {
        self.session
            .bearer()
            .ok_or_else(|| Error::auth("No active session"))
    }

    /// Links a new broker account.
    ///
    /// Validation, limit and duplicate checks fail locally without any
    /// request. A `success: false` answer comes back as
    /// [`Error::ServerRejection`] and leaves the registry untouched.
    pub async fn link(&self, request: LinkRequest) -> Result<LinkOutcome> {
        request.validate()?;
        let key = request.key();
        ensure_can_link(&self.registry.snapshot())?;
        let token = self.bearer()?;

        let slot = self.queue.slot(&key);
        let _turn = slot.turn().await;

        // Re-check against whatever the previous holder of the turn left behind.
        let snapshot = self.registry.snapshot();
        slot.sync(snapshot.contains(&key));
        if snapshot.contains(&key) {
            debug!("[LinkingWorkflow] {} is already linked", key);
            return Err(Error::AlreadyLinked(key));
        }
        ensure_can_link(&snapshot)?;
        let reservation = self.reserve_slot(&snapshot)?;

        let pending = slot
            .begin(LifecycleEvent::SubmitLink)
            .ok_or_else(|| Error::AlreadyLinked(key.clone()))?;
        info!("[LinkingWorkflow] Linking {}", key);

        let response = match self.api.link_account(&token, request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("[LinkingWorkflow] Link request for {} failed: {}", key, e);
                pending.fail();
                return Err(e);
            }
        };

        if !response.success {
            warn!(
                "[LinkingWorkflow] Link of {} rejected: {}",
                key, response.message
            );
            pending.fail();
            return Err(Error::ServerRejection(response.message));
        }

        let snapshot = self.registry.load(&token).await;
        drop(reservation);
        pending.succeed();
        info!("[LinkingWorkflow] Linked {}", key);

        Ok(LinkOutcome {
            key,
            message: response.message,
            snapshot,
        })
    }

    /// Unlinks an account by identity key.
    ///
    /// The delete is sent even when the key is missing from the snapshot,
    /// since the server holds the authoritative list. A non-2xx answer is
    /// returned as [`Error::Http`] with the server's detail and leaves the
    /// registry untouched.
    pub async fn unlink(&self, kind: BrokerKind, login: &str) -> Result<UnlinkOutcome> {
        let key = parse_key(kind, login)?;
        ensure_can_mutate(&self.registry.snapshot())?;
        let token = self.bearer()?;

        let slot = self.queue.slot(&key);
        let unlinks_seen = slot.completed_unlinks();
        let _turn = slot.turn().await;

        ensure_can_mutate(&self.registry.snapshot())?;
        if slot.completed_unlinks() != unlinks_seen {
            debug!("[LinkingWorkflow] {} was unlinked while waiting; nothing to send", key);
            return Ok(UnlinkOutcome::AlreadyAbsent { key });
        }

        let pending = slot.begin_unlink();
        info!("[LinkingWorkflow] Unlinking {}", key);

        let response = match self.api.unlink_account(&token, &key).await {
            Ok(response) => response,
            Err(e) => {
                warn!("[LinkingWorkflow] Unlink of {} failed: {}", key, e);
                pending.fail();
                return Err(e);
            }
        };

        slot.record_unlink();
        let snapshot = self.registry.load(&token).await;
        pending.succeed();
        info!("[LinkingWorkflow] Unlinked {}", key);

        Ok(UnlinkOutcome::Unlinked {
            key,
            message: response.message,
            snapshot,
        })
    }

    /// Holds one of the plan's remaining slots until the link settles.
    fn reserve_slot(&self, snapshot: &RegistrySnapshot) -> Result<Reservation<'_>> {
        let LimitsState::Known(limits) = snapshot.limits() else {
            return Err(Error::LimitsUnavailable);
        };
        self.reservations
            .reserve(limits.remaining_slots())
            .ok_or_else(|| {
                debug!(
                    "[LinkingWorkflow] {} remaining slot(s) held by links in flight",
                    self.reservations.in_flight()
                );
                Error::LimitExceeded {
                    plan: limits.plan_name().to_string(),
                    max: limits.max_accounts(),
                    current: limits.current_accounts(),
                }
            })
    }

    /// Current lifecycle state of `key`, for rendering pending indicators.
    pub fn lifecycle(&self, key: &AccountKey) -> LifecycleState {
        if let Some(slot) = self.queue.existing(key) {
            let state = slot.state();
            if state.is_pending() {
                return state;
            }
        }
        LifecycleState::stable(self.registry.snapshot().contains(key))
    }
}

fn ensure_can_mutate(snapshot: &RegistrySnapshot) -> Result<()> {
    match snapshot.status() {
        RegistryStatus::Ready => Ok(()),
        RegistryStatus::NotLoaded => Err(Error::RegistryUnavailable(
            "linked accounts have not been loaded".to_string(),
        )),
        RegistryStatus::Failed(detail) => Err(Error::RegistryUnavailable(detail.clone())),
    }
}

fn ensure_can_link(snapshot: &RegistrySnapshot) -> Result<()> {
    ensure_can_mutate(snapshot)?;
    match snapshot.limits() {
        LimitsState::Unknown => Err(Error::LimitsUnavailable),
        LimitsState::Known(limits) if !limits.can_add_account() => Err(Error::LimitExceeded {
            plan: limits.plan_name().to_string(),
            max: limits.max_accounts(),
            current: limits.current_accounts(),
        }),
        LimitsState::Known(_) => Ok(()),
    }
}

/// Builds the identity key for an unlink, canonicalizing MT5 logins.
fn parse_key(kind: BrokerKind, login: &str) -> Result<AccountKey> {
    let login = login.trim();
    match kind {
        BrokerKind::Mt5 => {
            if login.is_empty() {
                return Err(ValidationError::MissingField("mt5_login").into());
            }
            let login = login
                .parse::<i64>()
                .map_err(|_| ValidationError::invalid("mt5_login", "must be an integer"))?;
            Ok(AccountKey::mt5(login))
        }
        BrokerKind::Capital => {
            if login.is_empty() {
                return Err(ValidationError::MissingField("capital_login").into());
            }
            Ok(AccountKey::capital(login))
        }
    }
}

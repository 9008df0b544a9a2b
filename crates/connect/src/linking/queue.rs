//! Per-identity-key serialization of link and unlink calls, plus the count
//! of links still in flight.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use brokerlink_core::accounts::{AccountKey, LifecycleEvent, LifecycleState};

/// One slot per identity key. Holding `turn` grants the right to mutate
/// the key; `state` tracks where the key is in its lifecycle.
pub(crate) struct KeySlot {
    turn: tokio::sync::Mutex<()>,
    state: Mutex<LifecycleState>,
    unlinks: AtomicU64,
}

impl KeySlot {
    fn new() -> Self {
        Self {
            turn: tokio::sync::Mutex::new(()),
            state: Mutex::new(LifecycleState::Absent),
            unlinks: AtomicU64::new(0),
        }
    }

    pub(crate) async fn turn(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.turn.lock().await
    }

    pub(crate) fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Aligns the slot with the registry. Only valid while holding the turn.
    pub(crate) fn sync(&self, linked: bool) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = LifecycleState::stable(linked);
    }

    /// Moves the slot into its pending state. The returned guard falls back
    /// to the prior stable state unless settled, including when the calling
    /// future is dropped mid-flight.
    pub(crate) fn begin(&self, event: LifecycleEvent) -> Option<Pending<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let next = state.transition(event)?;
        *state = next;
        Some(Pending {
            slot: self,
            settled: false,
        })
    }

    /// Enters `PendingUnlink` from whatever stable state the slot is in.
    /// The server decides whether the key exists; a failure falls back to `Linked`.
    pub(crate) fn begin_unlink(&self) -> Pending<'_> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = LifecycleState::PendingUnlink;
        Pending {
            slot: self,
            settled: false,
        }
    }

    /// Number of deletes completed through this slot.
    pub(crate) fn completed_unlinks(&self) -> u64 {
        self.unlinks.load(Ordering::SeqCst)
    }

    /// Records a completed delete. Only valid while holding the turn.
    pub(crate) fn record_unlink(&self) {
        self.unlinks.fetch_add(1, Ordering::SeqCst);
    }

    fn apply(&self, event: LifecycleEvent) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = state.transition(event) {
            *state = next;
        }
    }
}

pub(crate) struct Pending<'a> {
    slot: &'a KeySlot,
    settled: bool,
}

impl Pending<'_> {
    pub(crate) fn succeed(mut self) {
        self.settled = true;
        self.slot.apply(LifecycleEvent::Succeeded);
    }

    pub(crate) fn fail(mut self) {
        self.settled = true;
        self.slot.apply(LifecycleEvent::Failed);
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.slot.apply(LifecycleEvent::Failed);
        }
    }
}

#[derive(Default)]
pub(crate) struct KeyedQueue {
    slots: Mutex<HashMap<AccountKey, Arc<KeySlot>>>,
}

impl KeyedQueue {
    /// Leases the slot for `key`, creating it on first use.
    pub(crate) fn slot(&self, key: &AccountKey) -> SlotLease<'_> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = Arc::clone(
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(KeySlot::new())),
        );
        SlotLease {
            queue: self,
            key: key.clone(),
            slot,
        }
    }

    pub(crate) fn existing(&self, key: &AccountKey) -> Option<Arc<KeySlot>> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Drops the slot for `key` once only the map and the releasing lease hold it.
    fn release(&self, key: &AccountKey) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = slots
            .get(key)
            .map(|slot| Arc::strong_count(slot) <= 2 && !slot.state().is_pending())
            .unwrap_or(false);
        if idle {
            slots.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A caller's hold on a [`KeySlot`]. The last lease to go prunes the slot.
pub(crate) struct SlotLease<'a> {
    queue: &'a KeyedQueue,
    key: AccountKey,
    slot: Arc<KeySlot>,
}

impl Deref for SlotLease<'_> {
    type Target = KeySlot;

    fn deref(&self) -> &KeySlot {
        &self.slot
    }
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        self.queue.release(&self.key);
    }
}

/// Links submitted but not yet reflected in a snapshot. They count against
/// the plan's remaining slots.
#[derive(Default)]
pub(crate) struct LinkReservations {
    in_flight: Mutex<i64>,
}

impl LinkReservations {
    /// Takes one of `remaining` slots, or `None` when in-flight links hold them all.
    pub(crate) fn reserve(&self, remaining: i64) -> Option<Reservation<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if *in_flight >= remaining {
            return None;
        }
        *in_flight += 1;
        Some(Reservation { owner: self })
    }

    pub(crate) fn in_flight(&self) -> i64 {
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct Reservation<'a> {
    owner: &'a LinkReservations,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        *self
            .owner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner) -= 1;
    }
}

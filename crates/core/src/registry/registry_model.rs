//! Account registry snapshot.

use std::collections::HashSet;

use log::warn;
use serde::Serialize;

use crate::accounts::{AccountKey, CapitalAccount, LinkedAccount, Mt5Account};
use crate::limits::LimitsState;

/// Whether the snapshot can back mutating actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryStatus {
    /// Nothing loaded yet.
    NotLoaded,
    Ready,
    /// The accounts fetch failed; mutations stay blocked until a reload succeeds.
    Failed(String),
}

/// A violated registry invariant, reported alongside the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryInconsistency {
    /// `limits.current_accounts` disagrees with the number of listed accounts.
    CountMismatch { reported: u32, listed: usize },
    /// The same identity key was listed more than once; only the first entry is kept.
    DuplicateAccounts { keys: Vec<AccountKey> },
}

/// Cached view of plan limits and linked accounts.
///
/// Built only by the registry's load; replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    generation: u64,
    status: RegistryStatus,
    limits: LimitsState,
    accounts: Vec<LinkedAccount>,
    inconsistencies: Vec<RegistryInconsistency>,
}

impl Default for RegistrySnapshot {
    fn default() -> Self {
        Self {
            generation: 0,
            status: RegistryStatus::NotLoaded,
            limits: LimitsState::Unknown,
            accounts: Vec::new(),
            inconsistencies: Vec::new(),
        }
    }
}

impl RegistrySnapshot {
    /// Builds a snapshot from a successful accounts fetch, deduplicating by
    /// identity key and checking the count invariant against `limits`.
    pub fn loaded(generation: u64, limits: LimitsState, accounts: Vec<LinkedAccount>) -> Self {
        // The server's count refers to what it listed, duplicates included.
        let listed = accounts.len();
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        let mut unique = Vec::with_capacity(accounts.len());
        for account in accounts {
            let key = account.key();
            if seen.insert(key.clone()) {
                unique.push(account);
            } else if !duplicates.contains(&key) {
                duplicates.push(key);
            }
        }

        let mut inconsistencies = Vec::new();
        if !duplicates.is_empty() {
            inconsistencies.push(RegistryInconsistency::DuplicateAccounts { keys: duplicates });
        }
        if let Some(known) = limits.known() {
            if known.current_accounts() as usize != listed {
                inconsistencies.push(RegistryInconsistency::CountMismatch {
                    reported: known.current_accounts(),
                    listed,
                });
            }
        }

        for inconsistency in &inconsistencies {
            warn!("[AccountRegistry] Inconsistent snapshot: {:?}", inconsistency);
        }

        Self {
            generation,
            status: RegistryStatus::Ready,
            limits,
            accounts: unique,
            inconsistencies,
        }
    }

    /// An empty snapshot that supersedes everything older than `generation`.
    pub fn not_loaded(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    /// Builds a snapshot for a failed accounts fetch.
    pub fn failed(generation: u64, limits: LimitsState, detail: impl Into<String>) -> Self {
        Self {
            generation,
            status: RegistryStatus::Failed(detail.into()),
            limits,
            accounts: Vec::new(),
            inconsistencies: Vec::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> &RegistryStatus {
        &self.status
    }

    pub fn limits(&self) -> &LimitsState {
        &self.limits
    }

    pub fn accounts(&self) -> &[LinkedAccount] {
        &self.accounts
    }

    pub fn inconsistencies(&self) -> &[RegistryInconsistency] {
        &self.inconsistencies
    }

    pub fn is_consistent(&self) -> bool {
        self.inconsistencies.is_empty()
    }

    /// Mutating actions are allowed only on a successfully loaded snapshot.
    pub fn can_mutate(&self) -> bool {
        self.status == RegistryStatus::Ready
    }

    pub fn can_link(&self) -> bool {
        self.can_mutate() && self.limits.can_add_account()
    }

    pub fn find(&self, key: &AccountKey) -> Option<&LinkedAccount> {
        self.accounts.iter().find(|a| &a.key() == key)
    }

    pub fn contains(&self, key: &AccountKey) -> bool {
        self.find(key).is_some()
    }

    pub fn mt5_accounts(&self) -> impl Iterator<Item = &Mt5Account> {
        self.accounts.iter().filter_map(|a| match a {
            LinkedAccount::Mt5(acc) => Some(acc),
            _ => None,
        })
    }

    pub fn capital_accounts(&self) -> impl Iterator<Item = &CapitalAccount> {
        self.accounts.iter().filter_map(|a| match a {
            LinkedAccount::Capital(acc) => Some(acc),
            _ => None,
        })
    }
}

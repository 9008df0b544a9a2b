//! Plan limit models.

use serde::Serialize;

/// Account limits of the user's subscription plan.
///
/// Only `max_accounts` and `current_accounts` are inputs; the remaining
/// fields are derived on construction, so the invariant
/// `remaining_slots == max_accounts - current_accounts` and
/// `can_add_account == (remaining_slots > 0)` always holds. Instances are
/// replaced, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    plan_name: String,
    max_accounts: u32,
    current_accounts: u32,
    remaining_slots: i64,
    can_add_account: bool,
}

impl PlanLimits {
    pub fn new(plan_name: impl Into<String>, max_accounts: u32, current_accounts: u32) -> Self {
        let remaining_slots = i64::from(max_accounts) - i64::from(current_accounts);
        Self {
            plan_name: plan_name.into(),
            max_accounts,
            current_accounts,
            remaining_slots,
            can_add_account: remaining_slots > 0,
        }
    }

    /// Builds limits from values reported by the server, rejecting reports
    /// whose derived fields disagree with the counts.
    pub fn from_reported(
        plan_name: impl Into<String>,
        max_accounts: u32,
        current_accounts: u32,
        remaining_slots: i64,
        can_add_account: bool,
    ) -> Result<Self, LimitsMismatch> {
        let limits = Self::new(plan_name, max_accounts, current_accounts);
        if limits.remaining_slots != remaining_slots || limits.can_add_account != can_add_account
        {
            return Err(LimitsMismatch {
                expected_remaining: limits.remaining_slots,
                reported_remaining: remaining_slots,
                reported_can_add: can_add_account,
            });
        }
        Ok(limits)
    }

    pub fn plan_name(&self) -> &str {
        &self.plan_name
    }

    pub fn max_accounts(&self) -> u32 {
        self.max_accounts
    }

    pub fn current_accounts(&self) -> u32 {
        self.current_accounts
    }

    pub fn remaining_slots(&self) -> i64 {
        self.remaining_slots
    }

    pub fn can_add_account(&self) -> bool {
        self.can_add_account
    }
}

/// Server-reported limits that break the derived-field invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitsMismatch {
    pub expected_remaining: i64,
    pub reported_remaining: i64,
    pub reported_can_add: bool,
}

impl std::fmt::Display for LimitsMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "reported remaining_slots={} can_add_account={}, expected remaining_slots={}",
            self.reported_remaining, self.reported_can_add, self.expected_remaining
        )
    }
}

/// Limits as held by the registry: known, or unknown after a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "limits", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LimitsState {
    Known(PlanLimits),
    Unknown,
}

impl LimitsState {
    pub fn known(&self) -> Option<&PlanLimits> {
        match self {
            LimitsState::Known(limits) => Some(limits),
            LimitsState::Unknown => None,
        }
    }

    /// `false` while limits are unknown, since nothing can be evaluated.
    pub fn can_add_account(&self) -> bool {
        self.known().map(PlanLimits::can_add_account).unwrap_or(false)
    }
}

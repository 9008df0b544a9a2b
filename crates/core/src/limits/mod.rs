//! Plan limits module - subscription account limits.

mod limits_model;

pub use limits_model::{LimitsMismatch, LimitsState, PlanLimits};

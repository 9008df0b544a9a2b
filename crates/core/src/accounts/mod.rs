//! Accounts module - linked broker accounts, link requests and their lifecycle.

mod accounts_constants;
mod accounts_lifecycle;
mod accounts_model;


// Re-export the public interface
pub use accounts_constants::*;
pub use accounts_lifecycle::{LifecycleEvent, LifecycleState};
pub use accounts_model::{
    AccountKey, BrokerKind, CapitalAccount, LinkForm, LinkRequest, LinkedAccount, Mt5Account,
};

//! Registry module - the cached view of plan limits and linked accounts.

mod registry_model;

pub use registry_model::{RegistryInconsistency, RegistrySnapshot, RegistryStatus};

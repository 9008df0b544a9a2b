//! Brokerlink Core - Domain entities for session-gated broker account linking.
//!
//! This crate holds the I/O-free part of the system: sessions and their
//! states, route guard decisions, linked accounts and link requests, plan
//! limits, the registry snapshot and the error taxonomy. Network access
//! lives in `brokerlink-connect`.

pub mod accounts;
pub mod errors;
pub mod guard;
pub mod limits;
pub mod registry;
pub mod secrets;
pub mod session;

// Re-export error types
pub use errors::Error;
pub use errors::Result;

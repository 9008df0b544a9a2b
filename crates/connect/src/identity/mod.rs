//! Identity service: credential exchange, registration and token lookups.

mod client;
mod traits;

pub use client::IdentityClient;
pub use traits::IdentityProvider;

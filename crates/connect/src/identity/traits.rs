use async_trait::async_trait;

use brokerlink_core::errors::Result;
use brokerlink_core::secrets::Secret;
use brokerlink_core::session::{IdentityUser, Session, SignUpProfile};

/// Trait for the external identity service.
///
/// Rejected credentials and invalid tokens are reported as `Error::Auth`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange email and password for a session.
    async fn sign_in_with_password(&self, email: &str, password: &Secret) -> Result<Session>;

    /// Create the identity record. The session is `None` while the service
    /// waits for the email address to be confirmed.
    async fn sign_up(&self, profile: &SignUpProfile) -> Result<(IdentityUser, Option<Session>)>;

    /// Look up the identity record behind `token`.
    async fn get_user(&self, token: &str) -> Result<IdentityUser>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session>;

    /// Invalidate `token` on the identity service.
    async fn sign_out(&self, token: &str) -> Result<()>;

    /// Ask the identity service to send a password reset mail.
    async fn request_password_reset(&self, email: &str, redirect_to: Option<&str>) -> Result<()>;
}

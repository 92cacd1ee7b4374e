use async_trait::async_trait;
use thiserror::Error;

use crate::models::session::{AuthSession, Credentials, RefreshResult};
use crate::models::user::Principal;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider understood the request and refused it (bad credentials,
    /// expired token, consumed reset code, ...).
    #[error("rejected by identity provider ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Transport failure, 5xx or an unreadable response.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, ProviderError::Rejected { .. })
    }
}

/// Result of a sign-up. The provider only returns a session when the account
/// does not need email confirmation.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: Principal,
    pub session: Option<AuthSession>,
}

/// Capabilities the portal needs from the hosted identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the user behind the presented credentials, rotating the token
    /// pair when the access token is no longer accepted.
    ///
    /// Rejections are reported as an anonymous result, not as an error.
    async fn get_current_user(&self, credentials: &Credentials)
        -> Result<RefreshResult, ProviderError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ProviderError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, ProviderError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError>;

    /// Ask the provider to mail a single-use reset code linked to
    /// `redirect_to?code=<code>`.
    async fn send_password_reset_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ProviderError>;

    /// Trade a reset code for a short-lived recovery session. Codes are
    /// single-use: once exchanged, only the returned session can complete
    /// the reset.
    async fn exchange_reset_code(&self, code: &str) -> Result<AuthSession, ProviderError>;

    async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<Principal, ProviderError>;

    /// Role names assigned to `user_id`.
    async fn query_roles(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Vec<String>, ProviderError>;
}

//! Password reset handshake.
//!
//! 1. `request_reset` asks the provider to mail a single-use code linked to
//!    the reset page.
//! 2. The reset page reads `code` from its URL ([`ResetPage::from_query`]).
//! 3. `perform_reset` trades the code for a recovery session and sets the
//!    new password with it. If the provider refuses the password, the
//!    recovery session is handed back so the user can try another one.

use validator::Validate;

use crate::dtos::ResetPasswordForm;
use crate::error::AuthFailure;
use crate::models::session::AuthSession;
use crate::models::route::LOGIN_PATH;
use crate::services::identity::{IdentityProvider, ProviderError};

/// Reset page state at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetPage {
    CodePresent(String),
    /// Terminal; nothing can be submitted from here.
    CodeMissing,
}

impl ResetPage {
    pub fn from_query(code: Option<&str>) -> Self {
        match code.map(str::trim).filter(|code| !code.is_empty()) {
            Some(code) => ResetPage::CodePresent(code.to_string()),
            None => ResetPage::CodeMissing,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ResetPage::CodePresent(code) => Some(code),
            ResetPage::CodeMissing => None,
        }
    }
}

/// Where the client navigates after a successful reset.
pub const RESET_SUCCESS_REDIRECT: &str = LOGIN_PATH;

/// Send the reset email. Success does not imply the address is registered.
pub async fn request_reset(
    provider: &dyn IdentityProvider,
    email: &str,
    redirect_to: &str,
) -> Result<(), AuthFailure> {
    provider
        .send_password_reset_email(email, redirect_to)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Password reset request failed");
            AuthFailure::from(e)
        })?;

    tracing::info!("Password reset email requested");
    Ok(())
}

/// A failed reset attempt. When the code was already exchanged, `recovery`
/// holds the resulting session: the code is spent, so the next submit has to
/// use this session instead.
#[derive(Debug)]
pub struct ResetFailure {
    pub failure: AuthFailure,
    pub recovery: Option<AuthSession>,
}

impl From<AuthFailure> for ResetFailure {
    fn from(failure: AuthFailure) -> Self {
        Self {
            failure,
            recovery: None,
        }
    }
}

/// Complete the reset. Local checks run before any provider call: a missing
/// code is terminal, a bad or mismatched password is a validation failure.
///
/// `recovery_token` is the access token of a recovery session kept from an
/// earlier attempt. It is tried before the code; an expired one falls back to
/// the code.
pub async fn perform_reset(
    provider: &dyn IdentityProvider,
    form: &ResetPasswordForm,
    recovery_token: Option<&str>,
) -> Result<(), ResetFailure> {
    let page = ResetPage::from_query(form.code.as_deref());
    let Some(code) = page.code() else {
        return Err(AuthFailure::TokenMissing.into());
    };

    form.validate()
        .map_err(|errors| AuthFailure::from_validation(&errors))?;

    if let Some(token) = recovery_token {
        match provider.update_password(token, &form.password).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Password updated with kept recovery session");
                return Ok(());
            }
            Err(ProviderError::Rejected { status: 401, .. }) => {
                tracing::debug!("Recovery session expired, exchanging reset code");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Password update failed");
                return Err(AuthFailure::from(e).into());
            }
        }
    }

    let session = provider
        .exchange_reset_code(code)
        .await
        .map_err(|e| match e {
            ProviderError::Rejected { message, .. } => {
                tracing::warn!(%message, "Reset code rejected");
                AuthFailure::TokenInvalid(message)
            }
            other => AuthFailure::from(other),
        })?;

    match provider
        .update_password(&session.tokens.access_token, &form.password)
        .await
    {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "Password updated via reset link");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, user_id = %session.user.id, "Password update failed");
            Err(ResetFailure {
                failure: AuthFailure::from(e),
                recovery: Some(session),
            })
        }
    }
}

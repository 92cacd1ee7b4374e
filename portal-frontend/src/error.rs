use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use validator::ValidationErrors;

use crate::dtos::ActionResult;
use crate::services::identity::ProviderError;

pub const MISSING_TOKEN_MESSAGE: &str =
    "Missing reset token. Please use the reset link from your email.";
pub const PROVIDER_UNAVAILABLE_MESSAGE: &str =
    "Authentication service is unavailable. Please try again later.";

/// Failures of the authentication actions, reported to the UI as an
/// [`ActionResult`] rather than raised.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("{0}")]
    Authentication(String),

    /// Local check failed; no provider call was made.
    #[error("{0}")]
    Validation(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Terminal: the reset page was opened without a code.
    #[error("{}", MISSING_TOKEN_MESSAGE)]
    TokenMissing,

    /// The code was rejected or already used; a new reset email is needed.
    #[error("{0}")]
    TokenInvalid(String),
}

impl AuthFailure {
    pub fn from_validation(errors: &ValidationErrors) -> Self {
        AuthFailure::Validation(first_validation_message(errors))
    }

    /// Message safe to show to the user.
    pub fn user_message(&self) -> String {
        match self {
            AuthFailure::ProviderUnavailable(_) => PROVIDER_UNAVAILABLE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthFailure::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl From<ProviderError> for AuthFailure {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected { message, .. } => AuthFailure::Authentication(message),
            ProviderError::Unavailable(message) => AuthFailure::ProviderUnavailable(message),
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        if let AuthFailure::ProviderUnavailable(detail) = &self {
            tracing::error!(detail = %detail, "Identity provider unavailable");
        }
        (self.status(), Json(ActionResult::failure(self.user_message()))).into_response()
    }
}

/// First message in field order, so the same input always reports the same
/// error.
pub fn first_validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .into_iter()
        .flat_map(|(_, errs)| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid input".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_becomes_authentication_failure() {
        let failure: AuthFailure = ProviderError::Rejected {
            status: 400,
            message: "Invalid login credentials".to_string(),
        }
        .into();
        assert_eq!(
            failure,
            AuthFailure::Authentication("Invalid login credentials".to_string())
        );
        assert_eq!(failure.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn unavailable_hides_transport_detail() {
        let failure: AuthFailure =
            ProviderError::Unavailable("connection refused".to_string()).into();
        assert_eq!(failure.user_message(), PROVIDER_UNAVAILABLE_MESSAGE);
        assert_eq!(failure.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn missing_token_message_is_fixed() {
        assert_eq!(AuthFailure::TokenMissing.user_message(), MISSING_TOKEN_MESSAGE);
    }
}

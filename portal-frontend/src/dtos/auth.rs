use serde::{Deserialize, Serialize};
use validator::Validate;

/// Structured outcome of every form action. The UI decides how to present it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            redirect_to: None,
        }
    }

    pub fn redirect(to: &str) -> Self {
        Self {
            redirect_to: Some(to.to_string()),
            ..Self::ok()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            redirect_to: None,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupForm {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordForm {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

/// Query string of the reset page, as found in the emailed link.
#[derive(Debug, Deserialize, Default)]
pub struct ResetPageQuery {
    pub code: Option<String>,
}

/// Submitted new password. `code` is the value the page extracted from its
/// URL at load time and is echoed back by the client.
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub code: Option<String>,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

/// Page load of a public auth page. `signed_in` lets the client skip the
/// form for users who already hold a session.
#[derive(Debug, Serialize)]
pub struct AuthPageView {
    pub page: &'static str,
    pub signed_in: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetPageView {
    /// `code_present` or `code_missing`.
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_omits_redirect() {
        let json = serde_json::to_value(ActionResult::failure("nope")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "nope"}));
    }

    #[test]
    fn redirect_is_successful() {
        let json = serde_json::to_value(ActionResult::redirect("/login")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "redirect_to": "/login"})
        );
    }

    #[test]
    fn signup_requires_matching_confirmation() {
        let form = SignupForm {
            email: "user@example.com".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret2".to_string(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("confirm_password"));
    }

    #[test]
    fn login_rejects_malformed_email() {
        let form = LoginForm {
            email: "not-an-email".to_string(),
            password: "secret1".to_string(),
        };
        assert!(form.validate().is_err());
    }
}

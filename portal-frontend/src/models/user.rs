use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::route::LOGIN_PATH;

/// Authenticated user record as reported by the identity provider.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
    /// Role names assigned through the `user_roles` join; filled in by the
    /// session guard.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    pub fn name(&self) -> String {
        self.email
            .split('@')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("User")
            .to_string()
    }

    pub fn initials(&self) -> String {
        let initials: String = self.name().chars().take(2).collect();
        initials.to_uppercase()
    }
}

/// Principal resolved by the session guard for the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| Redirect::to(LOGIN_PATH).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(email: &str) -> Principal {
        Principal {
            id: "user_123".to_string(),
            email: email.to_string(),
            last_sign_in_at: None,
            roles: vec!["admin".to_string()],
        }
    }

    #[test]
    fn name_and_initials_come_from_email() {
        let p = principal("jane.doe@example.com");
        assert_eq!(p.name(), "jane.doe");
        assert_eq!(p.initials(), "JA");
    }

    #[test]
    fn empty_email_falls_back() {
        let p = principal("");
        assert_eq!(p.name(), "User");
        assert_eq!(p.initials(), "US");
    }

    #[test]
    fn deserializes_provider_user_payload() {
        let p: Principal = serde_json::from_str(
            r#"{"id":"u1","email":"user@example.com","last_sign_in_at":"2024-05-01T10:00:00Z","aud":"authenticated"}"#,
        )
        .unwrap();
        assert_eq!(p.id, "u1");
        assert!(p.last_sign_in_at.is_some());
        assert!(p.roles.is_empty());
    }
}

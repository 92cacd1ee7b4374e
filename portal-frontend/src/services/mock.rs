use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::session::{AuthSession, Credentials, RefreshResult, SessionTokens};
use crate::models::user::Principal;
use crate::services::identity::{IdentityProvider, ProviderError, SignUpOutcome};

/// A password reset email captured by [`MockIdentityProvider`].
#[derive(Debug, Clone)]
pub struct SentResetEmail {
    pub email: String,
    pub link: String,
}

#[derive(Default)]
struct MockState {
    passwords: HashMap<String, String>,
    users: HashMap<String, Principal>,
    roles: HashMap<String, Vec<String>>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    reset_codes: HashMap<String, String>,
    sent_emails: Vec<SentResetEmail>,
    calls: Vec<&'static str>,
    unavailable: bool,
    password_rejection: Option<String>,
}

/// In-memory identity provider with single-use reset codes and rotating
/// refresh tokens. Records every call for assertions.
#[derive(Default)]
pub struct MockIdentityProvider {
    state: Mutex<MockState>,
}

fn rejected(status: u16, message: &str) -> ProviderError {
    ProviderError::Rejected {
        status,
        message: message.to_string(),
    }
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, ProviderError> {
        self.state
            .lock()
            .map_err(|e| ProviderError::Unavailable(format!("Mock provider mutex poisoned: {}", e)))
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a confirmed user.
    pub fn add_user(&self, email: &str, password: &str) -> Principal {
        let mut state = self.state();
        let user = Principal {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            last_sign_in_at: None,
            roles: Vec::new(),
        };
        state.passwords.insert(email.to_string(), password.to_string());
        state.users.insert(user.id.clone(), user.clone());
        user
    }

    pub fn assign_role(&self, user_id: &str, role: &str) {
        self.state()
            .roles
            .entry(user_id.to_string())
            .or_default()
            .push(role.to_string());
    }

    /// Issue a session directly, bypassing `sign_in` and the call log.
    pub fn issue_session(&self, user_id: &str) -> SessionTokens {
        issue(&mut self.state(), user_id)
    }

    /// Invalidate an access token so the next validation must refresh.
    pub fn expire_access_token(&self, access_token: &str) {
        self.state().access_tokens.remove(access_token);
    }

    /// Make every subsequent call fail as if the provider were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Refuse the next password update with a 422 carrying `message`, the
    /// way the provider refuses a weak or unchanged password.
    pub fn reject_next_password_update(&self, message: &str) {
        self.state().password_rejection = Some(message.to_string());
    }

    pub fn password_of(&self, email: &str) -> Option<String> {
        self.state().passwords.get(email).cloned()
    }

    pub fn sent_emails(&self) -> Vec<SentResetEmail> {
        self.state().sent_emails.clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    fn begin(&self, operation: &'static str) -> Result<MutexGuard<'_, MockState>, ProviderError> {
        let mut state = self.lock()?;
        state.calls.push(operation);
        if state.unavailable {
            return Err(ProviderError::Unavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(state)
    }
}

fn issue(state: &mut MockState, user_id: &str) -> SessionTokens {
    let tokens = SessionTokens {
        access_token: format!("at-{}", Uuid::new_v4().simple()),
        refresh_token: format!("rt-{}", Uuid::new_v4().simple()),
        expires_in: Some(3600),
    };
    state
        .access_tokens
        .insert(tokens.access_token.clone(), user_id.to_string());
    state
        .refresh_tokens
        .insert(tokens.refresh_token.clone(), user_id.to_string());
    tokens
}

fn user_for_access(state: &MockState, access_token: &str) -> Option<Principal> {
    state
        .access_tokens
        .get(access_token)
        .and_then(|id| state.users.get(id))
        .cloned()
}

fn user_by_email(state: &MockState, email: &str) -> Option<Principal> {
    state.users.values().find(|u| u.email == email).cloned()
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn get_current_user(
        &self,
        credentials: &Credentials,
    ) -> Result<RefreshResult, ProviderError> {
        let mut state = self.begin("get_current_user")?;

        if let Some(user) = credentials
            .access_token
            .as_deref()
            .and_then(|token| user_for_access(&state, token))
        {
            return Ok(RefreshResult::valid(user));
        }

        let Some(user_id) = credentials
            .refresh_token
            .as_deref()
            .and_then(|token| state.refresh_tokens.remove(token))
        else {
            return Ok(RefreshResult::anonymous());
        };

        let Some(user) = state.users.get(&user_id).cloned() else {
            return Ok(RefreshResult::anonymous());
        };
        let tokens = issue(&mut state, &user_id);
        Ok(RefreshResult::refreshed(AuthSession { tokens, user }))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ProviderError> {
        let mut state = self.begin("sign_in")?;

        if state.passwords.get(email).map(String::as_str) != Some(password) {
            return Err(rejected(400, "Invalid login credentials"));
        }
        let mut user = user_by_email(&state, email)
            .ok_or_else(|| rejected(400, "Invalid login credentials"))?;

        user.last_sign_in_at = Some(Utc::now());
        state.users.insert(user.id.clone(), user.clone());
        let tokens = issue(&mut state, &user.id);
        Ok(AuthSession { tokens, user })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, ProviderError> {
        let mut state = self.begin("sign_up")?;

        if state.passwords.contains_key(email) {
            return Err(rejected(422, "User already registered"));
        }

        let user = Principal {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            last_sign_in_at: Some(Utc::now()),
            roles: Vec::new(),
        };
        state.passwords.insert(email.to_string(), password.to_string());
        state.users.insert(user.id.clone(), user.clone());
        let tokens = issue(&mut state, &user.id);

        Ok(SignUpOutcome {
            user: user.clone(),
            session: Some(AuthSession { tokens, user }),
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        let mut state = self.begin("sign_out")?;

        let Some(user_id) = state.access_tokens.remove(access_token) else {
            return Err(rejected(401, "invalid JWT"));
        };
        state.access_tokens.retain(|_, id| *id != user_id);
        state.refresh_tokens.retain(|_, id| *id != user_id);
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.begin("send_password_reset_email")?;

        // Unknown addresses succeed silently.
        if let Some(user) = user_by_email(&state, email) {
            let code = Uuid::new_v4().simple().to_string();
            state.reset_codes.insert(code.clone(), user.id);
            state.sent_emails.push(SentResetEmail {
                email: email.to_string(),
                link: format!("{}?code={}", redirect_to, code),
            });
        }
        Ok(())
    }

    async fn exchange_reset_code(&self, code: &str) -> Result<AuthSession, ProviderError> {
        let mut state = self.begin("exchange_reset_code")?;

        let user_id = state
            .reset_codes
            .remove(code)
            .ok_or_else(|| rejected(403, "Email link is invalid or has expired"))?;
        let user = state
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| rejected(404, "User not found"))?;
        let tokens = issue(&mut state, &user_id);
        Ok(AuthSession { tokens, user })
    }

    async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<Principal, ProviderError> {
        let mut state = self.begin("update_password")?;

        let user = user_for_access(&state, access_token)
            .ok_or_else(|| rejected(401, "invalid JWT"))?;
        if let Some(message) = state.password_rejection.take() {
            return Err(rejected(422, &message));
        }
        state
            .passwords
            .insert(user.email.clone(), new_password.to_string());
        Ok(user)
    }

    async fn query_roles(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let state = self.begin("query_roles")?;

        if user_for_access(&state, access_token).is_none() {
            return Err(rejected(401, "JWT expired"));
        }
        Ok(state.roles.get(user_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refresh_rotates_and_consumes_token() {
        let provider = MockIdentityProvider::new();
        let user = provider.add_user("user@example.com", "secret1");
        let tokens = provider.issue_session(&user.id);
        provider.expire_access_token(&tokens.access_token);

        let credentials = Credentials {
            access_token: Some(tokens.access_token.clone()),
            refresh_token: Some(tokens.refresh_token.clone()),
        };

        let first = provider.get_current_user(&credentials).await.unwrap();
        assert_eq!(first.user.unwrap().id, user.id);
        assert!(first.updated_credentials.is_some());

        // The old refresh token was consumed.
        let second = provider.get_current_user(&credentials).await.unwrap();
        assert!(second.user.is_none());
    }

    #[tokio::test]
    async fn unknown_email_gets_no_reset_mail() {
        let provider = MockIdentityProvider::new();
        provider
            .send_password_reset_email("nobody@example.com", "http://localhost/reset-password")
            .await
            .unwrap();
        assert!(provider.sent_emails().is_empty());
        assert_eq!(provider.call_count(), 1);
    }
}

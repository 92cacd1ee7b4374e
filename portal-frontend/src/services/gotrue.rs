use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use service_core::observability::{TracedClientExt, TracedRequest};
use std::time::Duration;

use crate::config::ProviderSettings;
use crate::models::session::{AuthSession, Credentials, RefreshResult, SessionTokens};
use crate::models::user::Principal;
use crate::services::identity::{IdentityProvider, ProviderError, SignUpOutcome};
use crate::services::metrics::record_provider_call;

/// HTTP client for a GoTrue-compatible auth API plus the PostgREST data API
/// hosting the `user_roles` table.
pub struct GoTrueClient {
    client: Client,
    settings: ProviderSettings,
}

#[derive(Deserialize)]
struct TokenBody {
    #[serde(flatten)]
    tokens: SessionTokens,
    user: Principal,
}

impl From<TokenBody> for AuthSession {
    fn from(body: TokenBody) -> Self {
        AuthSession {
            tokens: body.tokens,
            user: body.user,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(TokenBody),
    User(Principal),
}

#[derive(Deserialize)]
struct RoleName {
    name: String,
}

#[derive(Deserialize)]
struct UserRoleRow {
    roles: Option<RoleName>,
}

impl GoTrueClient {
    pub fn new(settings: ProviderSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build identity provider client: {}", e))?;

        Ok(Self { client, settings })
    }

    pub fn base_url(&self) -> &str {
        self.settings.url.trim_end_matches('/')
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url(), path)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1{}", self.base_url(), path)
    }

    fn with_api_key(&self, request: TracedRequest) -> TracedRequest {
        request.header("apikey", self.settings.anon_key.expose_secret())
    }

    async fn send(
        &self,
        operation: &'static str,
        request: TracedRequest,
    ) -> Result<Response, ProviderError> {
        let result = match self.with_api_key(request).send().await {
            Ok(response) => check_status(response).await,
            Err(e) => {
                tracing::error!(operation, error = %e, "Identity provider request failed");
                Err(ProviderError::Unavailable(format!("HTTP request failed: {}", e)))
            }
        };

        record_provider_call(operation, result.is_ok());
        result
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Principal, ProviderError> {
        let response = self
            .send(
                "get_user",
                self.client
                    .traced_get(&self.auth_url("/user"))
                    .bearer_auth(access_token),
            )
            .await?;
        decode(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, ProviderError> {
        let response = self
            .send(
                "refresh_session",
                self.client
                    .traced_post(&self.auth_url("/token"))
                    .query(&[("grant_type", "refresh_token")])
                    .json(&json!({ "refresh_token": refresh_token })),
            )
            .await?;
        decode::<TokenBody>(response).await.map(Into::into)
    }
}

/// Pass 2xx through; turn anything else into a `ProviderError` carrying the
/// provider's own message.
async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    });

    if status.is_client_error() {
        Err(ProviderError::Rejected {
            status: status.as_u16(),
            message,
        })
    } else {
        tracing::error!(status = status.as_u16(), %message, "Identity provider error");
        Err(ProviderError::Unavailable(message))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    response.json::<T>().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to decode identity provider response");
        ProviderError::Unavailable(format!("Malformed provider response: {}", e))
    })
}

/// GoTrue reports errors under several field names depending on the endpoint.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn get_current_user(
        &self,
        credentials: &Credentials,
    ) -> Result<RefreshResult, ProviderError> {
        if let Some(access_token) = credentials.access_token.as_deref() {
            match self.fetch_user(access_token).await {
                Ok(user) => return Ok(RefreshResult::valid(user)),
                Err(e) if e.is_rejection() => {
                    tracing::debug!(error = %e, "Access token rejected, trying refresh");
                }
                Err(e) => return Err(e),
            }
        }

        let Some(refresh_token) = credentials.refresh_token.as_deref() else {
            return Ok(RefreshResult::anonymous());
        };

        match self.refresh(refresh_token).await {
            Ok(session) => {
                tracing::info!(user_id = %session.user.id, "Session refreshed");
                Ok(RefreshResult::refreshed(session))
            }
            Err(e) if e.is_rejection() => {
                tracing::debug!(error = %e, "Refresh token rejected");
                Ok(RefreshResult::anonymous())
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ProviderError> {
        let response = self
            .send(
                "sign_in",
                self.client
                    .traced_post(&self.auth_url("/token"))
                    .query(&[("grant_type", "password")])
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;
        decode::<TokenBody>(response).await.map(Into::into)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, ProviderError> {
        let response = self
            .send(
                "sign_up",
                self.client
                    .traced_post(&self.auth_url("/signup"))
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;

        Ok(match decode::<SignUpBody>(response).await? {
            SignUpBody::Session(body) => SignUpOutcome {
                user: body.user.clone(),
                session: Some(body.into()),
            },
            SignUpBody::User(user) => SignUpOutcome {
                user,
                session: None,
            },
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        self.send(
            "sign_out",
            self.client
                .traced_post(&self.auth_url("/logout"))
                .bearer_auth(access_token),
        )
        .await?;
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ProviderError> {
        self.send(
            "send_reset_email",
            self.client
                .traced_post(&self.auth_url("/recover"))
                .query(&[("redirect_to", redirect_to)])
                .json(&json!({ "email": email })),
        )
        .await?;
        Ok(())
    }

    /// Verifies `code` as a recovery `token_hash`. The project's recovery
    /// email template must link to `{{ .RedirectTo }}?code={{ .TokenHash }}`;
    /// the default PKCE `code` would need `/token?grant_type=pkce` with a code
    /// verifier instead, which a server-side flow does not hold.
    async fn exchange_reset_code(&self, code: &str) -> Result<AuthSession, ProviderError> {
        let response = self
            .send(
                "exchange_reset_code",
                self.client
                    .traced_post(&self.auth_url("/verify"))
                    .json(&json!({ "type": "recovery", "token_hash": code })),
            )
            .await?;
        decode::<TokenBody>(response).await.map(Into::into)
    }

    async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<Principal, ProviderError> {
        let response = self
            .send(
                "update_password",
                self.client
                    .traced_put(&self.auth_url("/user"))
                    .bearer_auth(access_token)
                    .json(&json!({ "password": new_password })),
            )
            .await?;
        decode(response).await
    }

    async fn query_roles(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let user_filter = format!("eq.{}", user_id);
        let response = self
            .send(
                "query_roles",
                self.client
                    .traced_get(&self.rest_url("/user_roles"))
                    .query(&[
                        ("select", "id,roles:role_id(name)"),
                        ("user_id", user_filter.as_str()),
                    ])
                    .bearer_auth(access_token),
            )
            .await?;

        let rows: Vec<UserRoleRow> = decode(response).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.roles.map(|role| role.name))
            .collect())
    }
}

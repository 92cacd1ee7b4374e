//! Session guard: runs before every application route.
//!
//! Reading cookies, validating them with the provider and deciding what to do
//! are separate steps that pass values along. The decision carries every
//! cookie the validation produced, so the middleware cannot lose a rotated
//! token pair on the way to the response.

use axum::{
    extract::{Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::Cookie;
use service_core::error::AppError;
use std::collections::HashSet;

use crate::config::GuardSettings;
use crate::models::route::{RouteClass, RouteTable, LOGIN_PATH};
use crate::models::session::{CookiePolicy, CookieSet, Credentials, RefreshResult};
use crate::models::user::Principal;
use crate::services::identity::IdentityProvider;
use crate::services::metrics::record_guard_decision;
use crate::AppState;

#[derive(Debug)]
pub enum GuardDecision {
    /// Continue to the handler. `cookies` must reach both the handler's view
    /// of the request and the outgoing response.
    Proceed {
        principal: Option<Principal>,
        cookies: Vec<Cookie<'static>>,
    },
    /// No session on a protected path. Browser cookies stay untouched.
    RedirectToLogin,
    /// Signed in without any role while roles are required.
    Forbidden { cookies: Vec<Cookie<'static>> },
}

impl GuardDecision {
    pub fn outcome(&self) -> &'static str {
        match self {
            GuardDecision::Proceed {
                principal: Some(_),
                ..
            } => "authenticated",
            GuardDecision::Proceed { principal: None, .. } => "public",
            GuardDecision::RedirectToLogin => "redirect",
            GuardDecision::Forbidden { .. } => "forbidden",
        }
    }
}

/// Pure decision step: route class plus validation result in, decision out.
pub fn decide(
    route: RouteClass,
    refresh: RefreshResult,
    policy: &CookiePolicy,
    require_role: bool,
) -> GuardDecision {
    let cookies = refresh
        .updated_credentials
        .as_ref()
        .map(|tokens| policy.issue(tokens))
        .unwrap_or_default();

    match (refresh.user, route) {
        (None, RouteClass::Protected) => GuardDecision::RedirectToLogin,
        (Some(user), RouteClass::Protected) if require_role && user.roles.is_empty() => {
            GuardDecision::Forbidden { cookies }
        }
        (principal, _) => GuardDecision::Proceed { principal, cookies },
    }
}

pub struct SessionGuard<'a> {
    provider: &'a dyn IdentityProvider,
    routes: &'a RouteTable,
    policy: &'a CookiePolicy,
    settings: &'a GuardSettings,
}

impl<'a> SessionGuard<'a> {
    pub fn new(
        provider: &'a dyn IdentityProvider,
        routes: &'a RouteTable,
        policy: &'a CookiePolicy,
        settings: &'a GuardSettings,
    ) -> Self {
        Self {
            provider,
            routes,
            policy,
            settings,
        }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(
            state.provider.as_ref(),
            &state.routes,
            &state.cookies,
            &state.settings.guard,
        )
    }

    pub async fn evaluate(&self, path: &str, inbound: &CookieSet) -> GuardDecision {
        let route = self.routes.classify(path);
        let credentials = self.policy.credentials(inbound);
        let refresh = self.resolve(&credentials).await;
        let refresh = self.attach_roles(refresh, &credentials).await;
        decide(route, refresh, self.policy, self.settings.require_role)
    }

    /// The single validation call. Provider failures count as "no user".
    async fn resolve(&self, credentials: &Credentials) -> RefreshResult {
        if credentials.is_empty() {
            return RefreshResult::anonymous();
        }

        match self.provider.get_current_user(credentials).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "Session validation failed, treating as signed out");
                RefreshResult::anonymous()
            }
        }
    }

    async fn attach_roles(
        &self,
        mut refresh: RefreshResult,
        credentials: &Credentials,
    ) -> RefreshResult {
        if !self.settings.load_roles {
            return refresh;
        }

        let access_token = refresh
            .updated_credentials
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
            .or_else(|| credentials.access_token.clone());

        let Some(access_token) = access_token else {
            return refresh;
        };

        if let Some(user) = refresh.user.as_mut() {
            match self.provider.query_roles(&access_token, &user.id).await {
                Ok(roles) => {
                    if roles.is_empty() {
                        tracing::debug!(user_id = %user.id, "User has no roles assigned");
                    }
                    user.roles = roles;
                }
                Err(e) => {
                    tracing::warn!(user_id = %user.id, error = %e, "Role lookup failed");
                }
            }
        }
        refresh
    }
}

pub async fn session_guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let inbound = CookieSet::from_headers(request.headers());

    let decision = SessionGuard::from_state(&state)
        .evaluate(&path, &inbound)
        .await;
    record_guard_decision(decision.outcome());
    tracing::debug!(path = %path, outcome = decision.outcome(), "Session guard decision");

    match decision {
        GuardDecision::RedirectToLogin => {
            tracing::info!(path = %path, "No session, redirecting to login");
            Redirect::to(LOGIN_PATH).into_response()
        }
        GuardDecision::Forbidden { cookies } => {
            tracing::warn!(path = %path, "Signed-in user has no role assigned");
            let mut response =
                AppError::Forbidden("No role assigned".to_string()).into_response();
            append_set_cookies(&mut response, &cookies);
            response
        }
        GuardDecision::Proceed { principal, cookies } => {
            if !cookies.is_empty() {
                let refreshed = inbound.with_writes(&cookies);
                replace_cookie_header(&mut request, &refreshed);
            }
            if let Some(principal) = principal {
                tracing::debug!(path = %path, user_id = %principal.id, "Session valid");
                request.extensions_mut().insert(principal);
            }

            let mut response = next.run(request).await;
            append_set_cookies(&mut response, &cookies);
            response
        }
    }
}

/// Make the handler see the rotated session instead of the stale one.
fn replace_cookie_header(request: &mut Request, cookies: &CookieSet) {
    let headers = request.headers_mut();
    headers.remove(COOKIE);
    if cookies.is_empty() {
        return;
    }
    match HeaderValue::from_str(&cookies.to_header_value()) {
        Ok(value) => {
            headers.insert(COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "Refreshed cookies are not a valid header"),
    }
}

/// Append guard cookies unless the handler already set a cookie of the same
/// name (e.g. logout clearing the session).
fn append_set_cookies(response: &mut Response, cookies: &[Cookie<'static>]) {
    let written: HashSet<String> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse_encoded(value).ok())
        .map(|cookie| cookie.name().to_string())
        .collect();

    for cookie in cookies.iter().filter(|c| !written.contains(c.name())) {
        match HeaderValue::from_str(&cookie.encoded().to_string()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!(cookie = cookie.name(), error = %e, "Invalid Set-Cookie value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSettings;
    use crate::models::session::SessionTokens;

    fn policy() -> CookiePolicy {
        CookiePolicy::new(&SessionSettings::default())
    }

    fn user(roles: &[&str]) -> Principal {
        Principal {
            id: "user-1".to_string(),
            email: "user@example.com".to_string(),
            last_sign_in_at: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn rotated() -> SessionTokens {
        SessionTokens {
            access_token: "at-new".to_string(),
            refresh_token: "rt-new".to_string(),
            expires_in: Some(3600),
        }
    }

    #[test]
    fn anonymous_protected_redirects() {
        let decision = decide(
            RouteClass::Protected,
            RefreshResult::anonymous(),
            &policy(),
            false,
        );
        assert!(matches!(decision, GuardDecision::RedirectToLogin));
    }

    #[test]
    fn anonymous_public_proceeds_without_cookies() {
        let decision = decide(RouteClass::Public, RefreshResult::anonymous(), &policy(), false);
        match decision {
            GuardDecision::Proceed { principal, cookies } => {
                assert!(principal.is_none());
                assert!(cookies.is_empty());
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn refreshed_session_carries_exactly_the_rotated_cookies() {
        let refresh = RefreshResult {
            user: Some(user(&[])),
            updated_credentials: Some(rotated()),
        };
        match decide(RouteClass::Protected, refresh, &policy(), false) {
            GuardDecision::Proceed { principal, cookies } => {
                assert_eq!(principal.unwrap().id, "user-1");
                let pairs: Vec<_> = cookies.iter().map(|c| (c.name(), c.value())).collect();
                assert_eq!(
                    pairs,
                    vec![("sb-access-token", "at-new"), ("sb-refresh-token", "rt-new")]
                );
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn valid_session_writes_nothing() {
        match decide(
            RouteClass::Protected,
            RefreshResult::valid(user(&[])),
            &policy(),
            false,
        ) {
            GuardDecision::Proceed { cookies, .. } => assert!(cookies.is_empty()),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn role_requirement_keeps_rotated_cookies() {
        let refresh = RefreshResult {
            user: Some(user(&[])),
            updated_credentials: Some(rotated()),
        };
        match decide(RouteClass::Protected, refresh, &policy(), true) {
            GuardDecision::Forbidden { cookies } => assert_eq!(cookies.len(), 2),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn role_requirement_ignores_public_paths_and_users_with_roles() {
        let on_public = decide(
            RouteClass::Public,
            RefreshResult::valid(user(&[])),
            &policy(),
            true,
        );
        assert_eq!(on_public.outcome(), "authenticated");

        let with_role = decide(
            RouteClass::Protected,
            RefreshResult::valid(user(&["admin"])),
            &policy(),
            true,
        );
        assert_eq!(with_role.outcome(), "authenticated");
    }
}

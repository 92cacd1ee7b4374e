use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::config::SessionSettings;
use crate::models::route::RESET_PASSWORD_PATH;
use crate::models::user::Principal;

/// Token pair issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Session as returned by sign-in, refresh and code exchange.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub tokens: SessionTokens,
    pub user: Principal,
}

/// Whatever session material the browser presented. Either half may be
/// missing or stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Outcome of validating presented credentials.
///
/// `updated_credentials` is set when validation rotated the token pair; the
/// caller must hand those to the browser or the session is lost.
#[derive(Debug, Clone, Default)]
pub struct RefreshResult {
    pub user: Option<Principal>,
    pub updated_credentials: Option<SessionTokens>,
}

impl RefreshResult {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn valid(user: Principal) -> Self {
        Self {
            user: Some(user),
            updated_credentials: None,
        }
    }

    pub fn refreshed(session: AuthSession) -> Self {
        Self {
            user: Some(session.user),
            updated_credentials: Some(session.tokens),
        }
    }
}

/// Cookies presented on an inbound request, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSet {
    cookies: BTreeMap<String, String>,
}

impl CookieSet {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let jar = CookieJar::from_headers(headers);
        Self {
            cookies: jar
                .iter()
                .map(|c| (c.name().to_string(), c.value().to_string()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// The cookie set a downstream handler should see once `writes` have been
    /// applied. Expired (removal) cookies drop the entry.
    pub fn with_writes(&self, writes: &[Cookie<'static>]) -> Self {
        let mut cookies = self.cookies.clone();
        for cookie in writes {
            if is_removal(cookie) {
                cookies.remove(cookie.name());
            } else {
                cookies.insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }
        Self { cookies }
    }

    /// Render as a `Cookie` request header value.
    pub fn to_header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| Cookie::new(name.as_str(), value.as_str()).encoded().to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn is_removal(cookie: &Cookie<'_>) -> bool {
    cookie
        .max_age()
        .map(|age| age.is_zero() || age.is_negative())
        .unwrap_or(false)
}

/// Naming and attributes of the session cookies.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    access_name: String,
    refresh_name: String,
    recovery_name: String,
    secure: bool,
    refresh_max_age: time::Duration,
}

impl CookiePolicy {
    pub fn new(settings: &SessionSettings) -> Self {
        Self {
            access_name: format!("{}-access-token", settings.cookie_prefix),
            refresh_name: format!("{}-refresh-token", settings.cookie_prefix),
            recovery_name: format!("{}-recovery-token", settings.cookie_prefix),
            secure: settings.secure,
            refresh_max_age: time::Duration::days(settings.refresh_max_age_days),
        }
    }

    pub fn access_name(&self) -> &str {
        &self.access_name
    }

    pub fn recovery_name(&self) -> &str {
        &self.recovery_name
    }

    pub fn credentials(&self, cookies: &CookieSet) -> Credentials {
        let read = |name: &str| {
            cookies
                .get(name)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Credentials {
            access_token: read(&self.access_name),
            refresh_token: read(&self.refresh_name),
        }
    }

    /// Cookies that persist a freshly issued token pair.
    pub fn issue(&self, tokens: &SessionTokens) -> Vec<Cookie<'static>> {
        let access_max_age = tokens
            .expires_in
            .map(time::Duration::seconds)
            .unwrap_or(self.refresh_max_age);

        vec![
            self.build(self.access_name.clone(), tokens.access_token.clone(), access_max_age),
            self.build(
                self.refresh_name.clone(),
                tokens.refresh_token.clone(),
                self.refresh_max_age,
            ),
        ]
    }

    /// Cookies that remove the session from the browser.
    pub fn clear(&self) -> Vec<Cookie<'static>> {
        vec![
            self.build(self.access_name.clone(), String::new(), time::Duration::ZERO),
            self.build(self.refresh_name.clone(), String::new(), time::Duration::ZERO),
        ]
    }

    /// Access token of a recovery session whose password update was refused.
    /// Only sent back to the reset page.
    pub fn issue_recovery(&self, tokens: &SessionTokens) -> Cookie<'static> {
        let max_age = tokens
            .expires_in
            .map(time::Duration::seconds)
            .unwrap_or(time::Duration::hours(1));
        self.build_at(
            RESET_PASSWORD_PATH,
            self.recovery_name.clone(),
            tokens.access_token.clone(),
            max_age,
        )
    }

    pub fn clear_recovery(&self) -> Cookie<'static> {
        self.build_at(
            RESET_PASSWORD_PATH,
            self.recovery_name.clone(),
            String::new(),
            time::Duration::ZERO,
        )
    }

    fn build(&self, name: String, value: String, max_age: time::Duration) -> Cookie<'static> {
        self.build_at("/", name, value, max_age)
    }

    fn build_at(
        &self,
        path: &'static str,
        name: String,
        value: String,
        max_age: time::Duration,
    ) -> Cookie<'static> {
        Cookie::build((name, value))
            .path(path)
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(max_age)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    fn policy() -> CookiePolicy {
        CookiePolicy::new(&SessionSettings::default())
    }

    fn tokens(access: &str, refresh: &str) -> SessionTokens {
        SessionTokens {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_in: Some(3600),
        }
    }

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie.parse().unwrap());
        headers
    }

    #[test]
    fn reads_all_inbound_cookies() {
        let set = CookieSet::from_headers(&headers(
            "theme=dark; sb-access-token=at-1; sb-refresh-token=rt-1",
        ));
        assert_eq!(set.get("theme"), Some("dark"));
        assert_eq!(set.get("missing"), None);

        let credentials = policy().credentials(&set);
        assert_eq!(credentials.access_token.as_deref(), Some("at-1"));
        assert_eq!(credentials.refresh_token.as_deref(), Some("rt-1"));
    }

    #[test]
    fn empty_cookie_values_are_not_credentials() {
        let set = CookieSet::from_headers(&headers("sb-access-token=; other=1"));
        assert!(policy().credentials(&set).is_empty());
    }

    #[test]
    fn issued_cookies_carry_session_attributes() {
        let cookies = policy().issue(&tokens("at-2", "rt-2"));
        assert_eq!(cookies.len(), 2);

        let access = &cookies[0];
        assert_eq!(access.name(), "sb-access-token");
        assert_eq!(access.value(), "at-2");
        assert_eq!(access.path(), Some("/"));
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.same_site(), Some(SameSite::Lax));
        assert_eq!(access.max_age(), Some(time::Duration::seconds(3600)));

        let refresh = &cookies[1];
        assert_eq!(refresh.name(), "sb-refresh-token");
        assert_eq!(refresh.max_age(), Some(time::Duration::days(30)));
    }

    #[test]
    fn recovery_cookie_is_scoped_to_reset_page() {
        let issued = policy().issue_recovery(&tokens("at-rec", "rt-rec"));
        assert_eq!(issued.name(), "sb-recovery-token");
        assert_eq!(issued.value(), "at-rec");
        assert_eq!(issued.path(), Some("/reset-password"));
        assert_eq!(issued.http_only(), Some(true));

        let cleared = policy().clear_recovery();
        assert_eq!(cleared.path(), Some("/reset-password"));
        assert_eq!(cleared.max_age(), Some(time::Duration::ZERO));
    }

    #[test]
    fn writes_override_and_remove_entries() {
        let set = CookieSet::from_headers(&headers(
            "theme=dark; sb-access-token=old; sb-refresh-token=old-rt",
        ));

        let rotated = set.with_writes(&policy().issue(&tokens("new", "new-rt")));
        assert_eq!(rotated.get("sb-access-token"), Some("new"));
        assert_eq!(rotated.get("sb-refresh-token"), Some("new-rt"));
        assert_eq!(rotated.get("theme"), Some("dark"));

        let cleared = rotated.with_writes(&policy().clear());
        assert_eq!(cleared.get("sb-access-token"), None);
        assert_eq!(cleared.get("theme"), Some("dark"));
    }

    #[test]
    fn header_value_round_trips_through_parser() {
        let set = CookieSet::from_headers(&headers("a=1; b=2"));
        let rendered = set.to_header_value();
        assert_eq!(rendered, "a=1; b=2");
        assert_eq!(CookieSet::from_headers(&headers(&rendered)), set);
    }
}

use secrecy::Secret;
use serde::Deserialize;
use service_core::error::AppError;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub guard: GuardSettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Browser-facing origin of this service, used to build email links
    /// (e.g. https://portal.example.com).
    pub base_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP collector endpoint; tracing export is disabled when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Clone)]
pub struct ProviderSettings {
    /// Project URL of the hosted identity provider (auth and rest APIs live
    /// under `/auth/v1` and `/rest/v1`).
    pub url: String,
    /// Public (anon) API key sent as the `apikey` header.
    pub anon_key: Secret<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Deserialize, Clone, Debug)]
pub struct SessionSettings {
    /// Session cookies are named `<prefix>-access-token` and
    /// `<prefix>-refresh-token`.
    #[serde(default = "default_cookie_prefix")]
    pub cookie_prefix: String,
    /// Set to true in production with HTTPS
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_refresh_max_age_days")]
    pub refresh_max_age_days: i64,
}

fn default_cookie_prefix() -> String {
    "sb".to_string()
}

fn default_refresh_max_age_days() -> i64 {
    30
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_prefix: default_cookie_prefix(),
            secure: false,
            refresh_max_age_days: default_refresh_max_age_days(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct GuardSettings {
    /// Exact paths reachable without a session.
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
    /// Fetch role assignments for resolved users.
    #[serde(default = "default_load_roles")]
    pub load_roles: bool,
    /// Reject signed-in users without any role on protected paths.
    #[serde(default)]
    pub require_role: bool,
}

pub fn default_public_paths() -> Vec<String> {
    ["/login", "/signup", "/reset-password", "/forget-password"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_load_roles() -> bool {
    true
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            public_paths: default_public_paths(),
            load_roles: default_load_roles(),
            require_role: false,
        }
    }
}

impl Settings {
    /// Target of the link embedded in password reset emails.
    pub fn reset_redirect_url(&self) -> String {
        format!(
            "{}{}",
            self.server.base_url.trim_end_matches('/'),
            crate::models::route::RESET_PASSWORD_PATH
        )
    }
}

pub fn get_configuration() -> Result<Settings, AppError> {
    service_core::config::load_settings("portal-frontend")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_defaults_cover_auth_pages() {
        let guard = GuardSettings::default();
        assert_eq!(
            guard.public_paths,
            vec!["/login", "/signup", "/reset-password", "/forget-password"]
        );
        assert!(guard.load_roles);
        assert!(!guard.require_role);
    }

    #[test]
    fn reset_redirect_url_ignores_trailing_slash() {
        let settings = Settings {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 3000,
                base_url: "https://portal.example.com/".to_string(),
                log_level: default_log_level(),
                otlp_endpoint: None,
            },
            provider: ProviderSettings {
                url: "https://project.supabase.co".to_string(),
                anon_key: Secret::new("anon".to_string()),
                timeout_secs: default_timeout_secs(),
            },
            session: SessionSettings::default(),
            guard: GuardSettings::default(),
        };

        assert_eq!(
            settings.reset_redirect_url(),
            "https://portal.example.com/reset-password"
        );
    }
}

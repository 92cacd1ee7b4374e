#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request},
    response::Response,
    Router,
};
use portal_frontend::{
    config::{GuardSettings, ProviderSettings, ServerSettings, SessionSettings, Settings},
    startup::build_router,
    AppState,
};
use secrecy::Secret;
use std::sync::Arc;

pub use portal_frontend::services::MockIdentityProvider;

pub const BASE_URL: &str = "https://portal.example.com";

pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            base_url: BASE_URL.to_string(),
            log_level: "debug".to_string(),
            otlp_endpoint: None,
        },
        provider: ProviderSettings {
            url: "http://localhost:54321".to_string(),
            anon_key: Secret::new("anon-key".to_string()),
            timeout_secs: 5,
        },
        session: SessionSettings::default(),
        guard: GuardSettings::default(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub provider: Arc<MockIdentityProvider>,
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(test_settings())
}

pub fn spawn_app_with(settings: Settings) -> TestApp {
    let provider = Arc::new(MockIdentityProvider::new());
    let router = build_router(AppState::new(provider.clone(), settings));
    TestApp { router, provider }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn session_cookie(access: &str, refresh: &str) -> String {
    format!("sb-access-token={}; sb-refresh-token={}", access, refresh)
}

/// `(name, value)` of every Set-Cookie header, sorted by name so the access
/// token always comes before the refresh token.
pub fn set_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut cookies: Vec<(String, String)> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();
    cookies.sort();
    cookies
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

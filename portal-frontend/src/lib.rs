pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use config::Settings;
use models::{CookiePolicy, RouteTable};
use services::IdentityProvider;
use std::sync::Arc;

/// Shared application state: the identity provider client plus the
/// per-process routing and cookie policy derived from settings.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn IdentityProvider>,
    pub settings: Arc<Settings>,
    pub routes: Arc<RouteTable>,
    pub cookies: Arc<CookiePolicy>,
}

impl AppState {
    pub fn new(provider: Arc<dyn IdentityProvider>, settings: Settings) -> Self {
        Self {
            routes: Arc::new(RouteTable::new(settings.guard.public_paths.clone())),
            cookies: Arc::new(CookiePolicy::new(&settings.session)),
            settings: Arc::new(settings),
            provider,
        }
    }
}

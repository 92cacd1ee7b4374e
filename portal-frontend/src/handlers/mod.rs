pub mod app;
pub mod auth;
pub mod metrics;
pub mod password;
pub mod user;

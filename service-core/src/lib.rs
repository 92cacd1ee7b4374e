//! service-core: shared infrastructure for the portal services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;

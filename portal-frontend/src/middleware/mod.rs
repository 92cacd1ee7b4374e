pub mod metrics;
pub mod session_guard;

pub use metrics::metrics_middleware;
pub use session_guard::{session_guard, GuardDecision, SessionGuard};

pub mod gotrue;
pub mod identity;
pub mod metrics;
pub mod mock;
pub mod password_reset;

pub use gotrue::GoTrueClient;
pub use identity::{IdentityProvider, ProviderError, SignUpOutcome};
pub use mock::{MockIdentityProvider, SentResetEmail};

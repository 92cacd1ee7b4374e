pub mod route;
pub mod session;
pub mod user;

pub use route::{RouteClass, RouteTable};
pub use session::{AuthSession, CookiePolicy, CookieSet, Credentials, RefreshResult, SessionTokens};
pub use user::{CurrentUser, Principal};

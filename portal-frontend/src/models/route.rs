use std::collections::HashSet;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";
pub const RESET_PASSWORD_PATH: &str = "/reset-password";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Reachable without a session.
    Public,
    /// Requires a valid session.
    Protected,
}

/// Exact-match classification of request paths.
#[derive(Debug, Clone)]
pub struct RouteTable {
    public: HashSet<String>,
}

impl RouteTable {
    pub fn new<I, S>(public_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            public: public_paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if self.public.contains(path) {
            RouteClass::Public
        } else {
            RouteClass::Protected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_public_paths;

    #[test]
    fn auth_pages_are_public() {
        let table = RouteTable::new(default_public_paths());
        for path in ["/login", "/signup", "/reset-password", "/forget-password"] {
            assert_eq!(table.classify(path), RouteClass::Public, "{path}");
        }
    }

    #[test]
    fn everything_else_is_protected() {
        let table = RouteTable::new(default_public_paths());
        for path in ["/", "/personal", "/logout", "/login/extra", "/LOGIN", ""] {
            assert_eq!(table.classify(path), RouteClass::Protected, "{path}");
        }
    }

    #[test]
    fn login_target_is_itself_public() {
        // Redirecting to the login page must never trigger another redirect.
        let table = RouteTable::new(default_public_paths());
        assert_eq!(table.classify(LOGIN_PATH), RouteClass::Public);
    }
}

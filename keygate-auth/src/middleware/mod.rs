pub mod app;
pub mod console;
pub mod scope;

use std::collections::HashSet;

/// Exact-path allow-list for unauthenticated requests. Matching is on the
/// full path only; there is no prefix or substring matching, so a route like
/// `/v1/app/auth/google/login-history` is not accidentally exempt.
#[derive(Debug, Clone, Default)]
pub struct AuthExemptions {
    paths: HashSet<String>,
}

impl AuthExemptions {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.paths.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_only() {
        let exemptions = AuthExemptions::new(["/v1/app/auth/google/login"]);

        assert!(exemptions.is_exempt("/v1/app/auth/google/login"));
        assert!(!exemptions.is_exempt("/v1/app/auth/google/login/"));
        assert!(!exemptions.is_exempt("/v1/app/auth/google/login-history"));
        assert!(!exemptions.is_exempt("/v1/app/auth"));
        assert!(!exemptions.is_exempt("/v1/app/me"));
    }

    #[test]
    fn test_empty_list_exempts_nothing() {
        let exemptions = AuthExemptions::default();
        assert!(!exemptions.is_exempt("/health"));
    }
}

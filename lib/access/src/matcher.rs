//! Protected path matching.

use tracing::debug;

use crate::policy::{AccessPolicy, MatchMode};

/// Returns true if `path` falls under a protected prefix of `policy`.
///
/// Matching is a literal, case-sensitive prefix check against the request
/// path as received (before any `index.html` suffix is added). Under
/// [`MatchMode::FirstPrefixOnly`] the decision is made by the first prefix
/// alone.
#[must_use]
pub fn is_protected(policy: &AccessPolicy, path: &str) -> bool {
    let prefixes = policy.protected_prefixes();

    let protected = match policy.matching() {
        MatchMode::FirstPrefixOnly => prefixes
            .first()
            .is_some_and(|prefix| path.starts_with(prefix.as_str())),
        MatchMode::AnyPrefix => prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str())),
    };

    debug!(%path, protected, matching = policy.matching().as_str(), "Checked protected paths");
    protected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::IdentityProvider;

    fn policy(prefixes: &[&str], matching: MatchMode) -> AccessPolicy {
        let provider = IdentityProvider::new(
            "https://idcs.example.com",
            "client".to_string(),
            "secret".to_string(),
        )
        .expect("valid provider");

        AccessPolicy::protected(
            "site".to_string(),
            None,
            prefixes.iter().map(|p| (*p).to_string()).collect(),
            matching,
            provider,
        )
        .expect("valid policy")
    }

    #[test]
    fn unprotected_policy_protects_nothing() {
        let policy = AccessPolicy::unprotected("site".to_string(), None);

        for path in ["/", "/secret/", "/callback/", "/a/b/c.txt"] {
            assert!(!is_protected(&policy, path), "{path} should not be protected");
        }
    }

    #[test]
    fn path_equal_to_first_prefix_is_protected() {
        let policy = policy(&["/secret/"], MatchMode::FirstPrefixOnly);
        assert!(is_protected(&policy, "/secret/"));
    }

    #[test]
    fn path_under_first_prefix_is_protected() {
        let policy = policy(&["/secret/", "/private/"], MatchMode::FirstPrefixOnly);
        assert!(is_protected(&policy, "/secret/plans.pdf"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let policy = policy(&["/secret/"], MatchMode::AnyPrefix);
        assert!(!is_protected(&policy, "/Secret/plans.pdf"));
    }

    #[test]
    fn first_prefix_only_ignores_later_prefixes() {
        let policy = policy(&["/secret/", "/private/"], MatchMode::FirstPrefixOnly);
        assert!(!is_protected(&policy, "/private/diary.txt"));
    }

    #[test]
    fn any_prefix_consults_every_prefix() {
        let policy = policy(&["/secret/", "/private/"], MatchMode::AnyPrefix);
        assert!(is_protected(&policy, "/secret/plans.pdf"));
        assert!(is_protected(&policy, "/private/diary.txt"));
        assert!(!is_protected(&policy, "/public/index.html"));
    }

    #[test]
    fn index_suffix_is_not_considered() {
        let policy = policy(&["/docs/index.html"], MatchMode::AnyPrefix);
        assert!(!is_protected(&policy, "/docs/"));
    }
}

//! Claims extracted from an identity provider's ID token.

use serde::Deserialize;

/// Claims read from an ID token payload.
///
/// The token is not signature-checked. It is trusted only because the
/// server fetched it directly from the token endpoint; a token arriving from
/// the browser must never be turned into claims this way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    /// The subject claim, used as the session username.
    pub subject: String,
    /// The issuer claim, when present.
    pub issuer: Option<String>,
    /// The email claim, when present.
    pub email: Option<String>,
}

impl IdentityClaims {
    /// Creates claims for a subject.
    #[must_use]
    pub fn new(subject: String) -> Self {
        Self {
            subject,
            issuer: None,
            email: None,
        }
    }

    /// Sets the issuer claim.
    #[must_use]
    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer;
        self
    }

    /// Sets the email claim.
    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }
}

/// The subset of an ID token payload the gate reads.
#[derive(Debug, Deserialize)]
pub(crate) struct IdTokenPayload {
    pub(crate) sub: Option<String>,
    pub(crate) iss: Option<String>,
    pub(crate) email: Option<String>,
}

impl IdTokenPayload {
    pub(crate) fn into_claims(self) -> Option<IdentityClaims> {
        let subject = self.sub.filter(|s| !s.is_empty())?;
        Some(
            IdentityClaims::new(subject)
                .with_issuer(self.iss)
                .with_email(self.email),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_builder() {
        let claims = IdentityClaims::new("alice".to_string())
            .with_issuer(Some("https://idcs.example.com".to_string()))
            .with_email(Some("alice@example.com".to_string()));

        assert_eq!(claims.subject, "alice");
        assert_eq!(claims.issuer.as_deref(), Some("https://idcs.example.com"));
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn payload_without_subject_yields_no_claims() {
        let payload: IdTokenPayload =
            serde_json::from_str(r#"{"iss": "https://idcs.example.com"}"#).expect("deserialize");
        assert!(payload.into_claims().is_none());
    }

    #[test]
    fn payload_with_empty_subject_yields_no_claims() {
        let payload: IdTokenPayload = serde_json::from_str(r#"{"sub": ""}"#).expect("deserialize");
        assert!(payload.into_claims().is_none());
    }
}

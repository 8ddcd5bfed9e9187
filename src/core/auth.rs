/// Credential Gate
///
/// Compares a presented token against the shared secret from configuration.
/// Plain equality: no hashing, no constant-time comparison, no rate limiting.
///
/// With `TokenSource::Configured` (the default) the presented token is the
/// configured secret itself, so any caller passes whenever a secret is set.
/// This keeps parity with the deployed calculator. `TokenSource::Caller`
/// compares the bearer token the caller actually sent.

use tracing::warn;

/// Where the gate takes the presented token from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenSource {
    /// Present the configured secret (self-comparison)
    #[default]
    Configured,
    /// Present the bearer token from the caller's request
    Caller,
}

/// Per-request information the transport hands to tool handlers.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Token from an `Authorization: Bearer ...` header, if any
    pub bearer_token: Option<String>,
}

impl CallContext {
    #[cfg(test)]
    pub fn with_bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
        }
    }
}

/// Shared-secret check used by every tool.
#[derive(Debug, Clone)]
pub struct CredentialGate {
    secret: Option<String>,
    source: TokenSource,
}

impl CredentialGate {
    pub fn new(secret: Option<String>, source: TokenSource) -> Self {
        Self { secret, source }
    }

    /// Returns true only if a non-empty secret is configured and `presented`
    /// equals it exactly.
    pub fn validate(&self, presented: Option<&str>) -> bool {
        match (self.secret.as_deref(), presented) {
            (Some(secret), Some(token)) if !secret.is_empty() => token == secret,
            _ => false,
        }
    }

    /// Resolve the presented token for this call and validate it.
    pub fn authorize(&self, ctx: &CallContext) -> bool {
        let presented = match self.source {
            TokenSource::Configured => self.secret.as_deref(),
            TokenSource::Caller => ctx.bearer_token.as_deref(),
        };
        let allowed = self.validate(presented);
        if !allowed {
            warn!(
                source = ?self.source,
                secret_configured = self.secret.as_deref().is_some_and(|s| !s.is_empty()),
                bearer_present = ctx.bearer_token.is_some(),
                "tool call rejected by credential gate"
            );
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_configured_secret() {
        let unset = CredentialGate::new(None, TokenSource::Caller);
        assert!(!unset.validate(Some("anything")));
        assert!(!unset.validate(None));

        let empty = CredentialGate::new(Some(String::new()), TokenSource::Caller);
        assert!(!empty.validate(Some("")));
    }

    #[test]
    fn test_validate_exact_match() {
        let gate = CredentialGate::new(Some("S".to_string()), TokenSource::Caller);
        assert!(gate.validate(Some("S")));
        assert!(!gate.validate(Some("s")));
        assert!(!gate.validate(Some("S ")));
        assert!(!gate.validate(None));
    }

    #[test]
    fn test_configured_source_ignores_caller_token() {
        // Self-comparison: the caller's credential is never consulted.
        let gate = CredentialGate::new(Some("S".to_string()), TokenSource::Configured);
        assert!(gate.authorize(&CallContext::default()));
        assert!(gate.authorize(&CallContext::with_bearer("wrong")));
        assert!(gate.authorize(&CallContext::with_bearer("S")));
    }

    #[test]
    fn test_configured_source_without_secret_denies() {
        let gate = CredentialGate::new(None, TokenSource::Configured);
        assert!(!gate.authorize(&CallContext::default()));
        assert!(!gate.authorize(&CallContext::with_bearer("S")));
    }

    #[test]
    fn test_caller_source_checks_bearer() {
        let gate = CredentialGate::new(Some("S".to_string()), TokenSource::Caller);
        assert!(gate.authorize(&CallContext::with_bearer("S")));
        assert!(!gate.authorize(&CallContext::with_bearer("wrong")));
        assert!(!gate.authorize(&CallContext::default()));
    }
}

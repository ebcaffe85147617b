//! Token - Idempotency tokens for submissions
//!
//! The catalog service deduplicates submissions carrying the same token.
//! Every logical submission gets a fresh token; retries of that same call
//! reuse it.

use std::fmt;

/// Caller-supplied idempotency token attached to a submission
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyToken(String);

impl IdempotencyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Generate a fresh random token
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces one token per submission
pub type TokenSource = Box<dyn Fn() -> IdempotencyToken + Send + Sync>;

/// Token source backed by [`IdempotencyToken::generate`]
pub fn random_tokens() -> TokenSource {
    Box::new(IdempotencyToken::generate)
}

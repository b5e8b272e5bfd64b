//! Deterministic, storage-free strategy.

use crate::mapping::{
    domain::{ConversationContext, Resolution, ScopeKey, StrategyKind, ThreadId},
    ports::{ResolutionResult, ThreadIdResolver},
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Default thread identifier prefix.
pub const DEFAULT_THREAD_PREFIX: &str = "teams";

/// Default number of hex digits kept from the digest.
pub const DEFAULT_HASH_LENGTH: usize = 16;

/// Length of a hex-encoded SHA-256 digest.
pub const MAX_HASH_LENGTH: usize = 64;

/// Derives `{prefix}-{hex(sha256(scope_key))[..hash_length]}`.
///
/// The same scope key always yields the same identifier, across calls and
/// across process restarts. An optional salt is mixed in ahead of the scope
/// key; changing it re-keys every thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashResolver {
    prefix: String,
    hash_length: usize,
    salt: Option<String>,
}

impl Default for HashResolver {
    fn default() -> Self {
        Self::new(DEFAULT_THREAD_PREFIX, DEFAULT_HASH_LENGTH)
    }
}

impl HashResolver {
    /// Creates a resolver with the given prefix and digest length.
    ///
    /// Lengths above [`MAX_HASH_LENGTH`] keep the whole digest.
    #[must_use]
    pub fn new(prefix: impl Into<String>, hash_length: usize) -> Self {
        Self {
            prefix: prefix.into(),
            hash_length: hash_length.min(MAX_HASH_LENGTH),
            salt: None,
        }
    }

    /// Mixes a secret into every digest.
    #[must_use]
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Returns the configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the number of hex digits kept.
    #[must_use]
    pub const fn hash_length(&self) -> usize {
        self.hash_length
    }

    /// Derives the thread identifier for a scope key.
    #[must_use]
    pub fn thread_id_for(&self, scope_key: &ScopeKey) -> ThreadId {
        let mut hasher = Sha256::new();
        if let Some(salt) = &self.salt {
            hasher.update(salt.as_bytes());
            hasher.update([0_u8]);
        }
        hasher.update(scope_key.as_str().as_bytes());
        let digest = hex::encode(hasher.finalize());
        let truncated = digest.get(..self.hash_length).unwrap_or(&digest);
        ThreadId::prefixed(&self.prefix, truncated)
    }

    /// Derives the thread identifier for a validated context.
    #[must_use]
    pub fn derive(&self, context: &ConversationContext) -> ThreadId {
        self.thread_id_for(&ScopeKey::derive(context))
    }
}

#[async_trait]
impl ThreadIdResolver for HashResolver {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hash
    }

    async fn resolve(&self, context: &ConversationContext) -> ResolutionResult<Resolution> {
        Ok(Resolution::stateless(
            self.derive(context),
            StrategyKind::Hash,
        ))
    }
}

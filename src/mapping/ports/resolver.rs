//! Strategy port: resolving a conversation context to a thread identifier.

use crate::mapping::domain::{
    ContextValidationError, ConversationContext, Resolution, StrategyKind, ThreadId,
};
use crate::mapping::ports::MappingStoreError;
use async_trait::async_trait;
use thiserror::Error;

/// Result type for thread resolution.
pub type ResolutionResult<T> = Result<T, ResolutionError>;

/// Capability shared by every thread identifier strategy.
#[async_trait]
pub trait ThreadIdResolver: Send + Sync {
    /// Returns the strategy implemented by this resolver.
    fn kind(&self) -> StrategyKind;

    /// Resolves a validated context to its thread.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::StoreUnavailable`] when a durable strategy
    /// cannot reach its store.
    async fn resolve(&self, context: &ConversationContext) -> ResolutionResult<Resolution>;

    /// Re-derives the channel context behind a thread identifier.
    ///
    /// Stateless strategies cannot invert their mapping and return `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::StoreUnavailable`] when a durable strategy
    /// cannot reach its store.
    async fn conversation_context(
        &self,
        thread_id: &ThreadId,
    ) -> ResolutionResult<Option<ConversationContext>> {
        let _ = thread_id;
        Ok(None)
    }
}

/// Errors surfaced to callers of thread resolution.
///
/// Creation conflicts are recovered inside the database strategy and never
/// appear here.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// The inbound context is malformed or incomplete.
    #[error(transparent)]
    Validation(#[from] ContextValidationError),

    /// The mapping store is unreachable or timed out.
    #[error("mapping store unavailable: {0}")]
    StoreUnavailable(#[source] MappingStoreError),
}

//! Resolution façade used by the message-handling layer.

use crate::mapping::{
    domain::{
        ContextValidator, ConversationContext, RawConversationContext, Resolution, StrategyKind,
        ThreadId,
    },
    ports::{ResolutionError, ResolutionResult, ThreadIdResolver},
    resolvers::HashResolver,
};
use std::sync::Arc;
use tracing::warn;

/// Validates inbound contexts and dispatches them to the configured strategy.
///
/// When a hash fallback is configured, a [`ResolutionError::StoreUnavailable`]
/// from the primary strategy is answered with the hash-derived identifier
/// instead. Fallback identifiers are never stored and differ from the ones
/// the store returns.
#[derive(Clone)]
pub struct ResolutionService {
    validator: ContextValidator,
    resolver: Arc<dyn ThreadIdResolver>,
    fallback: Option<HashResolver>,
}

impl ResolutionService {
    /// Creates a service without fallback.
    #[must_use]
    pub fn new(validator: ContextValidator, resolver: Arc<dyn ThreadIdResolver>) -> Self {
        Self {
            validator,
            resolver,
            fallback: None,
        }
    }

    /// Answers store outages with the hash strategy.
    #[must_use]
    pub fn with_hash_fallback(mut self, fallback: HashResolver) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Returns the primary strategy.
    #[must_use]
    pub fn strategy(&self) -> StrategyKind {
        self.resolver.kind()
    }

    /// Returns the context validator.
    #[must_use]
    pub const fn validator(&self) -> &ContextValidator {
        &self.validator
    }

    /// Resolves a raw channel context to its thread identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::Validation`] for malformed contexts and
    /// [`ResolutionError::StoreUnavailable`] when the store cannot be reached
    /// and no fallback is configured.
    pub async fn resolve(&self, raw: &RawConversationContext) -> ResolutionResult<ThreadId> {
        self.resolve_detailed(raw)
            .await
            .map(Resolution::into_thread_id)
    }

    /// Resolves a raw channel context, returning the full resolution record.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve`].
    pub async fn resolve_detailed(
        &self,
        raw: &RawConversationContext,
    ) -> ResolutionResult<Resolution> {
        let context = self.validator.validate(raw)?;
        self.resolve_context(&context).await
    }

    /// Resolves an already validated context.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::StoreUnavailable`] when the store cannot be
    /// reached and no fallback is configured.
    pub async fn resolve_context(
        &self,
        context: &ConversationContext,
    ) -> ResolutionResult<Resolution> {
        match self.resolver.resolve(context).await {
            Err(ResolutionError::StoreUnavailable(err)) => match &self.fallback {
                Some(fallback) => {
                    warn!(
                        strategy = %self.resolver.kind(),
                        tenant_id = %context.tenant_id(),
                        error = %err,
                        "mapping store unavailable, falling back to hash strategy"
                    );
                    fallback.resolve(context).await
                }
                None => Err(ResolutionError::StoreUnavailable(err)),
            },
            outcome => outcome,
        }
    }

    /// Re-derives the channel context behind a thread identifier.
    ///
    /// Returns `None` for unknown threads and for strategies without reverse
    /// lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::StoreUnavailable`] when the store cannot be
    /// reached.
    pub async fn conversation_context(
        &self,
        thread_id: &ThreadId,
    ) -> ResolutionResult<Option<ConversationContext>> {
        self.resolver.conversation_context(thread_id).await
    }
}

//! Durable strategy backed by a mapping store.

use crate::mapping::{
    domain::{ConversationContext, Resolution, ScopeKey, StrategyKind, ThreadId, ThreadMapping},
    ports::{
        MappingStore, MappingStoreError, MappingStoreResult, ResolutionError, ResolutionResult,
        ThreadIdResolver,
    },
    resolvers::DEFAULT_THREAD_PREFIX,
};
use async_trait::async_trait;
use mockable::Clock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of get-or-create cycles before giving up on a contended scope.
pub const MAX_RESOLVE_ATTEMPTS: usize = 3;

/// Get-or-create resolution against a [`MappingStore`].
///
/// The store's atomic insert is the only synchronisation point. A losing
/// concurrent creator sees [`MappingStoreError::ScopeConflict`], discards
/// its generated identifier and re-reads the winner's mapping.
pub struct DatabaseResolver<S, C>
where
    S: MappingStore + ?Sized,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    thread_id_prefix: String,
    store_timeout: Duration,
}

impl<S, C> DatabaseResolver<S, C>
where
    S: MappingStore + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates a resolver with the default prefix and store timeout.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self {
            store,
            clock,
            thread_id_prefix: DEFAULT_THREAD_PREFIX.to_owned(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Sets the prefix of generated thread identifiers.
    #[must_use]
    pub fn with_thread_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_id_prefix = prefix.into();
        self
    }

    /// Sets the bound applied to every store call.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Returns the backing store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn generate_thread_id(&self) -> ThreadId {
        let suffix = Uuid::new_v4().simple().to_string();
        ThreadId::prefixed(&self.thread_id_prefix, &suffix)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = MappingStoreResult<T>> + Send,
    ) -> MappingStoreResult<T> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| MappingStoreError::Timeout(self.store_timeout))?
    }

    async fn resume_existing(&self, existing: &ThreadMapping) -> Resolution {
        let now = self.clock.utc();
        match self.bounded(self.store.touch(existing.thread_id(), now)).await {
            Ok(()) => Resolution::existing(existing, now),
            Err(err) => {
                warn!(
                    thread_id = %existing.thread_id(),
                    tenant_id = %existing.tenant_id(),
                    error = %err,
                    "failed to record thread activity"
                );
                Resolution::existing(existing, existing.last_activity_at())
            }
        }
    }
}

#[async_trait]
impl<S, C> ThreadIdResolver for DatabaseResolver<S, C>
where
    S: MappingStore + ?Sized + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn kind(&self) -> StrategyKind {
        StrategyKind::Database
    }

    async fn resolve(&self, context: &ConversationContext) -> ResolutionResult<Resolution> {
        let scope_key = ScopeKey::derive(context);

        for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
            let found = self
                .bounded(self.store.get_by_scope_key(&scope_key))
                .await
                .map_err(ResolutionError::StoreUnavailable)?;
            if let Some(existing) = found {
                return Ok(self.resume_existing(&existing).await);
            }

            let mapping = ThreadMapping::new(
                scope_key.clone(),
                self.generate_thread_id(),
                context,
                &*self.clock,
            );
            match self.bounded(self.store.create(&mapping)).await {
                Ok(()) => {
                    info!(
                        thread_id = %mapping.thread_id(),
                        tenant_id = %mapping.tenant_id(),
                        conversation_type = %mapping.conversation_type(),
                        "created thread mapping"
                    );
                    return Ok(Resolution::created(&mapping));
                }
                Err(err) if err.is_conflict() => {
                    debug!(
                        scope_key = %scope_key,
                        attempt,
                        error = %err,
                        "lost creation race, re-reading scope"
                    );
                }
                Err(err) => return Err(ResolutionError::StoreUnavailable(err)),
            }
        }

        Err(ResolutionError::StoreUnavailable(
            MappingStoreError::ScopeConflict(scope_key),
        ))
    }

    async fn conversation_context(
        &self,
        thread_id: &ThreadId,
    ) -> ResolutionResult<Option<ConversationContext>> {
        let mapping = self
            .bounded(self.store.get_by_thread_id(thread_id))
            .await
            .map_err(ResolutionError::StoreUnavailable)?;
        Ok(mapping.map(|found| found.conversation_context()))
    }
}

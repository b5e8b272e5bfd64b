//! Persistence port for durable thread mappings.

use crate::mapping::domain::{ScopeKey, TenantId, ThreadId, ThreadMapping};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for mapping store operations.
pub type MappingStoreResult<T> = Result<T, MappingStoreError>;

/// Thread mapping persistence contract.
///
/// `create` is the only synchronisation primitive the database strategy
/// relies on: implementations must insert atomically and reject a second
/// mapping for the same scope key with [`MappingStoreError::ScopeConflict`].
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Finds the mapping for a scope key.
    ///
    /// Returns `None` when the scope has never been resolved or its mapping
    /// was swept.
    async fn get_by_scope_key(&self, scope_key: &ScopeKey)
    -> MappingStoreResult<Option<ThreadMapping>>;

    /// Finds the mapping for a thread identifier (reverse lookup).
    async fn get_by_thread_id(
        &self,
        thread_id: &ThreadId,
    ) -> MappingStoreResult<Option<ThreadMapping>>;

    /// Inserts a new mapping.
    ///
    /// # Errors
    ///
    /// Returns [`MappingStoreError::ScopeConflict`] when the scope key is
    /// already mapped, or [`MappingStoreError::DuplicateThreadId`] when the
    /// thread identifier is already in use.
    async fn create(&self, mapping: &ThreadMapping) -> MappingStoreResult<()>;

    /// Advances `last_activity_at` to `at` (never backwards) and reactivates
    /// the mapping.
    ///
    /// # Errors
    ///
    /// Returns [`MappingStoreError::NotFound`] when the thread is unknown.
    async fn touch(&self, thread_id: &ThreadId, at: DateTime<Utc>) -> MappingStoreResult<()>;

    /// Marks a mapping inactive.
    ///
    /// # Errors
    ///
    /// Returns [`MappingStoreError::NotFound`] when the thread is unknown.
    async fn deactivate(&self, thread_id: &ThreadId) -> MappingStoreResult<()>;

    /// Returns the active mappings of a tenant, most recently active first.
    async fn list_active(&self, tenant_id: &TenantId) -> MappingStoreResult<Vec<ThreadMapping>>;

    /// Returns up to `limit` mappings whose last activity is before
    /// `older_than`, oldest first.
    async fn list_inactive(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> MappingStoreResult<Vec<ThreadMapping>>;

    /// Deletes one mapping if, at delete time, its last activity is still
    /// before `older_than`.
    ///
    /// Returns `false` when the mapping is gone or was touched since it was
    /// selected.
    async fn delete_if_inactive(
        &self,
        thread_id: &ThreadId,
        older_than: DateTime<Utc>,
    ) -> MappingStoreResult<bool>;

    /// Deletes every mapping whose last activity is before `older_than`.
    ///
    /// Returns the number of deleted mappings.
    async fn delete_inactive(&self, older_than: DateTime<Utc>) -> MappingStoreResult<u64>;
}

/// Errors returned by mapping store implementations.
#[derive(Debug, Clone, Error)]
pub enum MappingStoreError {
    /// Another caller already created a mapping for the scope key.
    #[error("scope already mapped: {0}")]
    ScopeConflict(ScopeKey),

    /// The thread identifier is already bound to another scope.
    #[error("duplicate thread identifier: {0}")]
    DuplicateThreadId(ThreadId),

    /// The mapping was not found.
    #[error("thread mapping not found: {0}")]
    NotFound(ThreadId),

    /// The store did not answer within the caller's time budget.
    #[error("mapping store timed out after {0:?}")]
    Timeout(Duration),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl MappingStoreError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns `true` for the creation races the database strategy recovers
    /// from locally.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ScopeConflict(_) | Self::DuplicateThreadId(_))
    }
}

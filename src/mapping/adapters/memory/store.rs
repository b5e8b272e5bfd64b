//! Thread-safe in-memory mapping store for tests and single-process hosts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::mapping::{
    domain::{MappingStatus, ScopeKey, TenantId, ThreadId, ThreadMapping},
    ports::{MappingStore, MappingStoreError, MappingStoreResult},
};

/// Thread-safe in-memory mapping store.
///
/// The scope index is checked and updated under one write lock, which gives
/// `create` the same atomic insert-or-conflict behaviour as a unique index.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMappingStore {
    state: Arc<RwLock<InMemoryMappingState>>,
}

#[derive(Debug, Default)]
struct InMemoryMappingState {
    mappings: HashMap<ThreadId, ThreadMapping>,
    scope_index: HashMap<ScopeKey, ThreadId>,
}

impl InMemoryMappingStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored mappings.
    ///
    /// # Errors
    ///
    /// Returns [`MappingStoreError::Persistence`] when the lock is poisoned.
    pub fn len(&self) -> MappingStoreResult<usize> {
        Ok(self.read()?.mappings.len())
    }

    /// Returns `true` when no mapping is stored.
    ///
    /// # Errors
    ///
    /// Returns [`MappingStoreError::Persistence`] when the lock is poisoned.
    pub fn is_empty(&self) -> MappingStoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> MappingStoreResult<RwLockReadGuard<'_, InMemoryMappingState>> {
        self.state.read().map_err(|err| {
            MappingStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> MappingStoreResult<RwLockWriteGuard<'_, InMemoryMappingState>> {
        self.state.write().map_err(|err| {
            MappingStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

impl InMemoryMappingState {
    fn remove(&mut self, thread_id: &ThreadId) -> Option<ThreadMapping> {
        let removed = self.mappings.remove(thread_id)?;
        self.scope_index.remove(removed.scope_key());
        Some(removed)
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn get_by_scope_key(
        &self,
        scope_key: &ScopeKey,
    ) -> MappingStoreResult<Option<ThreadMapping>> {
        let state = self.read()?;
        let mapping = state
            .scope_index
            .get(scope_key)
            .and_then(|thread_id| state.mappings.get(thread_id))
            .cloned();
        Ok(mapping)
    }

    async fn get_by_thread_id(
        &self,
        thread_id: &ThreadId,
    ) -> MappingStoreResult<Option<ThreadMapping>> {
        Ok(self.read()?.mappings.get(thread_id).cloned())
    }

    async fn create(&self, mapping: &ThreadMapping) -> MappingStoreResult<()> {
        let mut state = self.write()?;

        if state.scope_index.contains_key(mapping.scope_key()) {
            return Err(MappingStoreError::ScopeConflict(mapping.scope_key().clone()));
        }
        if state.mappings.contains_key(mapping.thread_id()) {
            return Err(MappingStoreError::DuplicateThreadId(
                mapping.thread_id().clone(),
            ));
        }

        state
            .scope_index
            .insert(mapping.scope_key().clone(), mapping.thread_id().clone());
        state
            .mappings
            .insert(mapping.thread_id().clone(), mapping.clone());
        Ok(())
    }

    async fn touch(&self, thread_id: &ThreadId, at: DateTime<Utc>) -> MappingStoreResult<()> {
        let mut state = self.write()?;
        let mapping = state
            .mappings
            .get_mut(thread_id)
            .ok_or_else(|| MappingStoreError::NotFound(thread_id.clone()))?;
        mapping.touch(at);
        Ok(())
    }

    async fn deactivate(&self, thread_id: &ThreadId) -> MappingStoreResult<()> {
        let mut state = self.write()?;
        let mapping = state
            .mappings
            .get_mut(thread_id)
            .ok_or_else(|| MappingStoreError::NotFound(thread_id.clone()))?;
        mapping.deactivate();
        Ok(())
    }

    async fn list_active(&self, tenant_id: &TenantId) -> MappingStoreResult<Vec<ThreadMapping>> {
        let state = self.read()?;
        let mut active: Vec<ThreadMapping> = state
            .mappings
            .values()
            .filter(|m| m.tenant_id() == tenant_id && m.status() == MappingStatus::Active)
            .cloned()
            .collect();
        active.sort_by_key(|m| std::cmp::Reverse(m.last_activity_at()));
        Ok(active)
    }

    async fn list_inactive(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> MappingStoreResult<Vec<ThreadMapping>> {
        let state = self.read()?;
        let mut stale: Vec<ThreadMapping> = state
            .mappings
            .values()
            .filter(|m| m.is_inactive_since(older_than))
            .cloned()
            .collect();
        stale.sort_by_key(ThreadMapping::last_activity_at);
        stale.truncate(limit);
        Ok(stale)
    }

    async fn delete_if_inactive(
        &self,
        thread_id: &ThreadId,
        older_than: DateTime<Utc>,
    ) -> MappingStoreResult<bool> {
        let mut state = self.write()?;
        let still_stale = state
            .mappings
            .get(thread_id)
            .is_some_and(|m| m.is_inactive_since(older_than));
        if !still_stale {
            return Ok(false);
        }
        Ok(state.remove(thread_id).is_some())
    }

    async fn delete_inactive(&self, older_than: DateTime<Utc>) -> MappingStoreResult<u64> {
        let mut state = self.write()?;
        let stale: Vec<ThreadId> = state
            .mappings
            .values()
            .filter(|m| m.is_inactive_since(older_than))
            .map(|m| m.thread_id().clone())
            .collect();
        let mut deleted = 0_u64;
        for thread_id in &stale {
            if state.remove(thread_id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

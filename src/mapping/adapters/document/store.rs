//! `sled` repository implementation for thread mappings.

use super::record::{MappingDocument, document_key, partition_prefix, scope_index_key};
use crate::mapping::{
    domain::{MappingStatus, ScopeKey, TenantId, ThreadId, ThreadMapping},
    ports::{MappingStore, MappingStoreError, MappingStoreResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use std::path::Path;

const MAPPINGS_TREE: &str = "thread_mappings";
const SCOPE_INDEX_TREE: &str = "thread_mappings_scope_index";
const THREAD_INDEX_TREE: &str = "thread_mappings_thread_index";

/// Document store adapter: one JSON document per mapping, partitioned by
/// tenant, with a unique secondary index on the scope key.
#[derive(Debug, Clone)]
pub struct DocumentMappingStore {
    trees: MappingTrees,
}

#[derive(Debug, Clone)]
struct MappingTrees {
    documents: sled::Tree,
    scope_index: sled::Tree,
    thread_index: sled::Tree,
}

impl DocumentMappingStore {
    /// Opens (or creates) a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MappingStoreError::Persistence`] when the database cannot be
    /// opened.
    pub fn open(path: impl AsRef<Path>) -> MappingStoreResult<Self> {
        let db = sled::open(path).map_err(MappingStoreError::persistence)?;
        Self::from_db(&db)
    }

    /// Opens a throwaway store that is removed when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`MappingStoreError::Persistence`] when the database cannot be
    /// created.
    pub fn temporary() -> MappingStoreResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(MappingStoreError::persistence)?;
        Self::from_db(&db)
    }

    /// Builds a store on the mapping trees of an open database.
    ///
    /// # Errors
    ///
    /// Returns [`MappingStoreError::Persistence`] when a tree cannot be
    /// opened.
    pub fn from_db(db: &sled::Db) -> MappingStoreResult<Self> {
        let open = |name: &str| db.open_tree(name).map_err(MappingStoreError::persistence);
        Ok(Self {
            trees: MappingTrees {
                documents: open(MAPPINGS_TREE)?,
                scope_index: open(SCOPE_INDEX_TREE)?,
                thread_index: open(THREAD_INDEX_TREE)?,
            },
        })
    }

    async fn run_blocking<F, T>(&self, f: F) -> MappingStoreResult<T>
    where
        F: FnOnce(&MappingTrees) -> MappingStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let trees = self.trees.clone();
        tokio::task::spawn_blocking(move || f(&trees))
            .await
            .map_err(MappingStoreError::persistence)?
    }
}

impl MappingTrees {
    fn find_by_scope(&self, scope_key: &ScopeKey) -> MappingStoreResult<Option<ThreadMapping>> {
        let index_key = scope_index_key(scope_key);
        let Some(thread_bytes) = self
            .scope_index
            .get(index_key.as_bytes())
            .map_err(MappingStoreError::persistence)?
        else {
            return Ok(None);
        };
        let thread_id = decode_thread_id(&thread_bytes)?;
        let key = document_key(scope_key.tenant_id(), &thread_id);
        self.load_document(key.as_bytes())
    }

    fn find_by_thread(&self, thread_id: &ThreadId) -> MappingStoreResult<Option<ThreadMapping>> {
        let Some(key) = self
            .thread_index
            .get(thread_id.as_str().as_bytes())
            .map_err(MappingStoreError::persistence)?
        else {
            return Ok(None);
        };
        self.load_document(&key)
    }

    fn load_document(&self, key: &[u8]) -> MappingStoreResult<Option<ThreadMapping>> {
        self.documents
            .get(key)
            .map_err(MappingStoreError::persistence)?
            .map(|bytes| MappingDocument::decode(&bytes)?.into_mapping())
            .transpose()
    }

    fn insert(&self, mapping: &ThreadMapping) -> MappingStoreResult<()> {
        let index_key = scope_index_key(mapping.scope_key());
        let doc_key = document_key(mapping.tenant_id(), mapping.thread_id());
        let thread_key = mapping.thread_id().as_str().as_bytes();
        let body = MappingDocument::from_mapping(mapping).encode()?;

        let result: TransactionResult<(), MappingStoreError> =
            (&self.documents, &self.scope_index, &self.thread_index).transaction(
                |(documents, scopes, threads)| {
                    if scopes.get(index_key.as_bytes())?.is_some() {
                        return Err(ConflictableTransactionError::Abort(
                            MappingStoreError::ScopeConflict(mapping.scope_key().clone()),
                        ));
                    }
                    if threads.get(thread_key)?.is_some() {
                        return Err(ConflictableTransactionError::Abort(
                            MappingStoreError::DuplicateThreadId(mapping.thread_id().clone()),
                        ));
                    }
                    scopes.insert(index_key.as_bytes(), thread_key)?;
                    documents.insert(doc_key.as_bytes(), body.as_slice())?;
                    threads.insert(thread_key, doc_key.as_bytes())?;
                    Ok(())
                },
            );
        flatten(result)
    }

    /// Loads, edits, and rewrites one document atomically.
    fn update<F>(&self, thread_id: &ThreadId, edit: F) -> MappingStoreResult<()>
    where
        F: Fn(&mut ThreadMapping),
    {
        let thread_key = thread_id.as_str().as_bytes();
        let result: TransactionResult<(), MappingStoreError> =
            (&self.documents, &self.thread_index).transaction(|(documents, threads)| {
                let not_found = || {
                    ConflictableTransactionError::Abort(MappingStoreError::NotFound(
                        thread_id.clone(),
                    ))
                };
                let doc_key = threads.get(thread_key)?.ok_or_else(not_found)?;
                let bytes = documents.get(&*doc_key)?.ok_or_else(not_found)?;
                let mut mapping = MappingDocument::decode(&bytes)
                    .and_then(MappingDocument::into_mapping)
                    .map_err(ConflictableTransactionError::Abort)?;
                edit(&mut mapping);
                let body = MappingDocument::from_mapping(&mapping)
                    .encode()
                    .map_err(ConflictableTransactionError::Abort)?;
                documents.insert(&*doc_key, body.as_slice())?;
                Ok(())
            });
        flatten(result)
    }

    fn remove_if_stale(
        &self,
        thread_id: &ThreadId,
        older_than: DateTime<Utc>,
    ) -> MappingStoreResult<bool> {
        let thread_key = thread_id.as_str().as_bytes();
        let result: TransactionResult<bool, MappingStoreError> =
            (&self.documents, &self.scope_index, &self.thread_index).transaction(
                |(documents, scopes, threads)| {
                    let Some(doc_key) = threads.get(thread_key)? else {
                        return Ok(false);
                    };
                    let Some(bytes) = documents.get(&*doc_key)? else {
                        return Ok(false);
                    };
                    let mapping = MappingDocument::decode(&bytes)
                        .and_then(MappingDocument::into_mapping)
                        .map_err(ConflictableTransactionError::Abort)?;
                    if !mapping.is_inactive_since(older_than) {
                        return Ok(false);
                    }
                    documents.remove(&*doc_key)?;
                    threads.remove(thread_key)?;
                    scopes.remove(scope_index_key(mapping.scope_key()).as_bytes())?;
                    Ok(true)
                },
            );
        flatten(result)
    }

    fn scan<P>(&self, prefix: &[u8], keep: P) -> MappingStoreResult<Vec<ThreadMapping>>
    where
        P: Fn(&ThreadMapping) -> bool,
    {
        let mut mappings = Vec::new();
        for entry in self.documents.scan_prefix(prefix) {
            let (_, bytes) = entry.map_err(MappingStoreError::persistence)?;
            let mapping = MappingDocument::decode(&bytes)?.into_mapping()?;
            if keep(&mapping) {
                mappings.push(mapping);
            }
        }
        Ok(mappings)
    }

    fn stale(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> MappingStoreResult<Vec<ThreadMapping>> {
        let mut stale = self.scan(&[], |m| m.is_inactive_since(older_than))?;
        stale.sort_by_key(ThreadMapping::last_activity_at);
        stale.truncate(limit);
        Ok(stale)
    }
}

fn decode_thread_id(bytes: &[u8]) -> MappingStoreResult<ThreadId> {
    let raw = std::str::from_utf8(bytes).map_err(MappingStoreError::invalid_persisted_data)?;
    ThreadId::new(raw).map_err(MappingStoreError::invalid_persisted_data)
}

fn flatten<T>(result: TransactionResult<T, MappingStoreError>) -> MappingStoreResult<T> {
    result.map_err(|err| match err {
        TransactionError::Abort(inner) => inner,
        TransactionError::Storage(storage) => MappingStoreError::persistence(storage),
    })
}

#[async_trait]
impl MappingStore for DocumentMappingStore {
    async fn get_by_scope_key(
        &self,
        scope_key: &ScopeKey,
    ) -> MappingStoreResult<Option<ThreadMapping>> {
        let lookup = scope_key.clone();
        self.run_blocking(move |trees| trees.find_by_scope(&lookup))
            .await
    }

    async fn get_by_thread_id(
        &self,
        thread_id: &ThreadId,
    ) -> MappingStoreResult<Option<ThreadMapping>> {
        let lookup = thread_id.clone();
        self.run_blocking(move |trees| trees.find_by_thread(&lookup))
            .await
    }

    async fn create(&self, mapping: &ThreadMapping) -> MappingStoreResult<()> {
        let new_mapping = mapping.clone();
        self.run_blocking(move |trees| trees.insert(&new_mapping))
            .await
    }

    async fn touch(&self, thread_id: &ThreadId, at: DateTime<Utc>) -> MappingStoreResult<()> {
        let target = thread_id.clone();
        self.run_blocking(move |trees| trees.update(&target, |mapping| mapping.touch(at)))
            .await
    }

    async fn deactivate(&self, thread_id: &ThreadId) -> MappingStoreResult<()> {
        let target = thread_id.clone();
        self.run_blocking(move |trees| trees.update(&target, ThreadMapping::deactivate))
            .await
    }

    async fn list_active(&self, tenant_id: &TenantId) -> MappingStoreResult<Vec<ThreadMapping>> {
        let prefix = partition_prefix(tenant_id);
        self.run_blocking(move |trees| {
            let mut active =
                trees.scan(prefix.as_bytes(), |m| m.status() == MappingStatus::Active)?;
            active.sort_by_key(|m| std::cmp::Reverse(m.last_activity_at()));
            Ok(active)
        })
        .await
    }

    async fn list_inactive(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> MappingStoreResult<Vec<ThreadMapping>> {
        self.run_blocking(move |trees| trees.stale(older_than, limit))
            .await
    }

    async fn delete_if_inactive(
        &self,
        thread_id: &ThreadId,
        older_than: DateTime<Utc>,
    ) -> MappingStoreResult<bool> {
        let target = thread_id.clone();
        self.run_blocking(move |trees| trees.remove_if_stale(&target, older_than))
            .await
    }

    async fn delete_inactive(&self, older_than: DateTime<Utc>) -> MappingStoreResult<u64> {
        self.run_blocking(move |trees| {
            let mut deleted = 0_u64;
            for mapping in trees.stale(older_than, usize::MAX)? {
                if trees.remove_if_stale(mapping.thread_id(), older_than)? {
                    deleted += 1;
                }
            }
            Ok(deleted)
        })
        .await
    }
}

//! `PostgreSQL` repository implementation for thread mappings.

use super::{
    models::{NewThreadMappingRow, ThreadMappingRow},
    schema::thread_mappings,
};
use crate::mapping::{
    domain::{
        ChannelConversationId, ChannelUserId, ContextMetadata, ConversationType, MappingStatus,
        PersistedMappingData, ScopeKey, TenantId, ThreadId, ThreadMapping,
    },
    ports::{MappingStore, MappingStoreError, MappingStoreResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use std::time::Duration;

/// `PostgreSQL` connection pool type used by the mapping adapter.
pub type MappingPgPool = Pool<ConnectionManager<PgConnection>>;

/// Schema migration creating the `thread_mappings` table and its indexes.
pub const CREATE_THREAD_MAPPINGS_SQL: &str =
    include_str!("../../../../migrations/2026-10-01-000000_create_thread_mappings/up.sql");

const THREAD_ID_PRIMARY_KEY: &str = "thread_mappings_pkey";

/// `PostgreSQL`-backed mapping store.
///
/// The unique composite index on (`tenant_id`, `scope_key`) is the conflict
/// signal for concurrent first resolutions.
#[derive(Debug, Clone)]
pub struct PostgresMappingStore {
    pool: MappingPgPool,
}

impl PostgresMappingStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: MappingPgPool) -> Self {
        Self { pool }
    }

    /// Builds a connection pool for `url` and wraps it in a store.
    ///
    /// This blocks while the pool establishes its first connection.
    ///
    /// # Errors
    ///
    /// Returns [`MappingStoreError::Persistence`] when the pool cannot be
    /// built.
    pub fn connect(
        url: &str,
        max_connections: u32,
        connection_timeout: Duration,
    ) -> MappingStoreResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(url);
        let pool = Pool::builder()
            .max_size(max_connections)
            .connection_timeout(connection_timeout)
            .build(manager)
            .map_err(MappingStoreError::persistence)?;
        Ok(Self::new(pool))
    }

    /// Creates the `thread_mappings` table and indexes when missing.
    ///
    /// # Errors
    ///
    /// Returns [`MappingStoreError::Persistence`] when the migration fails.
    pub async fn ensure_schema(&self) -> MappingStoreResult<()> {
        self.run_blocking(|connection| {
            connection
                .batch_execute(CREATE_THREAD_MAPPINGS_SQL)
                .map_err(MappingStoreError::persistence)
        })
        .await
    }

    async fn run_blocking<F, T>(&self, f: F) -> MappingStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> MappingStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(MappingStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(MappingStoreError::persistence)?
    }
}

#[async_trait]
impl MappingStore for PostgresMappingStore {
    async fn get_by_scope_key(
        &self,
        scope_key: &ScopeKey,
    ) -> MappingStoreResult<Option<ThreadMapping>> {
        let tenant = scope_key.tenant_id().as_str().to_owned();
        let key = scope_key.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = thread_mappings::table
                .filter(thread_mappings::tenant_id.eq(&tenant))
                .filter(thread_mappings::scope_key.eq(&key))
                .select(ThreadMappingRow::as_select())
                .first::<ThreadMappingRow>(connection)
                .optional()
                .map_err(MappingStoreError::persistence)?;
            row.map(row_to_mapping).transpose()
        })
        .await
    }

    async fn get_by_thread_id(
        &self,
        thread_id: &ThreadId,
    ) -> MappingStoreResult<Option<ThreadMapping>> {
        let id = thread_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = thread_mappings::table
                .filter(thread_mappings::thread_id.eq(&id))
                .select(ThreadMappingRow::as_select())
                .first::<ThreadMappingRow>(connection)
                .optional()
                .map_err(MappingStoreError::persistence)?;
            row.map(row_to_mapping).transpose()
        })
        .await
    }

    async fn create(&self, mapping: &ThreadMapping) -> MappingStoreResult<()> {
        let scope_key = mapping.scope_key().clone();
        let thread_id = mapping.thread_id().clone();
        let new_row = to_new_row(mapping)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(thread_mappings::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => {
                        classify_unique_violation(info.as_ref(), &scope_key, &thread_id)
                    }
                    _ => MappingStoreError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn touch(&self, thread_id: &ThreadId, at: DateTime<Utc>) -> MappingStoreResult<()> {
        let target = thread_id.clone();
        self.run_blocking(move |connection| {
            let updated = diesel::sql_query(concat!(
                "UPDATE thread_mappings ",
                "SET last_activity_at = GREATEST(last_activity_at, $2), status = 'active' ",
                "WHERE thread_id = $1",
            ))
            .bind::<diesel::sql_types::Text, _>(target.as_str())
            .bind::<diesel::sql_types::Timestamptz, _>(at)
            .execute(connection)
            .map_err(MappingStoreError::persistence)?;

            if updated == 0 {
                return Err(MappingStoreError::NotFound(target));
            }
            Ok(())
        })
        .await
    }

    async fn deactivate(&self, thread_id: &ThreadId) -> MappingStoreResult<()> {
        let target = thread_id.clone();
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                thread_mappings::table.filter(thread_mappings::thread_id.eq(target.as_str())),
            )
            .set(thread_mappings::status.eq(MappingStatus::Inactive.as_str()))
            .execute(connection)
            .map_err(MappingStoreError::persistence)?;

            if updated == 0 {
                return Err(MappingStoreError::NotFound(target));
            }
            Ok(())
        })
        .await
    }

    async fn list_active(&self, tenant_id: &TenantId) -> MappingStoreResult<Vec<ThreadMapping>> {
        let tenant = tenant_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let rows = thread_mappings::table
                .filter(thread_mappings::tenant_id.eq(&tenant))
                .filter(thread_mappings::status.eq(MappingStatus::Active.as_str()))
                .order(thread_mappings::last_activity_at.desc())
                .select(ThreadMappingRow::as_select())
                .load::<ThreadMappingRow>(connection)
                .map_err(MappingStoreError::persistence)?;
            rows.into_iter().map(row_to_mapping).collect()
        })
        .await
    }

    async fn list_inactive(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> MappingStoreResult<Vec<ThreadMapping>> {
        let row_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run_blocking(move |connection| {
            let rows = thread_mappings::table
                .filter(thread_mappings::last_activity_at.lt(older_than))
                .order(thread_mappings::last_activity_at.asc())
                .limit(row_limit)
                .select(ThreadMappingRow::as_select())
                .load::<ThreadMappingRow>(connection)
                .map_err(MappingStoreError::persistence)?;
            rows.into_iter().map(row_to_mapping).collect()
        })
        .await
    }

    async fn delete_if_inactive(
        &self,
        thread_id: &ThreadId,
        older_than: DateTime<Utc>,
    ) -> MappingStoreResult<bool> {
        let target = thread_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            // The activity predicate is evaluated by the DELETE itself, so a
            // touch that lands after selection keeps the row.
            let deleted = diesel::delete(
                thread_mappings::table
                    .filter(thread_mappings::thread_id.eq(&target))
                    .filter(thread_mappings::last_activity_at.lt(older_than)),
            )
            .execute(connection)
            .map_err(MappingStoreError::persistence)?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn delete_inactive(&self, older_than: DateTime<Utc>) -> MappingStoreResult<u64> {
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(
                thread_mappings::table.filter(thread_mappings::last_activity_at.lt(older_than)),
            )
            .execute(connection)
            .map_err(MappingStoreError::persistence)?;
            u64::try_from(deleted).map_err(MappingStoreError::persistence)
        })
        .await
    }
}

pub(crate) fn to_new_row(mapping: &ThreadMapping) -> MappingStoreResult<NewThreadMappingRow> {
    let metadata =
        serde_json::to_value(mapping.metadata()).map_err(MappingStoreError::persistence)?;

    Ok(NewThreadMappingRow {
        thread_id: mapping.thread_id().as_str().to_owned(),
        tenant_id: mapping.tenant_id().as_str().to_owned(),
        scope_key: mapping.scope_key().as_str().to_owned(),
        conversation_type: mapping.conversation_type().as_str().to_owned(),
        channel_conversation_id: mapping.channel_conversation_id().as_str().to_owned(),
        channel_user_id: mapping.channel_user_id().as_str().to_owned(),
        status: mapping.status().as_str().to_owned(),
        metadata,
        created_at: mapping.created_at(),
        last_activity_at: mapping.last_activity_at(),
    })
}

pub(crate) fn row_to_mapping(row: ThreadMappingRow) -> MappingStoreResult<ThreadMapping> {
    let ThreadMappingRow {
        thread_id,
        tenant_id,
        scope_key,
        conversation_type,
        channel_conversation_id,
        channel_user_id,
        status,
        metadata,
        created_at,
        last_activity_at,
    } = row;

    let parsed_tenant =
        TenantId::new(tenant_id).map_err(MappingStoreError::invalid_persisted_data)?;
    let parsed_thread =
        ThreadId::new(thread_id).map_err(MappingStoreError::invalid_persisted_data)?;
    let parsed_type = ConversationType::try_from(conversation_type.as_str())
        .map_err(MappingStoreError::invalid_persisted_data)?;
    let parsed_status =
        MappingStatus::try_from(status.as_str()).map_err(MappingStoreError::invalid_persisted_data)?;
    let parsed_conversation = ChannelConversationId::new(channel_conversation_id)
        .map_err(MappingStoreError::invalid_persisted_data)?;
    let parsed_user =
        ChannelUserId::new(channel_user_id).map_err(MappingStoreError::invalid_persisted_data)?;
    let parsed_metadata: ContextMetadata =
        serde_json::from_value(metadata).map_err(MappingStoreError::invalid_persisted_data)?;

    let data = PersistedMappingData {
        scope_key: ScopeKey::from_persisted(parsed_tenant, scope_key),
        thread_id: parsed_thread,
        conversation_type: parsed_type,
        channel_conversation_id: parsed_conversation,
        channel_user_id: parsed_user,
        metadata: parsed_metadata,
        status: parsed_status,
        created_at,
        last_activity_at,
    };
    Ok(ThreadMapping::from_persisted(data))
}

pub(crate) fn classify_unique_violation(
    info: &dyn DatabaseErrorInformation,
    scope_key: &ScopeKey,
    thread_id: &ThreadId,
) -> MappingStoreError {
    // Unnamed violations are treated as scope races; the resolver re-reads
    // the scope either way.
    if info.constraint_name() == Some(THREAD_ID_PRIMARY_KEY) {
        MappingStoreError::DuplicateThreadId(thread_id.clone())
    } else {
        MappingStoreError::ScopeConflict(scope_key.clone())
    }
}

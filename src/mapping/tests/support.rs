//! Fixtures and test doubles shared by the mapping tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use mockall::mock;

use crate::mapping::{
    adapters::memory::InMemoryMappingStore,
    domain::{
        ContextValidator, ConversationContext, RawConversationContext, ScopeKey, TenantId,
        ThreadId, ThreadMapping,
    },
    ports::{MappingStore, MappingStoreError, MappingStoreResult},
};

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `now`.
    pub const fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().expect("clock lock should not be poisoned");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock should not be poisoned")
    }
}

/// Fixed instant used as "now" by lifecycle tests.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Validates a raw context with a multi-tenant validator.
pub fn context(
    tenant: &str,
    user: &str,
    conversation: &str,
    conversation_type: &str,
) -> ConversationContext {
    ContextValidator::multi_tenant()
        .validate(&RawConversationContext::new(
            conversation,
            user,
            conversation_type,
            tenant,
        ))
        .expect("fixture context should be valid")
}

/// Personal conversation of `user` reached through `conversation`.
pub fn personal(tenant: &str, user: &str, conversation: &str) -> ConversationContext {
    context(tenant, user, conversation, "personal")
}

/// Group conversation seen from `user`.
pub fn group(tenant: &str, conversation: &str, user: &str) -> ConversationContext {
    context(tenant, user, conversation, "group")
}

/// Builds a mapping whose timestamps are both `at`.
pub fn mapping_at(
    context: &ConversationContext,
    thread_id: &str,
    at: DateTime<Utc>,
) -> ThreadMapping {
    ThreadMapping::new(
        ScopeKey::derive(context),
        ThreadId::new(thread_id).expect("valid thread id"),
        context,
        &ManualClock::at(at),
    )
}

/// Tenant identifier fixture.
pub fn tenant(value: &str) -> TenantId {
    TenantId::new(value).expect("valid tenant id")
}

/// Persistence failure used for failure injection.
pub fn outage() -> MappingStoreError {
    MappingStoreError::persistence(std::io::Error::other("connection refused"))
}

mock! {
    /// Mapping store with scripted responses.
    pub Store {}

    #[async_trait]
    impl MappingStore for Store {
        async fn get_by_scope_key(
            &self,
            scope_key: &ScopeKey,
        ) -> MappingStoreResult<Option<ThreadMapping>>;
        async fn get_by_thread_id(
            &self,
            thread_id: &ThreadId,
        ) -> MappingStoreResult<Option<ThreadMapping>>;
        async fn create(&self, mapping: &ThreadMapping) -> MappingStoreResult<()>;
        async fn touch(&self, thread_id: &ThreadId, at: DateTime<Utc>) -> MappingStoreResult<()>;
        async fn deactivate(&self, thread_id: &ThreadId) -> MappingStoreResult<()>;
        async fn list_active(&self, tenant_id: &TenantId) -> MappingStoreResult<Vec<ThreadMapping>>;
        async fn list_inactive(
            &self,
            older_than: DateTime<Utc>,
            limit: usize,
        ) -> MappingStoreResult<Vec<ThreadMapping>>;
        async fn delete_if_inactive(
            &self,
            thread_id: &ThreadId,
            older_than: DateTime<Utc>,
        ) -> MappingStoreResult<bool>;
        async fn delete_inactive(&self, older_than: DateTime<Utc>) -> MappingStoreResult<u64>;
    }
}

/// In-memory store that can delay every call and simulate a concurrent
/// touch landing between a sweep's selection and its delete.
#[derive(Debug, Default)]
pub struct InterceptingStore {
    inner: InMemoryMappingStore,
    delay: Duration,
    touch_after_select: Mutex<Option<(ThreadId, DateTime<Utc>)>>,
}

impl InterceptingStore {
    /// Wraps `inner` without interception.
    pub fn new(inner: InMemoryMappingStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Delays every call by `delay`.
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Touches `thread_id` at `at` right after the next selection of stale
    /// rows returns.
    pub fn touch_after_next_select(self, thread_id: ThreadId, at: DateTime<Utc>) -> Self {
        *self
            .touch_after_select
            .lock()
            .expect("hook lock should not be poisoned") = Some((thread_id, at));
        self
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl MappingStore for InterceptingStore {
    async fn get_by_scope_key(
        &self,
        scope_key: &ScopeKey,
    ) -> MappingStoreResult<Option<ThreadMapping>> {
        self.pause().await;
        self.inner.get_by_scope_key(scope_key).await
    }

    async fn get_by_thread_id(
        &self,
        thread_id: &ThreadId,
    ) -> MappingStoreResult<Option<ThreadMapping>> {
        self.pause().await;
        self.inner.get_by_thread_id(thread_id).await
    }

    async fn create(&self, mapping: &ThreadMapping) -> MappingStoreResult<()> {
        self.pause().await;
        self.inner.create(mapping).await
    }

    async fn touch(&self, thread_id: &ThreadId, at: DateTime<Utc>) -> MappingStoreResult<()> {
        self.pause().await;
        self.inner.touch(thread_id, at).await
    }

    async fn deactivate(&self, thread_id: &ThreadId) -> MappingStoreResult<()> {
        self.pause().await;
        self.inner.deactivate(thread_id).await
    }

    async fn list_active(&self, tenant_id: &TenantId) -> MappingStoreResult<Vec<ThreadMapping>> {
        self.pause().await;
        self.inner.list_active(tenant_id).await
    }

    async fn list_inactive(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> MappingStoreResult<Vec<ThreadMapping>> {
        self.pause().await;
        let selected = self.inner.list_inactive(older_than, limit).await?;
        let hook = self
            .touch_after_select
            .lock()
            .expect("hook lock should not be poisoned")
            .take();
        if let Some((thread_id, at)) = hook {
            self.inner.touch(&thread_id, at).await?;
        }
        Ok(selected)
    }

    async fn delete_if_inactive(
        &self,
        thread_id: &ThreadId,
        older_than: DateTime<Utc>,
    ) -> MappingStoreResult<bool> {
        self.pause().await;
        self.inner.delete_if_inactive(thread_id, older_than).await
    }

    async fn delete_inactive(&self, older_than: DateTime<Utc>) -> MappingStoreResult<u64> {
        self.pause().await;
        self.inner.delete_inactive(older_than).await
    }
}

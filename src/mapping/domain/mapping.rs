//! Thread mapping aggregate root.

use super::{
    ChannelConversationId, ChannelUserId, ContextMetadata, ConversationContext, ConversationType,
    MappingStatus, ScopeKey, TenantId, ThreadId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Durable record binding one scope key to one thread identifier.
///
/// Exactly one mapping exists per scope key, and its thread identifier is
/// never reassigned. `last_activity_at` only moves forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMapping {
    scope_key: ScopeKey,
    thread_id: ThreadId,
    conversation_type: ConversationType,
    channel_conversation_id: ChannelConversationId,
    channel_user_id: ChannelUserId,
    metadata: ContextMetadata,
    status: MappingStatus,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted thread mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedMappingData {
    /// Persisted scope key.
    pub scope_key: ScopeKey,
    /// Persisted thread identifier.
    pub thread_id: ThreadId,
    /// Persisted conversation kind.
    pub conversation_type: ConversationType,
    /// Channel conversation that originated the mapping.
    pub channel_conversation_id: ChannelConversationId,
    /// Channel user that originated the mapping.
    pub channel_user_id: ChannelUserId,
    /// Passthrough metadata captured at creation.
    pub metadata: ContextMetadata,
    /// Persisted lifecycle status.
    pub status: MappingStatus,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest activity timestamp.
    pub last_activity_at: DateTime<Utc>,
}

impl ThreadMapping {
    /// Creates a new active mapping for a first resolution.
    ///
    /// `created_at` and `last_activity_at` are set to the same instant.
    #[must_use]
    pub fn new(
        scope_key: ScopeKey,
        thread_id: ThreadId,
        context: &ConversationContext,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            scope_key,
            thread_id,
            conversation_type: context.conversation_type(),
            channel_conversation_id: context.channel_conversation_id().clone(),
            channel_user_id: context.channel_user_id().clone(),
            metadata: context.metadata().clone(),
            status: MappingStatus::Active,
            created_at: timestamp,
            last_activity_at: timestamp,
        }
    }

    /// Reconstructs a mapping from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedMappingData) -> Self {
        Self {
            scope_key: data.scope_key,
            thread_id: data.thread_id,
            conversation_type: data.conversation_type,
            channel_conversation_id: data.channel_conversation_id,
            channel_user_id: data.channel_user_id,
            metadata: data.metadata,
            status: data.status,
            created_at: data.created_at,
            last_activity_at: data.last_activity_at,
        }
    }

    /// Returns the scope key.
    #[must_use]
    pub const fn scope_key(&self) -> &ScopeKey {
        &self.scope_key
    }

    /// Returns the thread identifier.
    #[must_use]
    pub const fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    /// Returns the tenant the mapping belongs to.
    #[must_use]
    pub const fn tenant_id(&self) -> &TenantId {
        self.scope_key.tenant_id()
    }

    /// Returns the conversation kind.
    #[must_use]
    pub const fn conversation_type(&self) -> ConversationType {
        self.conversation_type
    }

    /// Returns the originating channel conversation.
    #[must_use]
    pub const fn channel_conversation_id(&self) -> &ChannelConversationId {
        &self.channel_conversation_id
    }

    /// Returns the originating channel user.
    #[must_use]
    pub const fn channel_user_id(&self) -> &ChannelUserId {
        &self.channel_user_id
    }

    /// Returns the passthrough metadata captured at creation.
    #[must_use]
    pub const fn metadata(&self) -> &ContextMetadata {
        &self.metadata
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> MappingStatus {
        self.status
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest activity timestamp.
    #[must_use]
    pub const fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    /// Records activity at `at` and reactivates the mapping.
    ///
    /// Older timestamps are ignored so activity never moves backwards.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_activity_at {
            self.last_activity_at = at;
        }
        self.status = MappingStatus::Active;
    }

    /// Marks the mapping inactive without touching its activity timestamp.
    pub const fn deactivate(&mut self) {
        self.status = MappingStatus::Inactive;
    }

    /// Returns `true` when the last activity happened strictly before
    /// `cutoff`.
    #[must_use]
    pub fn is_inactive_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_activity_at < cutoff
    }

    /// Rebuilds the channel context the mapping was created from, for
    /// proactive messaging without an inbound trigger.
    #[must_use]
    pub fn conversation_context(&self) -> ConversationContext {
        ConversationContext::new(
            self.channel_conversation_id.clone(),
            self.channel_user_id.clone(),
            self.conversation_type,
            self.tenant_id().clone(),
        )
        .with_metadata(self.metadata.clone())
    }
}

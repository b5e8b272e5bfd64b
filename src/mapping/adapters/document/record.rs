//! Stored document layout and key encoding.

use crate::mapping::{
    domain::{
        ChannelConversationId, ChannelUserId, ContextMetadata, ConversationType, MappingStatus,
        PersistedMappingData, ScopeKey, TenantId, ThreadId, ThreadMapping,
    },
    ports::{MappingStoreError, MappingStoreResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JSON document persisted for each mapping.
///
/// `partition_key` holds the tenant; `id` holds the thread identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(super) struct MappingDocument {
    pub id: String,
    pub partition_key: String,
    pub scope_key: String,
    pub conversation_type: String,
    pub channel_conversation_id: String,
    pub channel_user_id: String,
    pub status: String,
    #[serde(default)]
    pub metadata: ContextMetadata,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl MappingDocument {
    pub(super) fn from_mapping(mapping: &ThreadMapping) -> Self {
        Self {
            id: mapping.thread_id().as_str().to_owned(),
            partition_key: mapping.tenant_id().as_str().to_owned(),
            scope_key: mapping.scope_key().as_str().to_owned(),
            conversation_type: mapping.conversation_type().as_str().to_owned(),
            channel_conversation_id: mapping.channel_conversation_id().as_str().to_owned(),
            channel_user_id: mapping.channel_user_id().as_str().to_owned(),
            status: mapping.status().as_str().to_owned(),
            metadata: mapping.metadata().clone(),
            created_at: mapping.created_at(),
            last_activity_at: mapping.last_activity_at(),
        }
    }

    pub(super) fn into_mapping(self) -> MappingStoreResult<ThreadMapping> {
        let tenant_id =
            TenantId::new(self.partition_key).map_err(MappingStoreError::invalid_persisted_data)?;
        let thread_id = ThreadId::new(self.id).map_err(MappingStoreError::invalid_persisted_data)?;
        let conversation_type = ConversationType::try_from(self.conversation_type.as_str())
            .map_err(MappingStoreError::invalid_persisted_data)?;
        let status = MappingStatus::try_from(self.status.as_str())
            .map_err(MappingStoreError::invalid_persisted_data)?;
        let channel_conversation_id = ChannelConversationId::new(self.channel_conversation_id)
            .map_err(MappingStoreError::invalid_persisted_data)?;
        let channel_user_id = ChannelUserId::new(self.channel_user_id)
            .map_err(MappingStoreError::invalid_persisted_data)?;

        Ok(ThreadMapping::from_persisted(PersistedMappingData {
            scope_key: ScopeKey::from_persisted(tenant_id, self.scope_key),
            thread_id,
            conversation_type,
            channel_conversation_id,
            channel_user_id,
            metadata: self.metadata,
            status,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
        }))
    }

    pub(super) fn decode(bytes: &[u8]) -> MappingStoreResult<Self> {
        serde_json::from_slice(bytes).map_err(MappingStoreError::invalid_persisted_data)
    }

    pub(super) fn encode(&self) -> MappingStoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(MappingStoreError::persistence)
    }
}

/// Key prefix selecting one tenant partition.
///
/// The tenant is length-prefixed so one tenant's prefix never matches
/// another tenant's keys.
pub(super) fn partition_prefix(tenant_id: &TenantId) -> String {
    format!("{}:{}/", tenant_id.as_str().len(), tenant_id.as_str())
}

/// Document key: partition prefix followed by the thread identifier.
pub(super) fn document_key(tenant_id: &TenantId, thread_id: &ThreadId) -> String {
    format!("{}{}", partition_prefix(tenant_id), thread_id.as_str())
}

/// Scope index key: partition prefix followed by the canonical scope key.
pub(super) fn scope_index_key(scope_key: &ScopeKey) -> String {
    format!("{}{}", partition_prefix(scope_key.tenant_id()), scope_key.as_str())
}

//! Diesel row models for thread mapping persistence.

use super::schema::thread_mappings;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for thread mapping records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = thread_mappings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ThreadMappingRow {
    /// Opaque thread identifier.
    pub thread_id: String,
    /// Tenant isolation boundary.
    pub tenant_id: String,
    /// Canonical scope key.
    pub scope_key: String,
    /// Conversation kind.
    pub conversation_type: String,
    /// Originating channel conversation.
    pub channel_conversation_id: String,
    /// Originating channel user.
    pub channel_user_id: String,
    /// Lifecycle status.
    pub status: String,
    /// Passthrough metadata JSON payload.
    pub metadata: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest activity timestamp.
    pub last_activity_at: DateTime<Utc>,
}

/// Insert model for thread mapping records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = thread_mappings)]
pub struct NewThreadMappingRow {
    /// Opaque thread identifier.
    pub thread_id: String,
    /// Tenant isolation boundary.
    pub tenant_id: String,
    /// Canonical scope key.
    pub scope_key: String,
    /// Conversation kind.
    pub conversation_type: String,
    /// Originating channel conversation.
    pub channel_conversation_id: String,
    /// Originating channel user.
    pub channel_user_id: String,
    /// Lifecycle status.
    pub status: String,
    /// Passthrough metadata JSON payload.
    pub metadata: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest activity timestamp.
    pub last_activity_at: DateTime<Utc>,
}

//! Diesel schema for thread mapping persistence.

diesel::table! {
    /// Conversation-to-thread mapping records.
    thread_mappings (thread_id) {
        /// Opaque thread identifier handed to the workflow engine.
        thread_id -> Text,
        /// Tenant isolation boundary.
        tenant_id -> Text,
        /// Canonical scope key, unique per tenant.
        scope_key -> Text,
        /// Conversation kind (personal, group, or channel thread).
        #[max_length = 32]
        conversation_type -> Varchar,
        /// Originating channel conversation.
        channel_conversation_id -> Text,
        /// Originating channel user.
        channel_user_id -> Text,
        /// Lifecycle status (active or inactive).
        #[max_length = 16]
        status -> Varchar,
        /// Passthrough metadata as JSONB.
        metadata -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Latest activity timestamp.
        last_activity_at -> Timestamptz,
    }
}

//! Normalized conversation identity and its validation.

use super::{
    ChannelConversationId, ChannelUserId, ContextField, ContextValidationError, ConversationType,
    TenantId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque passthrough values (display name, channel kind, service endpoint).
///
/// Metadata never participates in identity derivation.
pub type ContextMetadata = BTreeMap<String, String>;

/// Identity fields as extracted by a channel adapter, before validation.
///
/// Every field is optional so that adapters can forward exactly what the
/// channel supplied; [`ContextValidator::validate`] decides what is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConversationContext {
    /// Channel-assigned conversation identifier.
    pub channel_conversation_id: Option<String>,
    /// Most stable available user identity.
    pub channel_user_id: Option<String>,
    /// Conversation kind as reported by the channel.
    pub conversation_type: Option<String>,
    /// Tenant isolation boundary.
    pub tenant_id: Option<String>,
    /// Opaque passthrough values.
    #[serde(default)]
    pub metadata: ContextMetadata,
}

impl RawConversationContext {
    /// Creates a raw context with every identity field populated.
    #[must_use]
    pub fn new(
        channel_conversation_id: impl Into<String>,
        channel_user_id: impl Into<String>,
        conversation_type: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            channel_conversation_id: Some(channel_conversation_id.into()),
            channel_user_id: Some(channel_user_id.into()),
            conversation_type: Some(conversation_type.into()),
            tenant_id: Some(tenant_id.into()),
            metadata: ContextMetadata::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Validated conversation identity for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    channel_conversation_id: ChannelConversationId,
    channel_user_id: ChannelUserId,
    conversation_type: ConversationType,
    tenant_id: TenantId,
    metadata: ContextMetadata,
}

impl ConversationContext {
    /// Creates a context from already-validated parts.
    #[must_use]
    pub const fn new(
        channel_conversation_id: ChannelConversationId,
        channel_user_id: ChannelUserId,
        conversation_type: ConversationType,
        tenant_id: TenantId,
    ) -> Self {
        Self {
            channel_conversation_id,
            channel_user_id,
            conversation_type,
            tenant_id,
            metadata: ContextMetadata::new(),
        }
    }

    /// Replaces the passthrough metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ContextMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the channel conversation identifier.
    #[must_use]
    pub const fn channel_conversation_id(&self) -> &ChannelConversationId {
        &self.channel_conversation_id
    }

    /// Returns the channel user identifier.
    #[must_use]
    pub const fn channel_user_id(&self) -> &ChannelUserId {
        &self.channel_user_id
    }

    /// Returns the conversation kind.
    #[must_use]
    pub const fn conversation_type(&self) -> ConversationType {
        self.conversation_type
    }

    /// Returns the tenant identifier.
    #[must_use]
    pub const fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the passthrough metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ContextMetadata {
        &self.metadata
    }
}

/// Validates raw channel contexts according to the channel's tenancy model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextValidator {
    multi_tenant: bool,
    default_tenant: Option<TenantId>,
}

impl Default for ContextValidator {
    fn default() -> Self {
        Self::multi_tenant()
    }
}

impl ContextValidator {
    /// Creates a validator for a multi-tenant channel; every message must
    /// carry a tenant.
    #[must_use]
    pub const fn multi_tenant() -> Self {
        Self {
            multi_tenant: true,
            default_tenant: None,
        }
    }

    /// Creates a validator for a single-tenant channel.
    ///
    /// Messages without a tenant are attributed to `default_tenant`.
    #[must_use]
    pub const fn single_tenant(default_tenant: TenantId) -> Self {
        Self {
            multi_tenant: false,
            default_tenant: Some(default_tenant),
        }
    }

    /// Validates a raw context.
    ///
    /// All failures are collected before returning.
    ///
    /// # Errors
    ///
    /// Returns [`ContextValidationError`] when a required field is absent or
    /// blank, when the conversation type is unknown, or when the tenant is
    /// missing on a multi-tenant channel. Several failures are combined into
    /// [`ContextValidationError::Multiple`].
    pub fn validate(
        &self,
        raw: &RawConversationContext,
    ) -> Result<ConversationContext, ContextValidationError> {
        let mut errors = Vec::new();

        let conversation_id = required(
            raw.channel_conversation_id.as_deref(),
            ContextField::ChannelConversationId,
            &mut errors,
        )
        .and_then(|value| ChannelConversationId::new(value).ok());
        let user_id = required(
            raw.channel_user_id.as_deref(),
            ContextField::ChannelUserId,
            &mut errors,
        )
        .and_then(|value| ChannelUserId::new(value).ok());
        let conversation_type = required(
            raw.conversation_type.as_deref(),
            ContextField::ConversationType,
            &mut errors,
        )
        .and_then(|value| match ConversationType::try_from(value) {
            Ok(kind) => Some(kind),
            Err(err) => {
                errors.push(err.into());
                None
            }
        });
        let tenant_id = self.resolve_tenant(raw.tenant_id.as_deref(), &mut errors);

        if let Some(err) = ContextValidationError::from_collected(errors) {
            return Err(err);
        }

        match (conversation_id, user_id, conversation_type, tenant_id) {
            (Some(conversation), Some(user), Some(kind), Some(tenant)) => {
                Ok(ConversationContext::new(conversation, user, kind, tenant)
                    .with_metadata(raw.metadata.clone()))
            }
            _ => Err(ContextValidationError::MissingField(
                ContextField::ChannelConversationId,
            )),
        }
    }

    fn resolve_tenant(
        &self,
        raw: Option<&str>,
        errors: &mut Vec<ContextValidationError>,
    ) -> Option<TenantId> {
        if let Some(tenant) = raw.and_then(|value| TenantId::new(value).ok()) {
            return Some(tenant);
        }
        if self.multi_tenant {
            errors.push(ContextValidationError::MissingTenant);
            return None;
        }
        let fallback = self.default_tenant.clone();
        if fallback.is_none() {
            errors.push(ContextValidationError::MissingField(ContextField::TenantId));
        }
        fallback
    }
}

fn required<'a>(
    value: Option<&'a str>,
    field: ContextField,
    errors: &mut Vec<ContextValidationError>,
) -> Option<&'a str> {
    match value.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => Some(trimmed),
        _ => {
            errors.push(ContextValidationError::MissingField(field));
            None
        }
    }
}

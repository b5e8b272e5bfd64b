//! Error types for conversation context validation and domain parsing.

use std::fmt;
use thiserror::Error;

/// Identity fields a channel adapter must supply for every inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextField {
    /// Channel-assigned conversation identifier.
    ChannelConversationId,
    /// Most stable available user identity.
    ChannelUserId,
    /// Personal, group, or channel-thread classification.
    ConversationType,
    /// Tenant isolation boundary.
    TenantId,
}

impl ContextField {
    /// Returns the field name as it appears in raw channel payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChannelConversationId => "channel_conversation_id",
            Self::ChannelUserId => "channel_user_id",
            Self::ConversationType => "conversation_type",
            Self::TenantId => "tenant_id",
        }
    }
}

impl fmt::Display for ContextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while turning a raw channel context into a
/// [`super::ConversationContext`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextValidationError {
    /// A required identity field is absent or blank.
    #[error("required field '{0}' is missing or empty")]
    MissingField(ContextField),

    /// The tenant is absent on a channel known to be multi-tenant.
    #[error("tenant_id is required on a multi-tenant channel")]
    MissingTenant,

    /// The conversation type is not one of the supported kinds.
    #[error(transparent)]
    UnknownConversationType(#[from] ParseConversationTypeError),

    /// Several fields failed validation.
    #[error("multiple validation errors: {}", format_errors(.0))]
    Multiple(Vec<Self>),
}

fn format_errors(errors: &[ContextValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ContextValidationError {
    /// Folds collected errors into a single error.
    ///
    /// Returns `None` when `errors` is empty and the sole error unwrapped when
    /// exactly one was collected.
    #[must_use]
    pub fn from_collected(mut errors: Vec<Self>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// Returns every individual error, flattening [`Self::Multiple`].
    #[must_use]
    pub fn errors(&self) -> Vec<&Self> {
        match self {
            Self::Multiple(inner) => inner.iter().flat_map(Self::errors).collect(),
            other => vec![other],
        }
    }
}

/// Errors returned while constructing identity values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingDomainError {
    /// The identifier is empty after trimming.
    #[error("{0} must not be empty")]
    EmptyIdentifier(&'static str),
}

/// Error returned while parsing a conversation type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown conversation type: {0}")]
pub struct ParseConversationTypeError(pub String);

/// Error returned while parsing a mapping status from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown mapping status: {0}")]
pub struct ParseMappingStatusError(pub String);

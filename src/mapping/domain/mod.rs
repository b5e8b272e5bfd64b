//! Domain model for conversation-to-thread mapping.
//!
//! The mapping domain models channel identities, the scope keys derived from
//! them, and the durable thread mappings kept by the database strategy. All
//! infrastructure concerns are kept outside the domain boundary.

mod context;
mod conversation_type;
mod error;
mod ids;
mod mapping;
mod resolution;
mod scope;
mod status;

pub use context::{ContextMetadata, ContextValidator, ConversationContext, RawConversationContext};
pub use conversation_type::ConversationType;
pub use error::{
    ContextField, ContextValidationError, MappingDomainError, ParseConversationTypeError,
    ParseMappingStatusError,
};
pub use ids::{ChannelConversationId, ChannelUserId, TenantId, ThreadId};
pub use mapping::{PersistedMappingData, ThreadMapping};
pub use resolution::{Resolution, StrategyKind};
pub use scope::ScopeKey;
pub use status::MappingStatus;

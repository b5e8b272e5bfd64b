//! Identifier types for the conversation mapping domain.

use super::MappingDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! identity_newtype {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a validated ", $label, ".")]
            ///
            /// Surrounding whitespace is trimmed.
            ///
            /// # Errors
            ///
            /// Returns [`MappingDomainError::EmptyIdentifier`] when the value is
            /// empty after trimming.
            pub fn new(value: impl Into<String>) -> Result<Self, MappingDomainError> {
                let raw = value.into();
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(MappingDomainError::EmptyIdentifier($label));
                }
                Ok(Self(trimmed.to_owned()))
            }

            #[doc = concat!("Returns the ", $label, " as a string slice.")]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identity_newtype!(
    /// Tenant isolation boundary (for example an Azure AD tenant).
    TenantId,
    "tenant identifier"
);

identity_newtype!(
    /// User identity as reported by the channel, preferring a directory
    /// identity over a channel-local one.
    ChannelUserId,
    "channel user identifier"
);

identity_newtype!(
    /// Conversation identifier assigned by the channel.
    ChannelConversationId,
    "channel conversation identifier"
);

identity_newtype!(
    /// Opaque, stable key handed to the workflow engine's checkpoint store.
    ///
    /// A thread identifier is never reassigned to a different scope.
    ThreadId,
    "thread identifier"
);

impl ThreadId {
    /// Builds a thread identifier from a prefix and a generated suffix.
    pub(crate) fn prefixed(prefix: &str, suffix: &str) -> Self {
        Self(format!("{prefix}-{suffix}"))
    }
}

impl From<&ChannelConversationId> for ThreadId {
    fn from(value: &ChannelConversationId) -> Self {
        Self(value.as_str().to_owned())
    }
}

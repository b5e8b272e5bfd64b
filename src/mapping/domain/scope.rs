//! Scope keys: the identity tuple a thread is actually keyed on.

use super::{ConversationContext, TenantId};
use serde::{Deserialize, Serialize};
use std::fmt;

const SEPARATOR: char = '|';
const PERSONAL_SCOPE: &str = "personal";
const SHARED_SCOPE: &str = "shared";

/// Canonical key derived from a [`ConversationContext`].
///
/// Personal conversations are keyed on `tenant|personal|user`, so the same
/// user reaching the bot from another device or session lands in the same
/// thread. Group chats and channel threads are keyed on
/// `tenant|shared|conversation`, so all participants share one thread. The
/// tenant is always part of the key.
///
/// Components are escaped (`\` becomes `\\` and `|` becomes `\|`) so distinct
/// tuples never collapse onto the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    tenant_id: TenantId,
    canonical: String,
}

impl ScopeKey {
    /// Derives the scope key for a validated context.
    #[must_use]
    pub fn derive(context: &ConversationContext) -> Self {
        let tenant_id = context.tenant_id().clone();
        let (scope, subject) = if context.conversation_type().is_shared() {
            (SHARED_SCOPE, context.channel_conversation_id().as_str())
        } else {
            (PERSONAL_SCOPE, context.channel_user_id().as_str())
        };

        let mut canonical = escape(tenant_id.as_str());
        canonical.push(SEPARATOR);
        canonical.push_str(scope);
        canonical.push(SEPARATOR);
        canonical.push_str(&escape(subject));

        Self {
            tenant_id,
            canonical,
        }
    }

    /// Reconstructs a scope key from persisted storage.
    #[must_use]
    pub const fn from_persisted(tenant_id: TenantId, canonical: String) -> Self {
        Self {
            tenant_id,
            canonical,
        }
    }

    /// Returns the tenant the key belongs to.
    #[must_use]
    pub const fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the canonical key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

impl AsRef<str> for ScopeKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

fn escape(component: &str) -> String {
    let mut escaped = String::with_capacity(component.len());
    for ch in component.chars() {
        if ch == '\\' || ch == SEPARATOR {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

//! Outcome of resolving a conversation to a thread.

use super::{ThreadId, ThreadMapping};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Thread identifier derivation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Channel conversation identifier used verbatim.
    Direct,
    /// Deterministic hash of the scope key; storage-free.
    #[default]
    Hash,
    /// Durable mapping with reverse lookup and lifecycle tracking.
    Database,
}

impl StrategyKind {
    /// Returns the configuration name of the strategy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Hash => "hash",
            Self::Database => "database",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thread identifier plus the bookkeeping known at resolution time.
///
/// Stateless strategies cannot tell whether a thread is new and carry no
/// timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    thread_id: ThreadId,
    strategy: StrategyKind,
    is_new: bool,
    created_at: Option<DateTime<Utc>>,
    last_activity_at: Option<DateTime<Utc>>,
}

impl Resolution {
    /// Creates a resolution for a stateless strategy.
    #[must_use]
    pub const fn stateless(thread_id: ThreadId, strategy: StrategyKind) -> Self {
        Self {
            thread_id,
            strategy,
            is_new: false,
            created_at: None,
            last_activity_at: None,
        }
    }

    /// Creates a resolution for a mapping that was just inserted.
    #[must_use]
    pub fn created(mapping: &ThreadMapping) -> Self {
        Self {
            thread_id: mapping.thread_id().clone(),
            strategy: StrategyKind::Database,
            is_new: true,
            created_at: Some(mapping.created_at()),
            last_activity_at: Some(mapping.last_activity_at()),
        }
    }

    /// Creates a resolution for an existing mapping touched at `touched_at`.
    #[must_use]
    pub fn existing(mapping: &ThreadMapping, touched_at: DateTime<Utc>) -> Self {
        Self {
            thread_id: mapping.thread_id().clone(),
            strategy: StrategyKind::Database,
            is_new: false,
            created_at: Some(mapping.created_at()),
            last_activity_at: Some(touched_at.max(mapping.last_activity_at())),
        }
    }

    /// Returns the thread identifier.
    #[must_use]
    pub const fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    /// Consumes the resolution, returning the thread identifier.
    #[must_use]
    pub fn into_thread_id(self) -> ThreadId {
        self.thread_id
    }

    /// Returns the strategy that produced the identifier.
    #[must_use]
    pub const fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    /// Returns `true` when this resolution created the mapping.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    /// Returns the mapping creation timestamp, when known.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Returns the latest activity timestamp, when known.
    #[must_use]
    pub const fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        self.last_activity_at
    }
}

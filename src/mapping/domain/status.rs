//! Mapping lifecycle status.

use super::ParseMappingStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a persisted thread mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    /// The conversation is live and listed in active listings.
    Active,
    /// The conversation was deactivated (for example, the bot was removed).
    Inactive,
}

impl MappingStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for MappingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MappingStatus {
    type Error = ParseMappingStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(ParseMappingStatusError(value.to_owned())),
        }
    }
}

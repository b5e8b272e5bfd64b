//! Conversation classification.

use super::ParseConversationTypeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of conversation a message arrived in.
///
/// The kind decides what a thread is keyed on: personal chats follow the user
/// across devices and sessions, while group chats and channel threads are
/// shared by every participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    /// One-to-one chat between a user and the bot.
    Personal,
    /// Multi-user group chat.
    Group,
    /// Thread within a team channel.
    ChannelThread,
}

impl ConversationType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Group => "group",
            Self::ChannelThread => "channel_thread",
        }
    }

    /// Returns `true` when every participant shares one thread.
    #[must_use]
    pub const fn is_shared(self) -> bool {
        matches!(self, Self::Group | Self::ChannelThread)
    }
}

impl fmt::Display for ConversationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ConversationType {
    type Error = ParseConversationTypeError;

    /// Parses canonical names and the aliases channels commonly emit
    /// (`groupChat`, `channel`, ...), ignoring case.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "personal" => Ok(Self::Personal),
            "group" | "groupchat" | "group_chat" => Ok(Self::Group),
            "channel" | "channel_thread" | "channelthread" => Ok(Self::ChannelThread),
            _ => Err(ParseConversationTypeError(value.to_owned())),
        }
    }
}

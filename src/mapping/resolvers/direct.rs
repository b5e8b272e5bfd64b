//! Passthrough strategy.

use crate::mapping::{
    domain::{ConversationContext, Resolution, StrategyKind, ThreadId},
    ports::{ResolutionResult, ThreadIdResolver},
};
use async_trait::async_trait;

/// Uses the channel conversation identifier as the thread identifier.
///
/// Threads are conversation-scoped: a user who reaches the bot from a new
/// device or session gets a new thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectResolver;

impl DirectResolver {
    /// Creates the resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ThreadIdResolver for DirectResolver {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Direct
    }

    async fn resolve(&self, context: &ConversationContext) -> ResolutionResult<Resolution> {
        let thread_id = ThreadId::from(context.channel_conversation_id());
        Ok(Resolution::stateless(thread_id, StrategyKind::Direct))
    }
}

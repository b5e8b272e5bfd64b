//! Conversation-to-thread mapping.
//!
//! Resolves the identity of an inbound channel message to the stable thread
//! identifier a stateful workflow engine keys its checkpoints on.
//!
//! # Architecture
//!
//! - **Domain**: contexts, scope keys and durable mappings
//! - **Ports**: the mapping store and strategy traits
//! - **Adapters**: in-memory, document and `PostgreSQL` stores
//! - **Resolvers**: direct, hash and database strategies
//! - **Services**: the resolution façade, lifecycle sweeps and wiring

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod resolvers;
pub mod services;

#[cfg(test)]
mod tests;

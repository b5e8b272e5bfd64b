//! Port contracts for conversation-to-thread mapping.
//!
//! Ports define infrastructure-agnostic interfaces used by resolvers and
//! services.

pub mod resolver;
pub mod store;

pub use resolver::{ResolutionError, ResolutionResult, ThreadIdResolver};
pub use store::{MappingStore, MappingStoreError, MappingStoreResult};

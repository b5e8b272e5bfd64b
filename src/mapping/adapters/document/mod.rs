//! Document-oriented mapping store backed by an embedded `sled` database.
//!
//! Mappings are stored as JSON documents partitioned by tenant. Two secondary
//! trees act as indexes: a unique scope index (`tenant`, `scope_key`) →
//! `thread_id`, and a thread index `thread_id` → document key for
//! cross-partition reverse lookups.

mod record;
mod store;

pub use store::DocumentMappingStore;

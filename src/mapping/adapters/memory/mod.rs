//! In-process mapping store.

mod store;

pub use store::InMemoryMappingStore;

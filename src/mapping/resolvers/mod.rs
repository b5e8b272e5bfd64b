//! Thread identifier strategies.
//!
//! Each strategy implements [`ThreadIdResolver`](crate::mapping::ports::ThreadIdResolver);
//! callers select one at configuration time rather than branching on the
//! strategy at every call site.

mod database;
mod direct;
mod hash;

pub use database::{DEFAULT_STORE_TIMEOUT, DatabaseResolver, MAX_RESOLVE_ATTEMPTS};
pub use direct::DirectResolver;
pub use hash::{DEFAULT_HASH_LENGTH, DEFAULT_THREAD_PREFIX, HashResolver, MAX_HASH_LENGTH};

//! `PostgreSQL` adapter for thread mapping persistence.

mod models;
mod repository;
mod schema;

pub use repository::{CREATE_THREAD_MAPPINGS_SQL, MappingPgPool, PostgresMappingStore};

#[cfg(test)]
pub(crate) use models::ThreadMappingRow;
#[cfg(test)]
pub(crate) use repository::{classify_unique_violation, row_to_mapping, to_new_row};

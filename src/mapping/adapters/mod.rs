//! Adapter implementations of the mapping store port.
//!
//! - [`memory`]: in-process store for tests and single-process hosts
//! - [`document`]: document-oriented backend, partitioned by tenant
//! - [`postgres`]: relational backend with a unique (tenant, scope) index

pub mod document;
pub mod memory;
pub mod postgres;

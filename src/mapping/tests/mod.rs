//! Unit tests for the mapping module.
//!
//! Tests are organised by layer: domain rules, strategies, store adapters,
//! lifecycle management, and service wiring.

mod support;

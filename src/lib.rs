//! Thread bridge: stable thread identifiers for conversational channels.
//!
//! A message arriving from a chat platform, messaging app or voice assistant
//! carries a channel-specific identity. This crate turns that identity into
//! an opaque thread identifier for a workflow engine's checkpoint store, so
//! that the same user or the same group conversation always lands in the
//! same thread.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: Pure identity rules with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for storage and strategies
//! - **Adapters**: Concrete store implementations (embedded, relational)
//!
//! # Modules
//!
//! - [`mapping`]: Context validation, thread resolution, and mapping lifecycle
//! - [`config`]: YAML configuration surface
//! - [`telemetry`]: Log subscriber setup

pub mod config;
pub mod mapping;
pub mod telemetry;

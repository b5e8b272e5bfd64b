//! Application services for thread resolution and mapping lifecycle.

mod lifecycle;
mod resolution;
mod runtime;

pub use lifecycle::{
    DEFAULT_SWEEP_BATCH_SIZE, LifecycleError, LifecycleResult, MappingLifecycleManager,
    SweepReport,
};
pub use resolution::ResolutionService;
pub use runtime::{BridgeRuntime, RuntimeBuildError};

//! Step definitions for thread resolution scenarios.

mod given;
mod then;

//! Mock command runner for testing.
//!
//! This module provides `MockRunner` and sample outputs of the Slurm tools so
//! providers can be exercised without a cluster.

mod runner;
mod scenarios;

pub use runner::MockRunner;
pub use scenarios::*;

//! Abstraction over external command execution to enable testing and mocking.
//!
//! The `CommandRunner` trait allows providers to invoke the real Slurm tools
//! or a scripted implementation for tests that run without a cluster.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::exec::{ExecError, run_with_timeout};

/// Abstraction for running an external command to completion.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` and returns its standard output.
    ///
    /// # Arguments
    /// * `program` - Tool name, e.g. `scontrol` or `sacct`
    /// * `args` - Arguments passed verbatim
    /// * `timeout` - Hard deadline for the whole invocation
    ///
    /// # Returns
    /// Captured stdout on success. `ExecError::Timeout` when the deadline
    /// elapsed, `ExecError::Failed` for spawn failures and non-zero exits.
    fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<String, ExecError>;
}

/// Runner that executes the real Slurm binaries.
///
/// Binaries are looked up in `binaries_path` when set, otherwise through `$PATH`.
#[derive(Debug, Default, Clone)]
pub struct SlurmRunner {
    binaries_path: Option<PathBuf>,
}

impl SlurmRunner {
    /// Creates a runner resolving tools through `$PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner resolving tools inside `dir`.
    pub fn with_binaries_path(dir: impl Into<PathBuf>) -> Self {
        Self {
            binaries_path: Some(dir.into()),
        }
    }

    fn resolve(&self, program: &str) -> PathBuf {
        match &self.binaries_path {
            Some(dir) => dir.join(program),
            None => Path::new(program).to_path_buf(),
        }
    }
}

impl CommandRunner for SlurmRunner {
    fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<String, ExecError> {
        run_with_timeout(&self.resolve(program), args, timeout)
    }
}

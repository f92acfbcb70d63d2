//! Provider abstraction for Slurm data sources.
//!
//! This module defines the `DataProvider` trait: a lock-protected holder of
//! the latest snapshot of one data source, refreshed by `fetch()` and read
//! through copies. Concrete providers bind a Slurm command, a column schema
//! and a filter predicate to the shared [`ProviderState`].

mod filter;
mod jobs;
mod nodes;
mod partitions;
mod sacct;
mod sacctmgr;
mod scontrol;
mod sdiag;
mod set;
mod state;

pub use filter::FilterArgs;
pub use jobs::JobsProvider;
pub use nodes::NodesProvider;
pub use partitions::PartitionsProvider;
pub use sacct::{SacctProvider, WindowPlan, plan_window};
pub use sacctmgr::{SacctMgrEntity, SacctMgrProvider, SacctMgrSnapshot};
pub use sdiag::SdiagProvider;
pub use set::ProviderSet;
pub use state::{Phase, ProviderState, fetches_completed};

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::collector::{CommandRunner, ExecError, Record};
use crate::config::{Config, ConfigError};
use crate::storage::{CacheError, Column, TableData};

/// Error types that can occur during a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The external command exceeded its deadline.
    Timeout { command: String, after: Duration },
    /// The external command failed or exited non-zero.
    Execution(String),
    /// The accounting cache could not be written.
    Cache(String),
    /// An invalid selection reached the provider.
    Config(ConfigError),
    /// Another fetch of the same provider is still running.
    Busy,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Timeout { command, after } => {
                write!(f, "Timeout: {} did not finish within {:?}", command, after)
            }
            ProviderError::Execution(msg) => write!(f, "Execution error: {}", msg),
            ProviderError::Cache(msg) => write!(f, "Cache error: {}", msg),
            ProviderError::Config(e) => write!(f, "Configuration error: {}", e),
            ProviderError::Busy => write!(f, "Fetch already in progress"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<ExecError> for ProviderError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Timeout { command, after } => ProviderError::Timeout { command, after },
            ExecError::Failed { .. } => ProviderError::Execution(e.to_string()),
        }
    }
}

impl From<CacheError> for ProviderError {
    fn from(e: CacheError) -> Self {
        ProviderError::Cache(e.to_string())
    }
}

impl From<ConfigError> for ProviderError {
    fn from(e: ConfigError) -> Self {
        ProviderError::Config(e)
    }
}

/// A data source holding the latest snapshot of one Slurm view.
///
/// Implementors supply the state, the fetch pipeline and the filter; reads,
/// subscriptions and shutdown come with the trait.
pub trait DataProvider: Send + Sync {
    type Data: Clone + Default + Send + Sync;

    /// Shared state holding the live snapshot.
    fn state(&self) -> &ProviderState<Self::Data>;

    /// Runs the command and parse pipeline and publishes the result.
    ///
    /// On failure the previous snapshot stays in place and the error is
    /// available from [`last_error`](Self::last_error).
    fn fetch(&self) -> Result<(), ProviderError>;

    /// Copy of the live snapshot restricted to rows matching `filter`.
    fn filtered_data(&self, filter: &FilterArgs) -> Self::Data;

    /// Independent copy of the live snapshot.
    fn data(&self) -> Self::Data {
        self.state().data()
    }

    /// Time of the last successful fetch.
    fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state().last_updated()
    }

    /// Error of the last fetch, cleared by the next success.
    fn last_error(&self) -> Option<ProviderError> {
        self.state().last_error()
    }

    /// Notification queue signalled after each successful fetch.
    fn subscribe(&self) -> Receiver<()> {
        self.state().subscribe()
    }

    /// Releases every subscriber queue.
    fn close(&self) {
        self.state().close()
    }
}

/// Object-safe view of a provider used by the refresh scheduler.
pub trait RefreshTarget: Send + Sync {
    fn name(&self) -> &str;
    fn refresh(&self) -> Result<(), ProviderError>;
    fn updated_at(&self) -> Option<DateTime<Utc>>;
    fn refresh_error(&self) -> Option<ProviderError>;
    fn is_fetching(&self) -> bool;
}

impl<P: DataProvider> RefreshTarget for P {
    fn name(&self) -> &str {
        self.state().name()
    }

    fn refresh(&self) -> Result<(), ProviderError> {
        self.fetch()
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.state().last_updated()
    }

    fn refresh_error(&self) -> Option<ProviderError> {
        self.state().last_error()
    }

    fn is_fetching(&self) -> bool {
        self.state().is_fetching()
    }
}

/// Command runner and table settings shared by the providers.
#[derive(Clone)]
pub struct ProviderContext {
    pub runner: Arc<dyn CommandRunner>,
    pub request_timeout: Duration,
    pub max_column_width: usize,
    pub duplicate_rows: usize,
}

impl ProviderContext {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &Config) -> Self {
        Self {
            runner,
            request_timeout: config.request_timeout,
            max_column_width: config.max_column_width,
            duplicate_rows: config.duplicate_rows,
        }
    }

    /// Runs one external command with timing logged.
    pub(crate) fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let started = Instant::now();
        let result = self.runner.run(program, args, timeout);
        debug!(
            program,
            args = %args.join(" "),
            duration_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "command finished"
        );
        Ok(result?)
    }

    /// Builds a table from `records`, growing the widths of `previous`
    /// when it has the same columns.
    pub(crate) fn build_table(
        &self,
        records: &[Record],
        columns: &[Column],
        previous: &TableData,
        duplicate: usize,
    ) -> TableData {
        let same_layout = previous.headers.len() == columns.len()
            && previous
                .headers
                .iter()
                .zip(columns)
                .all(|(a, b)| a.name == b.name);
        let headers = if same_layout {
            previous.headers.clone()
        } else {
            columns.to_vec()
        };
        TableData::from_records(records, headers, self.max_column_width, duplicate)
    }
}

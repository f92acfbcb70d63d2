//! slurmtop - terminal dashboard for Slurm clusters.
//!
//! This library provides the data side of the dashboard:
//! - `collector` - runs the Slurm tools and parses their output
//! - `provider` - per-view snapshots refreshed by fetches
//! - `storage` - table model and the on-disk accounting cache
//! - `scheduler` - fetch and render cadence
//! - `tui` - the interactive front end

pub mod collector;
pub mod config;
pub mod provider;
pub mod scheduler;
pub mod storage;
pub mod tui;
pub mod util;

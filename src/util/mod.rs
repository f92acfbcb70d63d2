//! Utility modules for slurmtop.

mod duration;

pub use duration::{DurationParseError, format_duration, parse_duration};

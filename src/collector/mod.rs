//! Execution of Slurm commands and parsing of their output.

mod exec;
#[cfg(test)]
pub mod mock;
pub mod parser;
pub mod slurm;
pub mod traits;

pub use exec::{ExecError, commands_executed, run_with_timeout};
pub use parser::{
    PARSABLE_DELIMITER, Record, field, parse_block_output, parse_block_output_with,
    parse_delimited_output,
};
pub use slurm::ClusterInfo;
pub use traits::{CommandRunner, SlurmRunner};

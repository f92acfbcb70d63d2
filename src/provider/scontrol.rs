//! Table fetch shared by the `scontrol show <entity>` providers.

use crate::collector::parse_block_output;
use crate::collector::slurm::{SCONTROL, args};
use crate::storage::{Column, TableData};

use super::{ProviderContext, ProviderError};

/// One `scontrol show <entity> --detail --all --oneliner` listing.
pub(crate) struct ScontrolTable {
    entity: &'static str,
    /// Token starting each record, e.g. `NodeName=`.
    prefix: &'static str,
    pub(crate) columns: Vec<Column>,
}

impl ScontrolTable {
    pub(crate) fn new(entity: &'static str, prefix: &'static str, columns: Vec<Column>) -> Self {
        Self {
            entity,
            prefix,
            columns,
        }
    }

    pub(crate) fn args(&self) -> Vec<String> {
        args(&format!("show {} --detail --all --oneliner", self.entity))
    }

    /// Runs the listing and builds a table carrying the widths of `previous`.
    pub(crate) fn fetch(
        &self,
        ctx: &ProviderContext,
        previous: &TableData,
        duplicate: usize,
    ) -> Result<TableData, ProviderError> {
        let out = ctx.run(SCONTROL, &self.args(), ctx.request_timeout)?;
        let records = parse_block_output(self.prefix, &out);
        Ok(ctx.build_table(&records, &self.columns, previous, duplicate))
    }
}

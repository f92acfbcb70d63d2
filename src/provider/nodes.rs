use crate::storage::{Column, TableData};

use super::scontrol::ScontrolTable;
use super::{DataProvider, FilterArgs, ProviderContext, ProviderError, ProviderState};

/// Node listing from `scontrol show node`.
pub struct NodesProvider {
    state: ProviderState<TableData>,
    ctx: ProviderContext,
    source: ScontrolTable,
}

impl NodesProvider {
    /// `columns` must start with `NodeName`, `Partitions` and `State`.
    pub fn new(ctx: ProviderContext, columns: Vec<Column>) -> Self {
        Self {
            state: ProviderState::new("nodes"),
            ctx,
            source: ScontrolTable::new("node", "NodeName=", columns),
        }
    }
}

impl DataProvider for NodesProvider {
    type Data = TableData;

    fn state(&self) -> &ProviderState<TableData> {
        &self.state
    }

    fn fetch(&self) -> Result<(), ProviderError> {
        self.state.run_fetch(|| {
            let previous = self.state.data();
            self.source.fetch(&self.ctx, &previous, self.ctx.duplicate_rows)
        })
    }

    fn filtered_data(&self, filter: &FilterArgs) -> TableData {
        self.state.with_data(|data| {
            let partition = data.column_index("Partitions");
            let state = data.column_index("State");
            data.filtered(|row| {
                partition.is_none_or(|i| filter.partition_matches(&row[i]))
                    && state.is_none_or(|i| filter.state_contains(&row[i]))
            })
        })
    }
}

use crate::storage::{Column, TableData};

use super::scontrol::ScontrolTable;
use super::{DataProvider, FilterArgs, ProviderContext, ProviderError, ProviderState};

/// Live job listing from `scontrol show job`.
pub struct JobsProvider {
    state: ProviderState<TableData>,
    ctx: ProviderContext,
    source: ScontrolTable,
}

impl JobsProvider {
    /// `columns` must start with `JobId`, `Partition` and `JobState`.
    pub fn new(ctx: ProviderContext, columns: Vec<Column>) -> Self {
        Self {
            state: ProviderState::new("jobs"),
            ctx,
            source: ScontrolTable::new("job", "JobId=", columns),
        }
    }
}

impl DataProvider for JobsProvider {
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

    /// Job states are matched exactly; partitions by substring.
    fn filtered_data(&self, filter: &FilterArgs) -> TableData {
        self.state.with_data(|data| {
            let partition = data.column_index("Partition");
            let state = data.column_index("JobState");
            data.filtered(|row| {
                partition.is_none_or(|i| filter.partition_matches(&row[i]))
                    && state.is_none_or(|i| filter.state_equals(&row[i]))
            })
        })
    }
}

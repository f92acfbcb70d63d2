use crate::storage::{Column, TableData};

use super::scontrol::ScontrolTable;
use super::{DataProvider, FilterArgs, ProviderContext, ProviderError, ProviderState};

/// Partition names from `scontrol show partitions`, used to offer
/// partition filter choices.
pub struct PartitionsProvider {
    state: ProviderState<TableData>,
    ctx: ProviderContext,
    source: ScontrolTable,
}

impl PartitionsProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self {
            state: ProviderState::new("partitions"),
            ctx,
            source: ScontrolTable::new(
                "partitions",
                "PartitionName=",
                vec![Column::new("PartitionName")],
            ),
        }
    }

    /// Partition names of the live snapshot, in listing order.
    pub fn names(&self) -> Vec<String> {
        self.state
            .with_data(|data| data.rows.iter().map(|r| r[0].clone()).collect())
    }
}

impl DataProvider for PartitionsProvider {
    type Data = TableData;

    fn state(&self) -> &ProviderState<TableData> {
        &self.state
    }

    fn fetch(&self) -> Result<(), ProviderError> {
        self.state.run_fetch(|| {
            let previous = self.state.data();
            self.source.fetch(&self.ctx, &previous, 1)
        })
    }

    /// Partitions have no categorical filter.
    fn filtered_data(&self, _filter: &FilterArgs) -> TableData {
        self.state.data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockRunner, PARTITIONS_ONELINER};
    use crate::collector::slurm::SCONTROL;
    use crate::provider::test_support::context;

    #[test]
    fn test_partition_names() {
        let (ctx, runner) =
            context(MockRunner::new().on(SCONTROL, Ok(PARTITIONS_ONELINER.to_string())));
        let p = PartitionsProvider::new(ctx);
        p.fetch().unwrap();
        assert_eq!(p.names(), vec!["general", "chemistry", "physics", "gpu"]);
        assert_eq!(
            p.filtered_data(&FilterArgs::new("gpu", "UP")).len(),
            4,
            "filter is ignored"
        );
        assert_eq!(
            runner.calls(),
            vec!["scontrol show partitions --detail --all --oneliner".to_string()]
        );
    }
}

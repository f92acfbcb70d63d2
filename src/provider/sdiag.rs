use crate::collector::slurm::SDIAG;
use crate::storage::TextData;

use super::{DataProvider, FilterArgs, ProviderContext, ProviderError, ProviderState};

/// Scheduler diagnostics from `sdiag`, kept as text.
pub struct SdiagProvider {
    state: ProviderState<TextData>,
    ctx: ProviderContext,
}

impl SdiagProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self {
            state: ProviderState::new("sdiag"),
            ctx,
        }
    }
}

impl DataProvider for SdiagProvider {
    type Data = TextData;

    fn state(&self) -> &ProviderState<TextData> {
        &self.state
    }

    fn fetch(&self) -> Result<(), ProviderError> {
        self.state.run_fetch(|| {
            let text = self.ctx.run(SDIAG, &[], self.ctx.request_timeout)?;
            Ok(TextData { text })
        })
    }

    /// Text has nothing to filter.
    fn filtered_data(&self, _filter: &FilterArgs) -> TextData {
        self.state.data()
    }
}

//! All providers of one dashboard, built from a single configuration.

use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::scheduler::{RefreshScheduler, View};
use crate::storage::AccountingCache;

use super::{
    DataProvider, JobsProvider, NodesProvider, PartitionsProvider, ProviderContext,
    SacctMgrProvider, SacctProvider, SdiagProvider,
};

/// Providers shared by the scheduler and the consumers.
///
/// The accounting providers are absent when the accounting database is not
/// reachable.
#[derive(Clone)]
pub struct ProviderSet {
    pub nodes: Arc<NodesProvider>,
    pub jobs: Arc<JobsProvider>,
    pub partitions: Arc<PartitionsProvider>,
    pub sacct: Option<Arc<SacctProvider>>,
    pub sacctmgr: Option<Arc<SacctMgrProvider>>,
    pub sdiag: Arc<SdiagProvider>,
}

impl ProviderSet {
    /// Builds every provider. `cache` enables the accounting views.
    pub fn build(
        config: &Config,
        ctx: ProviderContext,
        cache: Option<AccountingCache>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let sacct = match cache {
            Some(cache) => Some(Arc::new(SacctProvider::new(
                ctx.clone(),
                config.sacct_column_specs()?,
                cache,
                config.accounting_timeout(),
                config.load_sacct_data_from,
                config.refresh_interval,
            ))),
            None => None,
        };
        let entity = config.initial_entity()?;
        let sacctmgr = sacct
            .is_some()
            .then(|| Arc::new(SacctMgrProvider::new(ctx.clone(), entity)));

        Ok(Self {
            nodes: Arc::new(NodesProvider::new(ctx.clone(), config.node_column_specs()?)),
            jobs: Arc::new(JobsProvider::new(ctx.clone(), config.job_column_specs()?)),
            partitions: Arc::new(PartitionsProvider::new(ctx.clone())),
            sacct,
            sacctmgr,
            sdiag: Arc::new(SdiagProvider::new(ctx)),
        })
    }

    /// Views with a provider, in key order.
    pub fn views(&self) -> Vec<View> {
        View::ALL
            .into_iter()
            .filter(|v| match v {
                View::Accounting => self.sacct.is_some(),
                View::AccountingManager => self.sacctmgr.is_some(),
                _ => true,
            })
            .collect()
    }

    /// Scheduler with every view bound and partitions as a background target.
    pub fn scheduler(
        &self,
        config: &Config,
        active: View,
    ) -> Result<RefreshScheduler, ConfigError> {
        let mut scheduler = RefreshScheduler::new(config, active)?;
        scheduler.bind(View::Nodes, self.nodes.clone());
        scheduler.bind(View::Jobs, self.jobs.clone());
        scheduler.bind(View::Diagnostics, self.sdiag.clone());
        if let Some(sacct) = &self.sacct {
            scheduler.bind(View::Accounting, sacct.clone());
        }
        if let Some(sacctmgr) = &self.sacctmgr {
            scheduler.bind(View::AccountingManager, sacctmgr.clone());
        }
        scheduler.add_background(self.partitions.clone());
        Ok(scheduler)
    }

    /// Releases every subscriber queue.
    pub fn close(&self) {
        self.nodes.close();
        self.jobs.close();
        self.partitions.close();
        self.sdiag.close();
        if let Some(sacct) = &self.sacct {
            sacct.close();
        }
        if let Some(sacctmgr) = &self.sacctmgr {
            sacctmgr.close();
        }
    }
}

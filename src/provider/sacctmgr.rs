//! Accounting manager listings (`sacctmgr show <entity>`).
//!
//! The selected entity determines the column schema, so every snapshot carries
//! the entity it was fetched for. Consumers ask for [`SacctMgrProvider::data_for`]
//! the entity they are about to render and get nothing until a fetch for that
//! entity has completed.
//!
//! The selection lives on the provider, so scheduled fetches and fetches on a
//! view switch list the entity the operator picked last.

use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use crate::collector::slurm::SACCTMGR;
use crate::collector::{PARSABLE_DELIMITER, parse_delimited_output};
use crate::config::ConfigError;
use crate::storage::{TableData, parse_column_config};

use super::{DataProvider, FilterArgs, ProviderContext, ProviderError, ProviderState};

/// Entities listed by `sacctmgr show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SacctMgrEntity {
    #[default]
    Account,
    Association,
    Cluster,
    Event,
    Federation,
    Qos,
    Resource,
    Reservation,
    Transaction,
    Tres,
    User,
}

impl SacctMgrEntity {
    pub const ALL: [SacctMgrEntity; 11] = [
        SacctMgrEntity::Account,
        SacctMgrEntity::Association,
        SacctMgrEntity::Cluster,
        SacctMgrEntity::Event,
        SacctMgrEntity::Federation,
        SacctMgrEntity::Qos,
        SacctMgrEntity::Resource,
        SacctMgrEntity::Reservation,
        SacctMgrEntity::Transaction,
        SacctMgrEntity::Tres,
        SacctMgrEntity::User,
    ];

    /// Name as passed to `sacctmgr show`.
    pub fn as_str(self) -> &'static str {
        match self {
            SacctMgrEntity::Account => "Account",
            SacctMgrEntity::Association => "Association",
            SacctMgrEntity::Cluster => "Cluster",
            SacctMgrEntity::Event => "Event",
            SacctMgrEntity::Federation => "Federation",
            SacctMgrEntity::Qos => "QOS",
            SacctMgrEntity::Resource => "Resource",
            SacctMgrEntity::Reservation => "Reservation",
            SacctMgrEntity::Transaction => "Transaction",
            SacctMgrEntity::Tres => "TRES",
            SacctMgrEntity::User => "User",
        }
    }

    /// Column config of the entity's listing.
    pub fn columns(self) -> &'static str {
        match self {
            SacctMgrEntity::Account => "Account,Org,Descr",
            SacctMgrEntity::Association => {
                "Cluster,Account,User,Partition,Share,QOS,Def QOS,Priority,GrpJobs,GrpTRES,GrpSubmit,GrpWall,GrpTRESMins,MaxJobs,MaxTRES,MaxTRESPerNode,MaxSubmit,MaxWall,MaxTRESMins,GrpTRESRunMins"
            }
            SacctMgrEntity::Cluster => {
                "Cluster,ControlHost,ControlPort,RPC,Share,QOS,Def QOS,GrpJobs,GrpTRES,GrpSubmit,MaxJobs,MaxTRES,MaxSubmit,MaxWall"
            }
            SacctMgrEntity::Event => "Cluster,NodeName,TimeStart,TimeEnd,State,Reason,User",
            SacctMgrEntity::Federation => "ID,Federation,Cluster,Features,FedState",
            SacctMgrEntity::Qos => {
                "Name,Priority,GraceTime,Preempt,PreemptExemptTime,PreemptMode,Flags,UsageThres,UsageFactor,GrpTRES,GrpTRESMins,GrpTRESRunMins,GrpJobs,GrpSubmit,GrpWall,MaxTRES,MaxTRESPerNode,MaxTRESMins,MaxWall,MaxTRESPU,MaxJobsPU,MaxSubmitPU,MaxTRESPA,MaxTRESRunMinsPA,MaxTRESRunMinsPU,MaxJobsPA,MaxSubmitPA,MinTRES"
            }
            SacctMgrEntity::Resource => {
                "Name,Server,Type,Count,LastConsumed,Allocated,ServerType,Flags"
            }
            SacctMgrEntity::Reservation => "Name,Cluster,TRES,TimeStart,TimeEnd,UnusedWall",
            SacctMgrEntity::Transaction => "Time,Action,Actor,Where,Info",
            SacctMgrEntity::Tres => "ID,Type,Name",
            SacctMgrEntity::User => "User,Def Acct,Def WCKey,Admin",
        }
    }
}

impl fmt::Display for SacctMgrEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SacctMgrEntity {
    type Err = ConfigError;

    /// Case-insensitive, e.g. `qos` or `QOS`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::InvalidSelection {
                kind: "sacctmgr entity",
                value: s.to_string(),
            })
    }
}

/// Listing of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SacctMgrSnapshot {
    /// `None` until the first successful fetch.
    pub entity: Option<SacctMgrEntity>,
    pub table: TableData,
}

/// Accounting manager view over a selectable entity.
pub struct SacctMgrProvider {
    state: ProviderState<SacctMgrSnapshot>,
    ctx: ProviderContext,
    selected: RwLock<SacctMgrEntity>,
}

impl SacctMgrProvider {
    /// `initial` is the selection until [`select`](Self::select) changes it.
    pub fn new(ctx: ProviderContext, initial: SacctMgrEntity) -> Self {
        Self {
            state: ProviderState::new("sacctmgr"),
            ctx,
            selected: RwLock::new(initial),
        }
    }

    /// Entity listed by the next `fetch()`.
    pub fn selected(&self) -> SacctMgrEntity {
        *self.selected.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Changes the entity listed by `fetch()`. The live snapshot stays until
    /// a fetch of the new entity completes.
    pub fn select(&self, entity: SacctMgrEntity) {
        *self.selected.write().unwrap_or_else(PoisonError::into_inner) = entity;
    }

    /// Entity of the live snapshot, or the selected one before any fetch.
    pub fn current_entity(&self) -> SacctMgrEntity {
        self.state
            .with_data(|snapshot| snapshot.entity)
            .unwrap_or_else(|| self.selected())
    }

    /// Fetches `entity` and makes it the live snapshot. The selection is
    /// left alone.
    pub fn fetch_entity(&self, entity: SacctMgrEntity) -> Result<(), ProviderError> {
        self.state.run_fetch(|| {
            let columns = parse_column_config(entity.columns())?;
            let args = vec![
                "show".to_string(),
                entity.as_str().to_string(),
                "--parsable2".to_string(),
            ];
            let out = self.ctx.run(SACCTMGR, &args, self.ctx.request_timeout)?;
            let records = parse_delimited_output(&out, PARSABLE_DELIMITER);

            let previous = self.state.data();
            let table = self.ctx.build_table(&records, &columns, &previous.table, 1);
            Ok(SacctMgrSnapshot {
                entity: Some(entity),
                table,
            })
        })
    }

    /// Table of `entity`, or `None` while the live snapshot belongs to
    /// another entity.
    pub fn data_for(&self, entity: SacctMgrEntity) -> Option<TableData> {
        self.state.with_data(|snapshot| {
            (snapshot.entity == Some(entity)).then(|| snapshot.table.clone())
        })
    }
}

impl DataProvider for SacctMgrProvider {
    type Data = SacctMgrSnapshot;

    fn state(&self) -> &ProviderState<SacctMgrSnapshot> {
        &self.state
    }

    /// Fetches the selected entity.
    fn fetch(&self) -> Result<(), ProviderError> {
        self.fetch_entity(self.selected())
    }

    /// Entity listings have no categorical filter.
    fn filtered_data(&self, _filter: &FilterArgs) -> SacctMgrSnapshot {
        self.state.data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockRunner, SACCTMGR_ACCOUNTS, SACCTMGR_USERS};
    use crate::provider::test_support::{context, failed};

    #[test]
    fn test_entity_parsing() {
        assert_eq!("qos".parse::<SacctMgrEntity>().unwrap(), SacctMgrEntity::Qos);
        assert_eq!("TRES".parse::<SacctMgrEntity>().unwrap(), SacctMgrEntity::Tres);
        assert!(matches!(
            "Problem".parse::<SacctMgrEntity>(),
            Err(ConfigError::InvalidSelection { .. })
        ));
        for entity in SacctMgrEntity::ALL {
            assert_eq!(entity.to_string().parse::<SacctMgrEntity>().unwrap(), entity);
            assert!(parse_column_config(entity.columns()).is_ok());
        }
    }

    #[test]
    fn test_fetch_orders_columns_by_schema() {
        let (ctx, runner) =
            context(MockRunner::new().on(SACCTMGR, Ok(SACCTMGR_ACCOUNTS.to_string())));
        let p = SacctMgrProvider::new(ctx, SacctMgrEntity::Account);
        p.fetch().unwrap();

        let table = p.data_for(SacctMgrEntity::Account).unwrap();
        assert_eq!(table.header_names(), vec!["Account", "Org", "Descr"]);
        assert_eq!(table.rows[0], vec!["chem", "science", "chemistry group"]);
        assert_eq!(runner.calls(), vec!["sacctmgr show Account --parsable2".to_string()]);
    }

    #[test]
    fn test_entity_switch_guards_schema() {
        let (ctx, runner) =
            context(MockRunner::new().on(SACCTMGR, Ok(SACCTMGR_ACCOUNTS.to_string())));
        let p = SacctMgrProvider::new(ctx, SacctMgrEntity::Account);
        p.fetch().unwrap();
        assert!(p.data_for(SacctMgrEntity::User).is_none());

        runner.replace(SACCTMGR, failed(SACCTMGR));
        assert!(p.fetch_entity(SacctMgrEntity::User).is_err());
        assert!(p.data_for(SacctMgrEntity::User).is_none());
        assert_eq!(p.current_entity(), SacctMgrEntity::Account);

        runner.replace(SACCTMGR, Ok(SACCTMGR_USERS.to_string()));
        p.fetch_entity(SacctMgrEntity::User).unwrap();
        let users = p.data_for(SacctMgrEntity::User).unwrap();
        assert_eq!(users.headers.len(), 4);
        assert_eq!(users.rows[2], vec!["root", "root", "", "Administrator"]);
        assert!(p.data_for(SacctMgrEntity::Account).is_none());
        assert_eq!(p.selected(), SacctMgrEntity::Account);
    }

    #[test]
    fn test_fetch_lists_selected_entity() {
        let (ctx, runner) =
            context(MockRunner::new().on(SACCTMGR, Ok(SACCTMGR_ACCOUNTS.to_string())));
        let p = SacctMgrProvider::new(ctx, SacctMgrEntity::Account);
        p.fetch().unwrap();

        p.select(SacctMgrEntity::User);
        assert_eq!(p.current_entity(), SacctMgrEntity::Account);
        runner.replace(SACCTMGR, Ok(SACCTMGR_USERS.to_string()));
        p.fetch().unwrap();

        assert_eq!(runner.calls().last().unwrap(), "sacctmgr show User --parsable2");
        assert_eq!(p.current_entity(), SacctMgrEntity::User);
        assert!(p.data_for(SacctMgrEntity::User).is_some());
    }
}

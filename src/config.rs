//! Runtime configuration and validation.
//!
//! `Config` holds everything the providers and the scheduler need. The binary
//! fills it from command-line flags and calls [`Config::validate`] once before
//! any provider is built.

use std::path::PathBuf;
use std::time::Duration;

use crate::provider::{FilterArgs, SacctMgrEntity};
use crate::storage::{Column, parse_column_config, with_required_columns};
use crate::util::format_duration;

/// Filter choice matching every value.
pub const ALL_CATEGORIES: &str = "(all)";

/// Node states offered as filter choices.
pub const NODE_STATES: &[&str] = &[
    ALL_CATEGORIES,
    "ALLOC",
    "ALLOCATED",
    "BLOCKED",
    "CLOUD",
    "COMP",
    "COMPLETING",
    "DOWN",
    "DRAIN",
    "DRAINED",
    "DRAINING",
    "FAIL",
    "FUTURE",
    "FUTR",
    "IDLE",
    "MAINT",
    "MIX",
    "MIXED",
    "NO_RESPOND",
    "NPC",
    "PERFCTRS",
    "PLANNED",
    "POWER_DOWN",
    "POWERING_DOWN",
    "POWERED_DOWN",
    "POWERING_UP",
    "REBOOT_ISSUED",
    "REBOOT_REQUESTED",
    "RESV",
    "RESERVED",
    "UNK",
    "UNKNOWN",
];

/// Job states offered as filter choices.
pub const JOB_STATES: &[&str] = &[
    ALL_CATEGORIES,
    "BOOT_FAIL",
    "CANCELLED",
    "COMPLETED",
    "DEADLINE",
    "FAILED",
    "NODE_FAIL",
    "OUT_OF_MEMORY",
    "PENDING",
    "PREEMPTED",
    "RUNNING",
    "SUSPENDED",
    "TIMEOUT",
];

pub const DEFAULT_NODE_COLUMNS: &str = "CPULoad//CPUAlloc//CPUTot,AllocMem//RealMemory,CfgTRES++,Reason";
pub const DEFAULT_JOB_COLUMNS: &str = "UserId,JobName++,RunTime,NodeList,QOS,NumCPUs,Mem";
pub const DEFAULT_SACCT_COLUMNS: &str = "QOS,Account,User,JobName++,NodeList,ReqCPUS//AllocCPUS,ReqMem,Elapsed,ExitCode,ReqTRES,AllocTRES++,Comment++,SubmitLine++";

/// Leading node columns; the first identifies rows, the others feed filters.
pub const REQUIRED_NODE_COLUMNS: [&str; 3] = ["NodeName", "Partitions", "State"];
pub const REQUIRED_JOB_COLUMNS: [&str; 3] = ["JobId", "Partition", "JobState"];
pub const REQUIRED_SACCT_COLUMNS: [&str; 3] = ["JobIDRaw", "Partition", "State"];

/// Every other `scontrol show node` field, for `--show-all-columns`.
pub const ALL_OTHER_NODE_COLUMNS: &str = "CoresPerSocket,CPUAlloc,CPUEfctv,CPUTot,CPULoad,AvailableFeatures,ActiveFeatures,Gres,GresDrain,NodeAddr,NodeHostName,Port,RealMemory,AllocMem,FreeMem,Sockets,Boards,ThreadsPerCore,TmpDisk,Weight,Owner,MCS_label,BootTime,SlurmdStartTime,LastBusyTime,ResumeAfterTime,CfgTRES,AllocTRES,CurrentWatts,AveWatts";

/// Every other `scontrol show job` field, for `--show-all-columns`.
pub const ALL_OTHER_JOB_COLUMNS: &str = "JobName,UserId,GroupId,MCS_label,Priority,Nice,Account,QOS,WCKey,Reason,Dependency,Requeue,Restarts,BatchFlag,Reboot,ExitCode,DerivedExitCode,RunTime,TimeLimit,TimeMin,SubmitTime,EligibleTime,AccrueTime,StartTime,EndTime,Deadline,SuspendTime,SecsPreSuspend,LastSchedEval,Scheduler,AllocNode:Sid,ReqNodeList,ExcNodeList,NodeList,NumNodes,NumCPUs,NumTasks,CPUs/Task,ReqB:S:C:T,ReqTRES,AllocTRES,Socks/Node,NtasksPerN:B:S:C,CoreSpec,MinCPUsNode,MinMemoryNode,MinTmpDiskNode,Features,DelayBoot,OverSubscribe,Contiguous,Licenses,Network,Command,WorkDir,StdErr,StdIn,StdOut,TresPerTask";

/// Extra `sacct --format` fields appended for `--show-all-columns`.
pub const ALL_OTHER_SACCT_COLUMNS: &str = "AdminComment,AllocNodes,AssocID,AveCPU,AveCPUFreq,AveDiskRead,AveDiskWrite,AvePages,AveRSS,AveVMSize,CPUTime,CPUTimeRAW,Cluster,Constraints,ConsumedEnergy,DerivedExitCode,ElapsedRaw,Eligible,End,FailedNode,Flags,GID,Group,JobID,Licenses,MaxDiskRead,MaxRSS,MaxVMSize,NCPUS,NNodes,NTasks,Priority,Reason,ReqNodes,Reservation,Start,Submit,Suspended,SystemCPU,Timelimit,TotalCPU,UID,UserCPU,WCKey,WorkDir";

/// Configuration failure surfaced once to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Request timeout is not strictly shorter than the refresh interval.
    InvalidTimeout {
        request_timeout: Duration,
        refresh_interval: Duration,
    },
    /// `sacct` may run as long as or longer than the refresh interval.
    InvalidAccountingTimeout {
        accounting_timeout: Duration,
        refresh_interval: Duration,
    },
    /// A filter or entity choice outside the known set.
    InvalidSelection { kind: &'static str, value: String },
    /// A column config line that cannot be used.
    InvalidColumns { config: String, reason: String },
    /// A numeric setting outside its allowed range.
    InvalidValue { name: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidTimeout {
                request_timeout,
                refresh_interval,
            } => write!(
                f,
                "request timeout of {} must be shorter than refresh interval of {}",
                format_duration(*request_timeout),
                format_duration(*refresh_interval)
            ),
            ConfigError::InvalidAccountingTimeout {
                accounting_timeout,
                refresh_interval,
            } => write!(
                f,
                "accounting timeout of {} (request timeout times multiplier) must be shorter than refresh interval of {}",
                format_duration(*accounting_timeout),
                format_duration(*refresh_interval)
            ),
            ConfigError::InvalidSelection { kind, value } => {
                write!(f, "unknown {} '{}'", kind, value)
            }
            ConfigError::InvalidColumns { config, reason } => {
                write!(f, "invalid column config '{}': {}", config, reason)
            }
            ConfigError::InvalidValue { name, reason } => write!(f, "invalid {}: {}", name, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Settings shared by every provider and the scheduler.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fetch tick of the active view.
    pub refresh_interval: Duration,
    /// Redraw tick; never triggers external calls.
    pub render_interval: Duration,
    /// Deadline of one external command.
    pub request_timeout: Duration,
    /// `sacct` gets `request_timeout` times this.
    pub accounting_timeout_multiplier: u32,
    /// Directory of the Slurm binaries, `$PATH` when unset.
    pub slurm_binaries_path: Option<PathBuf>,
    /// Initial partition filter, empty for all.
    pub partition: String,
    /// Initial node state filter, empty for all.
    pub node_state: String,
    /// Initial job state filter of the jobs and accounting views.
    pub job_state: String,
    /// Entity the accounting manager view lists first.
    pub sacctmgr_entity: String,
    pub node_columns: String,
    pub job_columns: String,
    pub sacct_columns: String,
    /// Replace the configured columns with every known field.
    pub show_all_columns: bool,
    /// Accounting history to load on start; zero disables accounting fetches.
    pub load_sacct_data_from: Duration,
    /// Cache namespace; queried from the controller when unset.
    pub cluster_name: Option<String>,
    /// Overrides the user cache directory.
    pub cache_dir: Option<PathBuf>,
    pub max_column_width: usize,
    /// Each row is repeated this many times (synthetic load).
    pub duplicate_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            render_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
            accounting_timeout_multiplier: 5,
            slurm_binaries_path: None,
            partition: String::new(),
            node_state: String::new(),
            job_state: String::new(),
            sacctmgr_entity: SacctMgrEntity::default().to_string(),
            node_columns: DEFAULT_NODE_COLUMNS.to_string(),
            job_columns: DEFAULT_JOB_COLUMNS.to_string(),
            sacct_columns: DEFAULT_SACCT_COLUMNS.to_string(),
            show_all_columns: false,
            load_sacct_data_from: Duration::from_secs(30 * 60),
            cluster_name: None,
            cache_dir: None,
            max_column_width: 30,
            duplicate_rows: 1,
        }
    }
}

impl Config {
    /// Checks every setting and the column configs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout >= self.refresh_interval {
            return Err(ConfigError::InvalidTimeout {
                request_timeout: self.request_timeout,
                refresh_interval: self.refresh_interval,
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "request timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.render_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "render interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.accounting_timeout_multiplier == 0 {
            return Err(ConfigError::InvalidValue {
                name: "accounting timeout multiplier",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.load_sacct_data_from.is_zero()
            && self.accounting_timeout() >= self.refresh_interval
        {
            return Err(ConfigError::InvalidAccountingTimeout {
                accounting_timeout: self.accounting_timeout(),
                refresh_interval: self.refresh_interval,
            });
        }
        if self.max_column_width == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max column width",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.duplicate_rows == 0 {
            return Err(ConfigError::InvalidValue {
                name: "duplicate rows",
                reason: "must be at least 1".to_string(),
            });
        }

        self.node_filter()?;
        self.job_filter()?;
        self.initial_entity()?;

        self.node_column_specs()?;
        self.job_column_specs()?;
        self.sacct_column_specs()?;
        Ok(())
    }

    /// Deadline of one `sacct` call.
    pub fn accounting_timeout(&self) -> Duration {
        self.request_timeout
            .checked_mul(self.accounting_timeout_multiplier)
            .unwrap_or(Duration::MAX)
    }

    /// Initial filter of the nodes view.
    pub fn node_filter(&self) -> Result<FilterArgs, ConfigError> {
        FilterArgs::new(&self.partition, &self.node_state).validated_for_nodes()
    }

    /// Initial filter of the jobs and accounting views.
    pub fn job_filter(&self) -> Result<FilterArgs, ConfigError> {
        FilterArgs::new(&self.partition, &self.job_state).validated_for_jobs()
    }

    pub fn initial_entity(&self) -> Result<SacctMgrEntity, ConfigError> {
        self.sacctmgr_entity.parse()
    }

    pub fn node_column_specs(&self) -> Result<Vec<Column>, ConfigError> {
        let raw = self.pick(&self.node_columns, ALL_OTHER_NODE_COLUMNS);
        with_required_columns(&REQUIRED_NODE_COLUMNS, parse_column_config(raw)?)
    }

    pub fn job_column_specs(&self) -> Result<Vec<Column>, ConfigError> {
        let raw = self.pick(&self.job_columns, ALL_OTHER_JOB_COLUMNS);
        with_required_columns(&REQUIRED_JOB_COLUMNS, parse_column_config(raw)?)
    }

    /// Accounting columns; with `show_all_columns` the configured ones stay
    /// first and every other field follows.
    pub fn sacct_column_specs(&self) -> Result<Vec<Column>, ConfigError> {
        let columns = if self.show_all_columns {
            let mut columns = parse_column_config(&self.sacct_columns)?;
            columns.extend(parse_column_config(ALL_OTHER_SACCT_COLUMNS)?);
            columns
        } else {
            parse_column_config(&self.sacct_columns)?
        };
        with_required_columns(&REQUIRED_SACCT_COLUMNS, columns)
    }

    fn pick<'a>(&'a self, configured: &'a str, all: &'a str) -> &'a str {
        if self.show_all_columns { all } else { configured }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_timeout_must_be_shorter_than_refresh() {
        let config = Config {
            request_timeout: Duration::from_secs(60),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));
        assert!(err.to_string().contains("1m"));
    }

    #[test]
    fn test_accounting_timeout_multiplies() {
        let config = Config::default();
        assert_eq!(config.accounting_timeout(), Duration::from_secs(25));
    }

    #[test]
    fn test_accounting_timeout_must_be_shorter_than_refresh() {
        let config = Config {
            refresh_interval: Duration::from_secs(20),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAccountingTimeout { .. }));
        assert!(err.to_string().contains("25s"));

        let disabled = Config {
            load_sacct_data_from: Duration::ZERO,
            ..config
        };
        disabled.validate().unwrap();
    }

    #[test]
    fn test_initial_selections_validated() {
        let config = Config {
            partition: "gpu".to_string(),
            node_state: "DRAIN".to_string(),
            job_state: "RUNNING".to_string(),
            sacctmgr_entity: "qos".to_string(),
            ..Config::default()
        };
        config.validate().unwrap();
        assert_eq!(config.node_filter().unwrap(), FilterArgs::new("gpu", "DRAIN"));
        assert_eq!(config.initial_entity().unwrap(), SacctMgrEntity::Qos);

        let node_state_as_job = Config {
            job_state: "DRAIN".to_string(),
            ..config.clone()
        };
        assert_eq!(
            node_state_as_job.validate(),
            Err(ConfigError::InvalidSelection {
                kind: "job state",
                value: "DRAIN".to_string(),
            })
        );

        let entity = Config {
            sacctmgr_entity: "Problem".to_string(),
            ..config
        };
        let err = entity.validate().unwrap_err();
        assert_eq!(err.to_string(), "unknown sacctmgr entity 'Problem'");
    }

    #[test]
    fn test_required_columns_lead() {
        let config = Config::default();
        let names: Vec<String> = config
            .node_column_specs()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(&names[..3], &["NodeName", "Partitions", "State"]);
        assert_eq!(names[3], "CPULoad//CPUAlloc//CPUTot");
    }

    #[test]
    fn test_show_all_columns_overrides() {
        let config = Config {
            show_all_columns: true,
            ..Config::default()
        };
        let jobs = config.job_column_specs().unwrap();
        assert!(jobs.iter().any(|c| c.name == "WorkDir"));
        assert!(!jobs.iter().any(|c| c.name == "JobName++"));

        let sacct = config.sacct_column_specs().unwrap();
        assert_eq!(sacct[0].name, "JobIDRaw");
        assert!(sacct.iter().any(|c| c.name == "SubmitLine"));
        assert!(sacct.iter().any(|c| c.name == "TotalCPU"));
    }

    #[test]
    fn test_empty_columns_rejected() {
        let config = Config {
            job_columns: "  ".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidColumns { .. })
        ));
    }

    #[test]
    fn test_zero_duplicate_rows_rejected() {
        let config = Config {
            duplicate_rows: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}

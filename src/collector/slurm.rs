//! Slurm tool names and one-off queries.

use std::time::Duration;

use super::exec::ExecError;
use super::traits::CommandRunner;

pub const SCONTROL: &str = "scontrol";
pub const SACCT: &str = "sacct";
pub const SACCTMGR: &str = "sacctmgr";
pub const SDIAG: &str = "sdiag";

/// Splits a fixed argument line into owned arguments.
pub fn args(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Cluster identity as reported by `scontrol show config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub cluster_name: String,
    pub controller_host: String,
    pub slurm_version: String,
}

impl Default for ClusterInfo {
    fn default() -> Self {
        Self {
            cluster_name: "unknown".to_string(),
            controller_host: "unknown".to_string(),
            slurm_version: "unknown".to_string(),
        }
    }
}

/// Extracts cluster name, controller host and version from `show config` output.
///
/// Lines look like `ClusterName = hpc` and `SlurmctldHost[0] = head01(10.0.0.1)`.
/// Missing entries keep their `unknown` default.
pub fn parse_show_config(output: &str) -> ClusterInfo {
    let mut info = ClusterInfo::default();

    for line in output.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        if key == "ClusterName" {
            info.cluster_name = value.to_string();
        } else if key.starts_with("SlurmctldHost") && info.controller_host == "unknown" {
            let host = value.split('(').next().unwrap_or(value);
            info.controller_host = host.trim().to_string();
        } else if key == "SLURM_VERSION" {
            info.slurm_version = value.to_string();
        }
    }

    info
}

/// Queries the controller configuration for cluster identity.
pub fn cluster_info(
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> Result<ClusterInfo, ExecError> {
    let out = runner.run(SCONTROL, &args("show config"), timeout)?;
    Ok(parse_show_config(&out))
}

/// Checks that the controller answers `scontrol ping` within `timeout`.
pub fn ping(runner: &dyn CommandRunner, timeout: Duration) -> Result<(), ExecError> {
    runner.run(SCONTROL, &args("ping"), timeout).map(|_| ())
}

/// Checks whether the accounting database answers, which the accounting
/// views depend on.
pub fn sacctmgr_available(runner: &dyn CommandRunner, timeout: Duration) -> bool {
    runner.run(SACCTMGR, &args("show cluster"), timeout).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockRunner, SHOW_CONFIG};

    #[test]
    fn test_parse_show_config() {
        let info = parse_show_config(SHOW_CONFIG);
        assert_eq!(info.cluster_name, "hpc-east");
        assert_eq!(info.controller_host, "head01");
        assert_eq!(info.slurm_version, "24.11.3");
    }

    #[test]
    fn test_parse_show_config_missing_fields() {
        let info = parse_show_config("Configuration data as of 2025-03-01T10:00:00\n");
        assert_eq!(info, ClusterInfo::default());
    }

    #[test]
    fn test_cluster_info_via_runner() {
        let runner = MockRunner::new().on(SCONTROL, Ok(SHOW_CONFIG.to_string()));
        let info = cluster_info(&runner, Duration::from_secs(1)).unwrap();
        assert_eq!(info.cluster_name, "hpc-east");
        assert_eq!(runner.calls(), vec!["scontrol show config".to_string()]);
    }

    #[test]
    fn test_sacctmgr_availability() {
        let runner = MockRunner::new().on(SACCTMGR, Ok("Cluster|ControlHost\n".to_string()));
        assert!(sacctmgr_available(&runner, Duration::from_secs(1)));
        assert!(!sacctmgr_available(&MockRunner::new(), Duration::from_secs(1)));
    }

    #[test]
    fn test_ping_failure_propagates() {
        let runner = MockRunner::new().on(
            SCONTROL,
            Err(ExecError::Failed {
                command: "scontrol ping".to_string(),
                message: "Slurmctld(primary) at head01 is DOWN".to_string(),
            }),
        );
        assert!(ping(&runner, Duration::from_secs(1)).is_err());
    }
}

//! Categorical row filters passed explicitly into `filtered_data`.

use crate::config::{ALL_CATEGORIES, ConfigError, JOB_STATES, NODE_STATES};

/// Partition and state selection.
///
/// An empty value or `(all)` matches everything for that dimension. The
/// partition may list several alternatives separated by commas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterArgs {
    pub partition: String,
    pub state: String,
}

impl FilterArgs {
    pub fn new(partition: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            state: state.into(),
        }
    }

    /// Filter matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Rejects state choices that are not node states.
    pub fn validated_for_nodes(self) -> Result<Self, ConfigError> {
        self.validate_state("node state", NODE_STATES)
    }

    /// Rejects state choices that are not job states.
    pub fn validated_for_jobs(self) -> Result<Self, ConfigError> {
        self.validate_state("job state", JOB_STATES)
    }

    fn validate_state(self, kind: &'static str, choices: &[&str]) -> Result<Self, ConfigError> {
        if match_all(&self.state) || choices.contains(&self.state.trim()) {
            Ok(self)
        } else {
            Err(ConfigError::InvalidSelection {
                kind,
                value: self.state,
            })
        }
    }

    /// Rejects partition alternatives missing from `known`.
    ///
    /// Partitions are only known after the first listing, so an empty `known`
    /// accepts everything.
    pub fn validated_partition(self, known: &[String]) -> Result<Self, ConfigError> {
        if match_all(&self.partition) || known.is_empty() {
            return Ok(self);
        }
        let unknown = self
            .partition
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .find(|p| !known.iter().any(|k| k == p));
        match unknown {
            Some(p) => Err(ConfigError::InvalidSelection {
                kind: "partition",
                value: p.to_string(),
            }),
            None => Ok(self),
        }
    }

    /// True when any partition alternative is a substring of `value`.
    pub fn partition_matches(&self, value: &str) -> bool {
        if match_all(&self.partition) {
            return true;
        }
        self.partition
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .any(|p| value.contains(p))
    }

    /// Substring state match, e.g. `DRAIN` matches `IDLE+DRAIN`.
    pub fn state_contains(&self, value: &str) -> bool {
        match_all(&self.state) || value.contains(self.state.trim())
    }

    /// Exact state match.
    pub fn state_equals(&self, value: &str) -> bool {
        match_all(&self.state) || value == self.state.trim()
    }
}

fn match_all(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == ALL_CATEGORIES
}

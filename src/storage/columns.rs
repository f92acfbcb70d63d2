//! Column config lines such as `CPULoad//CPUAlloc//CPUTot,CfgTRES++,Reason`.

use std::collections::HashSet;

use super::model::{COMPOSITE_MARKER, Column};
use crate::config::ConfigError;

/// Parses a comma-separated column config into descriptors.
pub fn parse_column_config(line: &str) -> Result<Vec<Column>, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidColumns {
        config: line.to_string(),
        reason: reason.to_string(),
    };

    if line.trim().is_empty() {
        return Err(invalid("empty column config"));
    }

    line.split(',')
        .map(|part| {
            let column = Column::new(part);
            let empty_part = column.fields().iter().any(|f| f.trim().is_empty());
            if column.name.is_empty() || empty_part {
                Err(invalid("empty column name"))
            } else {
                Ok(column)
            }
        })
        .collect()
}

/// Puts `required` first and drops later repeats of any column.
///
/// The first required column identifies rows, so it must lead.
pub fn with_required_columns(
    required: &[&str],
    configured: Vec<Column>,
) -> Result<Vec<Column>, ConfigError> {
    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(required.len() + configured.len());

    for column in required.iter().map(|name| Column::new(name)).chain(configured) {
        if seen.insert(column.name.clone()) {
            columns.push(column);
        }
    }

    if columns.is_empty() {
        return Err(ConfigError::InvalidColumns {
            config: String::new(),
            reason: "no columns".to_string(),
        });
    }
    Ok(columns)
}

/// Source field names with composites expanded, e.g. for `sacct --format`.
pub fn expanded_fields(columns: &[Column]) -> Vec<String> {
    let mut fields = Vec::new();
    for column in columns {
        if column.composite {
            fields.extend(column.name.split(COMPOSITE_MARKER).map(str::to_string));
        } else {
            fields.push(column.name.clone());
        }
    }
    fields
}

//! Tabular snapshot produced by one successful fetch.
//!
//! A `TableData` is never patched in place: each fetch builds a new one and the
//! provider swaps it in. `Clone` is a full deep copy, which is what consumers
//! receive.

use serde::{Deserialize, Serialize};

use crate::collector::{Record, field};

/// Marker joining source fields of a composite column in a column config.
pub const COMPOSITE_MARKER: &str = "//";

/// Suffix marking a column whose width is not capped.
pub const FULL_WIDTH_MARKER: &str = "++";

/// Separator between joined values of a composite column.
pub const COMPOSITE_SEPARATOR: &str = "/";

/// Column descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Source field name, or `a//b` for composite columns.
    pub name: String,
    /// Header text shown to the operator.
    pub display_name: String,
    /// Widest cell seen so far, capped unless `full_width`.
    pub width: usize,
    /// Cell is derived by joining several source fields.
    pub composite: bool,
    /// Width may grow beyond the configured maximum.
    pub full_width: bool,
}

impl Column {
    /// Builds a descriptor from a column config entry such as `CPUAlloc//CPUTot`
    /// or `Reason++`.
    pub fn new(spec: &str) -> Self {
        let spec = spec.trim();
        let (name, full_width) = match spec.strip_suffix(FULL_WIDTH_MARKER) {
            Some(stripped) => (stripped.trim(), true),
            None => (spec, false),
        };
        let composite = name.contains(COMPOSITE_MARKER);
        let display_name = if composite {
            name.replace(COMPOSITE_MARKER, COMPOSITE_SEPARATOR)
        } else {
            name.to_string()
        };

        Self {
            name: name.to_string(),
            display_name,
            width: 0,
            composite,
            full_width,
        }
    }

    /// Source fields this column reads.
    pub fn fields(&self) -> Vec<&str> {
        if self.composite {
            self.name.split(COMPOSITE_MARKER).collect()
        } else {
            vec![self.name.as_str()]
        }
    }

    /// Computes this column's cell for one parsed record.
    pub fn cell(&self, record: &Record) -> String {
        if self.composite {
            self.fields()
                .into_iter()
                .map(|f| field(record, f))
                .collect::<Vec<_>>()
                .join(COMPOSITE_SEPARATOR)
        } else {
            field(record, &self.name).to_string()
        }
    }

    /// Grows the width to fit `value`, never shrinking and never passing
    /// `max_width` unless the column is full width.
    pub fn fit(&mut self, value: &str, max_width: usize) {
        let len = value.chars().count();
        let grown = self.width.max(len);
        self.width = if self.full_width {
            grown
        } else {
            grown.min(max_width)
        };
    }
}

/// Headers plus rows; every row has exactly one cell per header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<Column>,
    pub rows: Vec<Vec<String>>,
}

impl TableData {
    pub fn new(headers: Vec<Column>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Builds rows from parsed records.
    ///
    /// `columns` carries the widths of the previous snapshot so they keep
    /// growing across fetches. Each row is emitted `duplicate` times.
    pub fn from_records(
        records: &[Record],
        mut columns: Vec<Column>,
        max_width: usize,
        duplicate: usize,
    ) -> Self {
        let copies = duplicate.max(1);
        let mut rows = Vec::with_capacity(records.len() * copies);

        for record in records {
            let row: Vec<String> = columns
                .iter_mut()
                .map(|col| {
                    let value = col.cell(record);
                    col.fit(&value, max_width);
                    value
                })
                .collect();
            for _ in 1..copies {
                rows.push(row.clone());
            }
            rows.push(row);
        }

        Self {
            headers: columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the column reading source field `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|c| c.name == name)
    }

    /// Checks that every row has one cell per header.
    pub fn is_consistent(&self) -> bool {
        self.rows.iter().all(|r| r.len() == self.headers.len())
    }

    /// Copy keeping only rows for which `keep` returns true, in order.
    pub fn filtered(&self, keep: impl Fn(&[String]) -> bool) -> Self {
        Self {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|r| keep(r.as_slice())).cloned().collect(),
        }
    }

    /// Header names in order, e.g. for building `--format` arguments.
    pub fn header_names(&self) -> Vec<&str> {
        self.headers.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Free-form text snapshot, e.g. scheduler diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
}

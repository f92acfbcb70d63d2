//! Data models for provider snapshots.
//!
//! - [`table`]: tabular snapshots (`TableData`, `Column`) built from parsed records
//! - `TextData`: free-form output such as scheduler diagnostics

mod table;

pub use table::{
    COMPOSITE_MARKER, COMPOSITE_SEPARATOR, Column, FULL_WIDTH_MARKER, TableData, TextData,
};

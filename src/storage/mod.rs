pub mod cache;
pub mod columns;
pub mod model;

pub use cache::{
    AccountingCache, CacheEntry, CacheError, cache_path_for_cluster, default_cache_dir,
    merge_tables,
};
pub use columns::{expanded_fields, parse_column_config, with_required_columns};
pub use model::{Column, TableData, TextData};

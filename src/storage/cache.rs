//! Persistent accounting cache.
//!
//! One file per cluster holds the accounting rows of the window fetched so far.
//! Each write merges a newer window into the stored rows (or replaces them
//! wholesale) and rewrites the file atomically.
//!
//! File format:
//! ```text
//! [magic "STAC" 4B][version u16 LE][zstd(bincode(CacheEntry))]
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use super::model::TableData;

const MAGIC: [u8; 4] = *b"STAC";
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 6;
const ZSTD_LEVEL: i32 = 3;

/// Cache failure. Only `Io` on write is ever propagated to providers;
/// read failures make the cache unusable instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    Io(String),
    /// The file does not decode.
    Corrupt(String),
    /// Written by an incompatible format version.
    VersionMismatch { found: u16, expected: u16 },
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Io(msg) => write!(f, "cache I/O error: {}", msg),
            CacheError::Corrupt(msg) => write!(f, "cache file is corrupt: {}", msg),
            CacheError::VersionMismatch { found, expected } => write!(
                f,
                "cache format version {} is not supported (expected {})",
                found, expected
            ),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<io::Error> for CacheError {
    fn from(e: io::Error) -> Self {
        CacheError::Io(e.to_string())
    }
}

/// Persisted record: the covered window plus its rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Window start, unix milliseconds.
    pub window_start: i64,
    /// Window end, unix milliseconds.
    pub window_end: i64,
    pub data: TableData,
}

impl CacheEntry {
    pub fn new(data: TableData, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            window_start: start.timestamp_millis(),
            window_end: end.timestamp_millis(),
            data,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        millis_to_datetime(self.window_start)
    }

    pub fn end(&self) -> DateTime<Utc> {
        millis_to_datetime(self.window_end)
    }

    fn encode(&self) -> Result<Vec<u8>, CacheError> {
        let raw = bincode::serialize(self).map_err(|e| CacheError::Corrupt(e.to_string()))?;
        let compressed = zstd::encode_all(&raw[..], ZSTD_LEVEL)?;

        let mut buf = Vec::with_capacity(HEADER_SIZE + compressed.len());
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.extend_from_slice(&compressed);
        Ok(buf)
    }

    fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CacheError::Corrupt(format!(
                "file too short ({} bytes)",
                bytes.len()
            )));
        }
        if bytes[0..4] != MAGIC {
            return Err(CacheError::Corrupt("bad magic".to_string()));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(CacheError::VersionMismatch {
                found: version,
                expected: VERSION,
            });
        }

        let raw = zstd::decode_all(&bytes[HEADER_SIZE..])
            .map_err(|e| CacheError::Corrupt(e.to_string()))?;
        let entry: CacheEntry =
            bincode::deserialize(&raw).map_err(|e| CacheError::Corrupt(e.to_string()))?;
        if !entry.data.is_consistent() {
            return Err(CacheError::Corrupt(
                "row length does not match headers".to_string(),
            ));
        }
        Ok(entry)
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// User cache directory: `$XDG_CACHE_HOME`, else `$HOME/.cache`.
pub fn default_cache_dir() -> Option<PathBuf> {
    let non_empty = |key: &str| std::env::var_os(key).filter(|v| !v.is_empty());
    non_empty("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| non_empty("HOME").map(|home| PathBuf::from(home).join(".cache")))
}

/// Cache file of `cluster` under `base`.
///
/// The name is derived from a hash of the cluster name so that histories of
/// different clusters never mix.
pub fn cache_path_for_cluster(base: &Path, cluster: &str) -> PathBuf {
    base.join("slurmtop")
        .join(format!("sacct_{:016x}.bin.zst", xxh3_64(cluster.as_bytes())))
}

/// Merges `new` into `existing`.
///
/// Rows are keyed by their first cell. A row of `new` replaces the existing row
/// with the same key in place; keys not seen before are appended. The result
/// is sorted descending by key. Rows whose cell count does not match the new
/// headers are dropped.
///
/// Correct only when `new` covers a later window than `existing`.
pub fn merge_tables(existing: &TableData, new: &TableData) -> TableData {
    let width = new.headers.len();
    let consistent = |row: &&Vec<String>| row.len() == width && !row.is_empty();

    let mut pending: HashMap<&str, usize> = HashMap::new();
    let mut new_rows: Vec<Option<&Vec<String>>> = Vec::with_capacity(new.rows.len());
    for row in new.rows.iter().filter(consistent) {
        match pending.get(row[0].as_str()) {
            Some(&idx) => new_rows[idx] = Some(row),
            None => {
                pending.insert(row[0].as_str(), new_rows.len());
                new_rows.push(Some(row));
            }
        }
    }

    let mut rows = Vec::with_capacity(existing.rows.len() + new_rows.len());
    for row in existing.rows.iter().filter(consistent) {
        match pending.remove(row[0].as_str()) {
            Some(idx) => {
                if let Some(replacement) = new_rows[idx].take() {
                    rows.push(replacement.clone());
                }
            }
            None => rows.push(row.clone()),
        }
    }
    rows.extend(new_rows.into_iter().flatten().cloned());
    rows.sort_by(|a, b| identifier_key(&b[0]).cmp(&identifier_key(&a[0])));

    let mut headers = new.headers.clone();
    if existing.header_names() == new.header_names() {
        for (col, old) in headers.iter_mut().zip(&existing.headers) {
            col.width = col.width.max(old.width);
        }
    }

    TableData { headers, rows }
}

/// Sort key of a row identifier: integers order numerically and rank above
/// non-numeric identifiers, which order lexicographically.
///
/// Deliberately not plain string order, which would put job `9` above job
/// `10`. Array and step ids such as `12_3` are non-numeric and sort last.
fn identifier_key(id: &str) -> (Option<u64>, &str) {
    (id.parse::<u64>().ok(), id)
}

/// On-disk accounting cache of one cluster.
///
/// Single writer: one process owns a cache file at a time.
#[derive(Debug)]
pub struct AccountingCache {
    path: PathBuf,
    entry: Option<CacheEntry>,
    usable: bool,
}

impl AccountingCache {
    /// Opens the cache at `path`, creating its directory, and loads it.
    ///
    /// A missing or undecodable file is not an error: the cache starts unusable.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut cache = Self {
            path,
            entry: None,
            usable: false,
        };
        cache.read();
        Ok(cache)
    }

    /// Opens the cache file of `cluster` under `base`.
    pub fn for_cluster(base: &Path, cluster: &str) -> Result<Self, CacheError> {
        Self::open(cache_path_for_cluster(base, cluster))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the last read or write produced a decodable, non-empty cache.
    pub fn is_usable(&self) -> bool {
        self.usable
    }

    /// Window covered by the cached rows, when usable.
    pub fn window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.entry
            .as_ref()
            .filter(|_| self.usable)
            .map(|e| (e.start(), e.end()))
    }

    /// Reads the file and returns its rows.
    ///
    /// Any failure marks the cache unusable. A decodable file without rows is
    /// returned as empty data and also leaves the cache unusable.
    pub fn try_read(&mut self) -> Result<TableData, CacheError> {
        let result = fs::read(&self.path)
            .map_err(CacheError::from)
            .and_then(|bytes| CacheEntry::decode(&bytes));

        match result {
            Ok(entry) => {
                let data = entry.data.clone();
                self.usable = !data.is_empty();
                self.entry = Some(entry);
                Ok(data)
            }
            Err(e) => {
                self.usable = false;
                self.entry = None;
                Err(e)
            }
        }
    }

    /// Reads the file, degrading every failure to empty data.
    pub fn read(&mut self) -> TableData {
        match self.try_read() {
            Ok(data) => data,
            Err(CacheError::Io(msg)) if !self.path.exists() => {
                debug!(path = %self.path.display(), error = %msg, "accounting cache absent");
                TableData::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "accounting cache unusable");
                TableData::default()
            }
        }
    }

    /// Stores `data` covering `start..end`.
    ///
    /// With `force`, or when the cache is unusable, the file is replaced by
    /// `data` alone, sorted like a merge. Otherwise the stored rows are merged
    /// with `data`; when the stored column layout differs the write degrades
    /// to a replacement.
    pub fn write(
        &mut self,
        data: &TableData,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        force: bool,
    ) -> Result<(), CacheError> {
        let merged = if force || !self.usable {
            None
        } else {
            match self.try_read() {
                Ok(existing) if existing.header_names() == data.header_names() => {
                    Some(merge_tables(&existing, data))
                }
                Ok(_) => {
                    debug!("accounting columns changed, rewriting cache");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "accounting cache unreadable, rewriting");
                    None
                }
            }
        };

        let full_rewrite = merged.is_none();
        let rows = merged.unwrap_or_else(|| merge_tables(&TableData::default(), data));
        let entry = CacheEntry::new(rows, start, end);
        self.persist(&entry)?;

        debug!(
            path = %self.path.display(),
            rows = entry.data.len(),
            full_rewrite,
            start = %entry.start(),
            end = %entry.end(),
            "accounting cache written"
        );
        self.entry = Some(entry);
        self.usable = true;
        Ok(())
    }

    /// Writes `entry` to a temporary file next to the cache and renames it
    /// over the cache file.
    fn persist(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let bytes = entry.encode()?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| CacheError::Io(e.error.to_string()))?;
        Ok(())
    }
}

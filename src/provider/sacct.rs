//! Accounting view backed by the incremental cache.
//!
//! Each fetch queries `sacct` for a window reaching back to the previous fetch
//! (or to `load_since` on the first one), merges the rows into the on-disk
//! cache and publishes the whole cached history.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use crate::collector::slurm::SACCT;
use crate::collector::{PARSABLE_DELIMITER, parse_delimited_output};
use crate::storage::{AccountingCache, Column, TableData, expanded_fields};

use super::{DataProvider, FilterArgs, ProviderContext, ProviderError, ProviderState};

/// What the next accounting fetch covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    /// How far back `sacct` is asked to look.
    pub fetch_since: Duration,
    /// Start recorded for the cache after the write.
    pub window_start: DateTime<Utc>,
    /// Replace the cache instead of merging into it.
    pub full_rewrite: bool,
}

/// Decides the next accounting window.
///
/// Returns `None` when `load_since` is zero, which disables accounting
/// fetches.
///
/// * After a fetch in this process, only the time since that fetch is queried
///   and merged.
/// * On the first fetch with a usable cache: a `load_since` reaching before
///   the cache start forces a full rewrite; one inside the cached range is
///   merged keeping the cache start; one newer than the cache end is narrowed
///   to the time since the cache end.
/// * Without a usable cache the whole `load_since` window is fetched and
///   written.
pub fn plan_window(
    now: DateTime<Utc>,
    load_since: Duration,
    last_fetch: Option<DateTime<Utc>>,
    cached: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Option<WindowPlan> {
    if load_since.is_zero() {
        return None;
    }
    let requested_start = TimeDelta::from_std(load_since)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let full = WindowPlan {
        fetch_since: load_since,
        window_start: requested_start,
        full_rewrite: true,
    };

    if let Some(last) = last_fetch {
        let Ok(since_last) = (now - last).to_std() else {
            return Some(full);
        };
        if since_last.is_zero() {
            return Some(full);
        }
        let window_start = cached.map_or(requested_start, |(start, _)| start);
        return Some(WindowPlan {
            fetch_since: since_last,
            window_start,
            full_rewrite: false,
        });
    }

    let Some((start, end)) = cached else {
        return Some(full);
    };
    let cache_age = (now - start).to_std().unwrap_or_default();
    let cache_end_age = (now - end).to_std().unwrap_or_default();

    if load_since > cache_age {
        Some(full)
    } else if load_since >= cache_end_age {
        Some(WindowPlan {
            fetch_since: load_since,
            window_start: start,
            full_rewrite: false,
        })
    } else {
        Some(WindowPlan {
            fetch_since: cache_end_age,
            window_start: start,
            full_rewrite: false,
        })
    }
}

/// Job accounting history from `sacct`, merged across fetches and restarts.
pub struct SacctProvider {
    state: ProviderState<TableData>,
    ctx: ProviderContext,
    columns: Vec<Column>,
    timeout: Duration,
    load_since: Duration,
    refresh_interval: Duration,
    cache: Mutex<AccountingCache>,
    last_fetch: Mutex<Option<DateTime<Utc>>>,
}

impl SacctProvider {
    /// `columns` must start with `JobIDRaw`, `Partition` and `State`; the
    /// first one identifies rows in the cache.
    ///
    /// History already in the cache is served right away, so a failing
    /// first `sacct` still leaves the view populated.
    pub fn new(
        ctx: ProviderContext,
        columns: Vec<Column>,
        mut cache: AccountingCache,
        timeout: Duration,
        load_since: Duration,
        refresh_interval: Duration,
    ) -> Self {
        let cached = cache.read();
        let updated = cache.window().map(|(_, end)| end);
        Self {
            state: ProviderState::seeded("sacct", cached, updated),
            ctx,
            columns,
            timeout,
            load_since,
            refresh_interval,
            cache: Mutex::new(cache),
            last_fetch: Mutex::new(None),
        }
    }

    /// `sacct` arguments for a window reaching `since` into the past.
    ///
    /// The window is never shorter than the refresh interval or one second.
    pub fn command_args(&self, since: Duration) -> Vec<String> {
        let secs = since
            .as_secs()
            .max(self.refresh_interval.as_secs())
            .max(1);
        vec![
            "--allusers".to_string(),
            "--allocations".to_string(),
            "--parsable2".to_string(),
            format!("--starttime=now-{}", secs),
            "--format".to_string(),
            expanded_fields(&self.columns).join(","),
        ]
    }

    fn fetch_into_cache(&self, cache: &mut AccountingCache) -> Result<(), ProviderError> {
        let now = Utc::now();
        let mut last_fetch = self.last_fetch.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(plan) = plan_window(now, self.load_since, *last_fetch, cache.window()) else {
            debug!("accounting fetch disabled, serving cached history");
            return Ok(());
        };
        debug!(
            fetch_since_secs = plan.fetch_since.as_secs(),
            window_start = %plan.window_start,
            full_rewrite = plan.full_rewrite,
            "accounting window planned"
        );

        let out = self
            .ctx
            .run(SACCT, &self.command_args(plan.fetch_since), self.timeout)?;
        let records = parse_delimited_output(&out, PARSABLE_DELIMITER);
        let previous = self.state.with_data(|d| TableData::new(d.headers.clone()));
        let fetched = self.ctx.build_table(&records, &self.columns, &previous, 1);

        let end = Utc::now();
        cache.write(&fetched, plan.window_start, end, plan.full_rewrite)?;
        *last_fetch = Some(end);
        info!(
            rows = fetched.len(),
            window_start = %plan.window_start,
            window_end = %end,
            "accounting cache updated"
        );
        Ok(())
    }
}

impl DataProvider for SacctProvider {
    type Data = TableData;

    fn state(&self) -> &ProviderState<TableData> {
        &self.state
    }

    /// Fetches the next window into the cache and publishes the cached rows.
    fn fetch(&self) -> Result<(), ProviderError> {
        self.state.run_fetch(|| {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            self.fetch_into_cache(&mut cache)?;
            Ok(cache.read())
        })
    }

    /// Partition and state are both substring matches, so `CANCELLED` also
    /// matches `CANCELLED by 0`.
    fn filtered_data(&self, filter: &FilterArgs) -> TableData {
        self.state.with_data(|data| {
            let partition = data.column_index("Partition");
            let state = data.column_index("State");
            data.filtered(|row| {
                partition.is_none_or(|i| filter.partition_matches(&row[i]))
                    && state.is_none_or(|i| filter.state_contains(&row[i]))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockRunner, SACCT_WINDOW_1, SACCT_WINDOW_2};
    use crate::provider::test_support::{context, failed};
    use crate::storage::parse_column_config;
    use tempfile::tempdir;

    const MIN: Duration = Duration::from_secs(60);

    fn at(minutes_ago: i64, now: DateTime<Utc>) -> DateTime<Utc> {
        now - TimeDelta::minutes(minutes_ago)
    }

    #[test]
    fn test_plan_disabled() {
        assert_eq!(plan_window(Utc::now(), Duration::ZERO, None, None), None);
    }

    #[test]
    fn test_plan_first_fetch_without_cache() {
        let now = Utc::now();
        let plan = plan_window(now, 30 * MIN, None, None).unwrap();
        assert!(plan.full_rewrite);
        assert_eq!(plan.fetch_since, 30 * MIN);
        assert_eq!(plan.window_start, at(30, now));
    }

    #[test]
    fn test_plan_subsequent_fetch() {
        let now = Utc::now();
        let cached = Some((at(30, now), at(2, now)));
        let plan = plan_window(now, 30 * MIN, Some(at(2, now)), cached).unwrap();
        assert!(!plan.full_rewrite);
        assert_eq!(plan.fetch_since, 2 * MIN);
        assert_eq!(plan.window_start, at(30, now));
    }

    #[test]
    fn test_plan_request_older_than_cache() {
        let now = Utc::now();
        let plan = plan_window(now, 60 * MIN, None, Some((at(30, now), at(5, now)))).unwrap();
        assert!(plan.full_rewrite);
        assert_eq!(plan.fetch_since, 60 * MIN);
        assert_eq!(plan.window_start, at(60, now));
    }

    #[test]
    fn test_plan_request_inside_cache() {
        let now = Utc::now();
        let plan = plan_window(now, 20 * MIN, None, Some((at(30, now), at(5, now)))).unwrap();
        assert!(!plan.full_rewrite);
        assert_eq!(plan.fetch_since, 20 * MIN);
        assert_eq!(plan.window_start, at(30, now));
    }

    #[test]
    fn test_plan_request_newer_than_cache_end() {
        let now = Utc::now();
        let plan = plan_window(now, 10 * MIN, None, Some((at(300, now), at(60, now)))).unwrap();
        assert!(!plan.full_rewrite);
        assert_eq!(plan.fetch_since, 60 * MIN);
        assert_eq!(plan.window_start, at(300, now));
    }

    fn columns() -> Vec<Column> {
        parse_column_config("JobIDRaw,Partition,State,JobName,ReqCPUS//AllocCPUS").unwrap()
    }

    fn provider(
        runner: MockRunner,
        cache: AccountingCache,
        load_since: Duration,
    ) -> (SacctProvider, std::sync::Arc<MockRunner>) {
        let (ctx, runner) = context(runner);
        let p = SacctProvider::new(
            ctx,
            columns(),
            cache,
            Duration::from_secs(25),
            load_since,
            MIN,
        );
        (p, runner)
    }

    fn ids(data: &TableData) -> Vec<&str> {
        data.rows.iter().map(|r| r[0].as_str()).collect()
    }

    #[test]
    fn test_command_args() {
        let dir = tempdir().unwrap();
        let cache = AccountingCache::open(dir.path().join("c.bin.zst")).unwrap();
        let (p, _) = provider(MockRunner::new(), cache, 30 * MIN);
        let args = p.command_args(Duration::from_secs(5));
        assert_eq!(args[3], "--starttime=now-60");
        assert_eq!(args[5], "JobIDRaw,Partition,State,JobName,ReqCPUS,AllocCPUS");
        assert_eq!(p.command_args(2 * 60 * MIN)[3], "--starttime=now-7200");
    }

    #[test]
    fn test_windows_merge_across_fetches() {
        let dir = tempdir().unwrap();
        let cache = AccountingCache::open(dir.path().join("c.bin.zst")).unwrap();
        let runner = MockRunner::new()
            .on(SACCT, Ok(SACCT_WINDOW_1.to_string()))
            .on(SACCT, Ok(SACCT_WINDOW_2.to_string()));
        let (p, runner) = provider(runner, cache, 30 * MIN);

        p.fetch().unwrap();
        assert_eq!(ids(&p.data()), vec!["2", "1"]);
        assert!(runner.calls()[0].contains("--starttime=now-1800"));

        p.fetch().unwrap();
        let data = p.data();
        assert_eq!(ids(&data), vec!["3", "2", "1"]);
        assert_eq!(data.rows[1][2], "COMPLETED");
        assert!(runner.calls()[1].contains("--starttime=now-60"));
        assert!(p.cache.lock().unwrap().is_usable());

        let filtered = p.filtered_data(&FilterArgs::new("", "RUNNING"));
        assert_eq!(ids(&filtered), vec!["3", "1"]);
    }

    #[test]
    fn test_history_survives_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.bin.zst");
        {
            let cache = AccountingCache::open(&path).unwrap();
            let runner = MockRunner::new().on(SACCT, Ok(SACCT_WINDOW_1.to_string()));
            let (p, _) = provider(runner, cache, 30 * MIN);
            p.fetch().unwrap();
        }

        let cache = AccountingCache::open(&path).unwrap();
        assert!(cache.is_usable());
        let runner = MockRunner::new().on(SACCT, Ok(SACCT_WINDOW_2.to_string()));
        let (p, _) = provider(runner, cache, 20 * MIN);
        p.fetch().unwrap();
        assert_eq!(ids(&p.data()), vec!["3", "2", "1"]);
    }

    fn seed_cache(path: &std::path::Path) {
        let mut seeded = AccountingCache::open(path).unwrap();
        let table = TableData {
            headers: columns(),
            rows: vec![vec!["9".into(), "gpu".into(), "RUNNING".into(), "x".into(), "1/1".into()]],
        };
        seeded.write(&table, Utc::now(), Utc::now(), true).unwrap();
    }

    #[test]
    fn test_disabled_serves_cache_without_command() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.bin.zst");
        seed_cache(&path);

        let cache = AccountingCache::open(&path).unwrap();
        let (p, runner) = provider(MockRunner::new(), cache, Duration::ZERO);
        p.fetch().unwrap();
        assert_eq!(ids(&p.data()), vec!["9"]);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_failed_sacct_keeps_history() {
        let dir = tempdir().unwrap();
        let cache = AccountingCache::open(dir.path().join("c.bin.zst")).unwrap();
        let runner = MockRunner::new().on(SACCT, Ok(SACCT_WINDOW_1.to_string()));
        let (p, runner) = provider(runner, cache, 30 * MIN);
        p.fetch().unwrap();

        runner.replace(SACCT, failed(SACCT));
        assert!(p.fetch().is_err());
        assert_eq!(ids(&p.data()), vec!["2", "1"]);
        assert!(p.last_error().is_some());
    }

    #[test]
    fn test_failed_first_fetch_serves_cached_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.bin.zst");
        seed_cache(&path);

        let cache = AccountingCache::open(&path).unwrap();
        let (p, runner) = provider(MockRunner::new().on(SACCT, failed(SACCT)), cache, 30 * MIN);
        assert_eq!(ids(&p.data()), vec!["9"]);
        assert!(p.last_updated().is_some());

        assert!(p.fetch().is_err());
        assert_eq!(runner.calls().len(), 1);
        assert_eq!(p.data().len(), 1);
        assert!(p.last_error().is_some());
    }

    #[test]
    fn test_timed_out_sacct_keeps_window() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.bin.zst");
        seed_cache(&path);

        let runner = MockRunner::new()
            .on(SACCT, Ok(SACCT_WINDOW_1.to_string()))
            .with_delay(Duration::from_millis(50));
        let (ctx, runner) = context(runner);
        let cache = AccountingCache::open(&path).unwrap();
        let p = SacctProvider::new(
            ctx,
            columns(),
            cache,
            Duration::from_millis(10),
            30 * MIN,
            MIN,
        );

        assert!(matches!(p.fetch(), Err(ProviderError::Timeout { .. })));
        assert!(matches!(p.last_error(), Some(ProviderError::Timeout { .. })));
        assert_eq!(ids(&p.data()), vec!["9"]);
        assert!(p.last_fetch.lock().unwrap().is_none());
        assert_eq!(runner.calls().len(), 1);
    }
}

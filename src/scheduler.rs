//! Fetch and render cadence.
//!
//! Two independent timers drive the dashboard: a short render tick that only
//! redraws from held snapshots, and the refresh tick that re-fetches the
//! active view's provider. Inactive views are not refreshed on a timer;
//! switching to a view whose data is older than the refresh interval fetches
//! it before the next render.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::provider::{ProviderError, RefreshTarget};

/// Longest sleep of the headless loop, bounding shutdown latency.
const MAX_IDLE_SLEEP: Duration = Duration::from_millis(100);

/// Dashboard views bound to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Nodes,
    Jobs,
    Accounting,
    AccountingManager,
    Diagnostics,
}

impl View {
    pub const ALL: [View; 5] = [
        View::Nodes,
        View::Jobs,
        View::Accounting,
        View::AccountingManager,
        View::Diagnostics,
    ];

    pub fn title(self) -> &'static str {
        match self {
            View::Nodes => "Nodes",
            View::Jobs => "Jobs",
            View::Accounting => "Accounting",
            View::AccountingManager => "Accounting Manager",
            View::Diagnostics => "Scheduler",
        }
    }

    /// View selected by the number keys `1`..`5`.
    pub fn from_key(key: char) -> Option<View> {
        let idx = key.to_digit(10)?.checked_sub(1)? as usize;
        View::ALL.get(idx).copied()
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Work due at a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Fetch(View),
    Render(View),
}

/// Drives provider refreshes for the active view.
pub struct RefreshScheduler {
    targets: HashMap<View, Arc<dyn RefreshTarget>>,
    background: Vec<Arc<dyn RefreshTarget>>,
    active: View,
    refresh_interval: Duration,
    render_interval: Duration,
    next_fetch: Instant,
    next_render: Instant,
    workers: Vec<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Fails when the request timeout is not shorter than the refresh
    /// interval, since fetches could then pile up behind a hung tool.
    pub fn new(config: &Config, active: View) -> Result<Self, ConfigError> {
        if config.request_timeout >= config.refresh_interval {
            return Err(ConfigError::InvalidTimeout {
                request_timeout: config.request_timeout,
                refresh_interval: config.refresh_interval,
            });
        }

        let now = Instant::now();
        Ok(Self {
            targets: HashMap::new(),
            background: Vec::new(),
            active,
            refresh_interval: config.refresh_interval,
            render_interval: config.render_interval,
            next_fetch: now + config.refresh_interval,
            next_render: now,
            workers: Vec::new(),
        })
    }

    /// Binds the provider shown by `view`.
    pub fn bind(&mut self, view: View, target: Arc<dyn RefreshTarget>) {
        self.targets.insert(view, target);
    }

    /// Adds a provider fetched at startup but not bound to a view.
    pub fn add_background(&mut self, target: Arc<dyn RefreshTarget>) {
        self.background.push(target);
    }

    pub fn active(&self) -> View {
        self.active
    }

    pub fn target(&self, view: View) -> Option<&Arc<dyn RefreshTarget>> {
        self.targets.get(&view)
    }

    /// Runs every provider's first fetch concurrently and waits for all.
    ///
    /// Failures are logged and returned; providers keep serving empty data.
    pub fn startup_fetch(&self) -> Vec<(String, Result<(), ProviderError>)> {
        let started = Instant::now();
        let mut targets: Vec<&Arc<dyn RefreshTarget>> = View::ALL
            .iter()
            .filter_map(|v| self.targets.get(v))
            .collect();
        targets.extend(self.background.iter());

        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = targets
                .iter()
                .map(|target| s.spawn(move || (target.name().to_string(), target.refresh())))
                .collect();
            handles
                .into_iter()
                .filter_map(|h| h.join().ok())
                .collect()
        });

        for (name, result) in &results {
            if let Err(e) = result {
                warn!(provider = %name, error = %e, "initial fetch failed");
            }
        }
        info!(
            providers = results.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "initial fetch finished"
        );
        results
    }

    /// Returns the ticks due at `now` and schedules the next ones.
    pub fn poll(&mut self, now: Instant) -> Vec<Tick> {
        let mut ticks = Vec::new();
        if now >= self.next_fetch {
            ticks.push(Tick::Fetch(self.active));
            self.next_fetch = now + self.refresh_interval;
        }
        if now >= self.next_render {
            ticks.push(Tick::Render(self.active));
            self.next_render = now + self.render_interval;
        }
        ticks
    }

    /// Time until the next tick is due.
    pub fn until_next_tick(&self, now: Instant) -> Duration {
        self.next_fetch
            .min(self.next_render)
            .saturating_duration_since(now)
    }

    /// Starts a background fetch for `view`.
    ///
    /// Returns `false` without starting anything when the view has no
    /// provider or its previous fetch is still running.
    pub fn dispatch_fetch(&mut self, view: View) -> bool {
        self.workers.retain(|w| !w.is_finished());

        let Some(target) = self.targets.get(&view) else {
            return false;
        };
        if target.is_fetching() {
            debug!(view = %view, "fetch still running, tick skipped");
            return false;
        }

        let target = Arc::clone(target);
        self.workers.push(thread::spawn(move || {
            let started = Instant::now();
            match target.refresh() {
                Ok(()) => debug!(
                    provider = target.name(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "fetch completed"
                ),
                Err(ProviderError::Busy) => {}
                Err(e) => warn!(provider = target.name(), error = %e, "fetch failed"),
            }
        }));
        true
    }

    /// Whether `view`'s data is older than the refresh interval at `now`.
    pub fn is_stale(&self, view: View, now: DateTime<Utc>) -> bool {
        let Some(target) = self.targets.get(&view) else {
            return false;
        };
        match target.updated_at() {
            None => true,
            Some(updated) => (now - updated)
                .to_std()
                .is_ok_and(|age| age > self.refresh_interval),
        }
    }

    /// Makes `view` active and fetches it first when stale.
    ///
    /// Returns whether a fetch ran. The next poll renders immediately.
    pub fn switch_to(&mut self, view: View, now: DateTime<Utc>) -> bool {
        self.active = view;
        self.next_render = Instant::now();

        if !self.is_stale(view, now) {
            return false;
        }
        let Some(target) = self.targets.get(&view) else {
            return false;
        };
        debug!(view = %view, "view is stale, fetching before render");
        if let Err(e) = target.refresh() {
            warn!(view = %view, error = %e, "fetch on view switch failed");
        }
        true
    }

    /// Polls until `stop` is set, dispatching fetches and calling
    /// `on_render` for render ticks.
    pub fn run_headless(&mut self, stop: &AtomicBool, mut on_render: impl FnMut(View)) {
        while !stop.load(Ordering::SeqCst) {
            for tick in self.poll(Instant::now()) {
                match tick {
                    Tick::Fetch(view) => {
                        self.dispatch_fetch(view);
                    }
                    Tick::Render(view) => on_render(view),
                }
            }
            thread::sleep(self.until_next_tick(Instant::now()).min(MAX_IDLE_SLEEP));
        }
        self.shutdown();
    }

    /// Waits for running background fetches.
    pub fn shutdown(&mut self) {
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

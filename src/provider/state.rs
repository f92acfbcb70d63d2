//! Lock-protected snapshot holder shared by all providers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::ProviderError;

/// Successful fetches across every provider of this process.
static FETCHES_COMPLETED: AtomicU64 = AtomicU64::new(0);

pub fn fetches_completed() -> u64 {
    FETCHES_COMPLETED.load(Ordering::Relaxed)
}

/// Lifecycle of the most recent fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No fetch has run yet.
    Idle,
    Fetching,
    Updated,
    Errored,
}

struct Inner<D> {
    data: D,
    last_updated: Option<DateTime<Utc>>,
    last_error: Option<ProviderError>,
    phase: Phase,
    fetch_count: u64,
    subscribers: Vec<SyncSender<()>>,
    closed: bool,
}

/// Live snapshot plus fetch bookkeeping of one provider.
///
/// Readers take a shared lock only long enough to clone; a fetch holds the
/// exclusive lock only to swap the finished snapshot in.
pub struct ProviderState<D> {
    name: &'static str,
    inner: RwLock<Inner<D>>,
    in_flight: AtomicBool,
}

/// Clears the in-flight marker when the fetch ends, including by panic.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<D: Clone + Default> ProviderState<D> {
    pub fn new(name: &'static str) -> Self {
        Self::seeded(name, D::default(), None)
    }

    /// State that starts out serving `data`, e.g. history loaded from disk.
    /// Nothing is published, so subscribers are not woken and the fetch
    /// count stays zero.
    pub fn seeded(name: &'static str, data: D, updated: Option<DateTime<Utc>>) -> Self {
        Self {
            name,
            inner: RwLock::new(Inner {
                data,
                last_updated: updated,
                last_error: None,
                phase: Phase::Idle,
                fetch_count: 0,
                subscribers: Vec::new(),
                closed: false,
            }),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner<D>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner<D>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deep copy of the live snapshot.
    pub fn data(&self) -> D {
        self.read().data.clone()
    }

    /// Runs `f` against the live snapshot under the shared lock.
    pub fn with_data<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&self.read().data)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.read().last_updated
    }

    pub fn last_error(&self) -> Option<ProviderError> {
        self.read().last_error.clone()
    }

    pub fn phase(&self) -> Phase {
        self.read().phase
    }

    /// Successful fetches of this provider.
    pub fn fetch_count(&self) -> u64 {
        self.read().fetch_count
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs one fetch: `produce` executes without holding the lock, then its
    /// result is published or recorded as the last error.
    ///
    /// Returns `ProviderError::Busy` without touching state when another
    /// fetch of this provider is running.
    pub fn run_fetch(
        &self,
        produce: impl FnOnce() -> Result<D, ProviderError>,
    ) -> Result<(), ProviderError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(provider = self.name, "fetch skipped, already in flight");
            return Err(ProviderError::Busy);
        }
        let _guard = InFlight(&self.in_flight);

        self.write().phase = Phase::Fetching;
        match produce() {
            Ok(data) => {
                self.publish(data);
                Ok(())
            }
            Err(e) => {
                self.record_error(e.clone());
                Err(e)
            }
        }
    }

    /// Swaps in `data`, stamps the update time, clears the error and
    /// notifies subscribers.
    pub fn publish(&self, data: D) {
        let mut inner = self.write();
        inner.data = data;
        inner.last_updated = Some(Utc::now());
        inner.last_error = None;
        inner.phase = Phase::Updated;
        inner.fetch_count += 1;
        FETCHES_COMPLETED.fetch_add(1, Ordering::Relaxed);

        // A full queue already holds an unread wake-up; drop this one.
        inner.subscribers.retain(|tx| match tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        });
    }

    /// Records a failed fetch; data and update time stay as they were.
    pub fn record_error(&self, error: ProviderError) {
        warn!(provider = self.name, error = %error, "fetch failed, keeping previous data");
        let mut inner = self.write();
        inner.last_error = Some(error);
        inner.phase = Phase::Errored;
    }

    /// New notification queue holding at most one pending wake-up.
    ///
    /// After `close()` the returned receiver is already disconnected.
    pub fn subscribe(&self) -> Receiver<()> {
        let (tx, rx) = mpsc::sync_channel(1);
        let mut inner = self.write();
        if !inner.closed {
            inner.subscribers.push(tx);
        }
        rx
    }

    /// Drops every subscriber queue.
    pub fn close(&self) {
        let mut inner = self.write();
        inner.closed = true;
        inner.subscribers.clear();
    }
}

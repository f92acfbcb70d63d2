//! Event handling for TUI.
//!
//! Uses a separate thread to poll for terminal events. Timer ticks come from
//! the refresh scheduler, so this only forwards input.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};

/// How long the input thread blocks before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Terminal events.
#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    /// Terminal resize (width, height).
    Resize(u16, u16),
}

/// Event handler that polls for terminal events in a separate thread.
pub struct EventHandler {
    rx: Receiver<Event>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            loop {
                if !event::poll(POLL_INTERVAL).unwrap_or(false) {
                    continue;
                }
                let Ok(evt) = event::read() else {
                    continue;
                };
                let event = match evt {
                    CrosstermEvent::Key(key) => Event::Key(key),
                    CrosstermEvent::Resize(w, h) => Event::Resize(w, h),
                    _ => continue,
                };
                // Receiver gone: the app has exited.
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        Self { rx }
    }

    /// Waits up to `timeout` for the next event.
    ///
    /// Returns `Ok(None)` on timeout and an error once the input thread died.
    pub fn next(&self, timeout: Duration) -> Result<Option<Event>, RecvTimeoutError> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

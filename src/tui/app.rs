//! Main TUI application.

use std::io;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};

use crate::collector::commands_executed;
use crate::provider::{DataProvider, FilterArgs, ProviderSet, fetches_completed};
use crate::scheduler::{RefreshScheduler, Tick, View};
use crate::storage::TableData;

use super::event::{Event, EventHandler};
use super::input::{KeyAction, handle_key};
use super::render::{Content, Screen, render};
use super::state::AppState;

/// Longest wait for input before checking provider updates.
const UPDATE_POLL: Duration = Duration::from_millis(200);

/// Main TUI application.
pub struct App {
    providers: ProviderSet,
    scheduler: RefreshScheduler,
    state: AppState,
    updates: Vec<Receiver<()>>,
    should_quit: bool,
}

impl App {
    pub fn new(providers: ProviderSet, scheduler: RefreshScheduler, state: AppState) -> Self {
        let mut updates = vec![
            providers.nodes.subscribe(),
            providers.jobs.subscribe(),
            providers.partitions.subscribe(),
            providers.sdiag.subscribe(),
        ];
        if let Some(sacct) = &providers.sacct {
            updates.push(sacct.subscribe());
        }
        if let Some(sacctmgr) = &providers.sacctmgr {
            updates.push(sacctmgr.subscribe());
        }

        Self {
            providers,
            scheduler,
            state,
            updates,
            should_quit: false,
        }
    }

    /// Runs the TUI application until the operator quits.
    pub fn run(mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let events = EventHandler::new();
        let result = self.event_loop(&mut terminal, &events);

        // Restore terminal even when drawing failed.
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        self.scheduler.shutdown();
        self.providers.close();
        result
    }

    fn event_loop<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        events: &EventHandler,
    ) -> io::Result<()> {
        let mut dirty = true;

        while !self.should_quit {
            for tick in self.scheduler.poll(Instant::now()) {
                match tick {
                    Tick::Fetch(view) => self.refresh(view),
                    Tick::Render(_) => dirty = true,
                }
            }
            if self.drain_updates() {
                dirty = true;
            }

            if dirty {
                self.state.set_partitions(self.providers.partitions.names());
                self.state.fetches = fetches_completed();
                self.state.commands = commands_executed();
                let screen = self.screen();
                terminal.draw(|frame| render(frame, &mut self.state, &screen))?;
                dirty = false;
            }

            let wait = self
                .scheduler
                .until_next_tick(Instant::now())
                .min(UPDATE_POLL);
            match events.next(wait) {
                Ok(Some(Event::Key(key))) => {
                    let action = handle_key(&mut self.state, key);
                    self.apply(action);
                    dirty = true;
                }
                Ok(Some(Event::Resize(..))) => dirty = true,
                Ok(None) => {}
                Err(_) => self.should_quit = true,
            }
        }
        Ok(())
    }

    fn apply(&mut self, action: KeyAction) {
        match action {
            KeyAction::None => {}
            KeyAction::Quit => self.should_quit = true,
            KeyAction::SwitchView(view) => {
                self.scheduler.switch_to(view, Utc::now());
            }
            KeyAction::Refresh => self.refresh(self.state.active),
            KeyAction::SelectEntity(entity) => {
                if let Some(sacctmgr) = &self.providers.sacctmgr {
                    sacctmgr.select(entity);
                }
                self.refresh(View::AccountingManager);
            }
        }
    }

    /// Starts a background fetch of `view`.
    fn refresh(&mut self, view: View) {
        if !self.scheduler.dispatch_fetch(view) {
            self.state.status_message = Some(format!("{} fetch still running", view));
        }
    }

    /// Whether any provider published since the last call.
    fn drain_updates(&self) -> bool {
        let mut updated = false;
        for rx in &self.updates {
            while rx.try_recv().is_ok() {
                updated = true;
            }
        }
        updated
    }

    fn screen(&self) -> Screen {
        let filter = self.state.filter();
        match self.state.active {
            View::Nodes => table_screen(self.providers.nodes.as_ref(), &filter),
            View::Jobs => table_screen(self.providers.jobs.as_ref(), &filter),
            View::Accounting => match &self.providers.sacct {
                Some(sacct) => table_screen(sacct.as_ref(), &filter),
                None => unavailable(),
            },
            View::AccountingManager => match &self.providers.sacctmgr {
                Some(sacctmgr) => {
                    let content = match sacctmgr.data_for(self.state.entity) {
                        Some(data) => {
                            let total = data.len();
                            Content::Table { data, total }
                        }
                        None => Content::Pending(format!("Loading {}...", self.state.entity)),
                    };
                    Screen {
                        content,
                        updated: sacctmgr.last_updated(),
                        error: sacctmgr.last_error(),
                        fetching: sacctmgr.state().is_fetching(),
                    }
                }
                None => unavailable(),
            },
            View::Diagnostics => {
                let sdiag = &self.providers.sdiag;
                Screen {
                    content: Content::Text(sdiag.data().text),
                    updated: sdiag.last_updated(),
                    error: sdiag.last_error(),
                    fetching: sdiag.state().is_fetching(),
                }
            }
        }
    }
}

fn table_screen<P>(provider: &P, filter: &FilterArgs) -> Screen
where
    P: DataProvider<Data = TableData>,
{
    let data = provider.filtered_data(filter);
    let total = provider.state().with_data(TableData::len);
    Screen {
        content: Content::Table { data, total },
        updated: provider.last_updated(),
        error: provider.last_error(),
        fetching: provider.state().is_fetching(),
    }
}

fn unavailable() -> Screen {
    Screen {
        content: Content::Pending("Accounting database is not available".to_string()),
        updated: None,
        error: None,
        fetching: false,
    }
}

//! Input handling and keybindings.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::provider::SacctMgrEntity;
use crate::scheduler::View;

use super::state::AppState;

/// Result of handling a key event.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// No action, continue.
    None,
    /// Quit the application.
    Quit,
    /// Activate another view, fetching it first when stale.
    SwitchView(View),
    /// Fetch the active view now.
    Refresh,
    /// Fetch the accounting manager listing of another entity.
    SelectEntity(SacctMgrEntity),
}

/// Handles key input and updates state.
pub fn handle_key(state: &mut AppState, key: KeyEvent) -> KeyAction {
    if key.kind == KeyEventKind::Release {
        return KeyAction::None;
    }
    if state.show_quit_confirm {
        return handle_quit_confirm(state, key);
    }
    state.status_message = None;

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => KeyAction::Quit,
        KeyCode::Char('r') if ctrl => KeyAction::Refresh,
        KeyCode::Char('q') | KeyCode::Char('Q') => {
            state.show_quit_confirm = true;
            KeyAction::None
        }

        KeyCode::Char(c @ '1'..='5') => match View::from_key(c) {
            Some(view) if view != state.active && state.switch_view(view) => {
                KeyAction::SwitchView(view)
            }
            _ => KeyAction::None,
        },

        // Filters
        KeyCode::Char('p') => {
            if matches!(state.active, View::Nodes | View::Jobs | View::Accounting) {
                state.cycle_partition();
            }
            KeyAction::None
        }
        KeyCode::Char('s') => {
            state.cycle_state();
            KeyAction::None
        }
        KeyCode::Char('e') if state.active == View::AccountingManager => {
            KeyAction::SelectEntity(state.cycle_entity())
        }

        // Scrolling
        KeyCode::Down | KeyCode::Char('j') => {
            state.scroll_down(1);
            KeyAction::None
        }
        KeyCode::Up | KeyCode::Char('k') => {
            state.scroll_up(1);
            KeyAction::None
        }
        KeyCode::PageDown => {
            state.scroll_down(state.page_size.max(1));
            KeyAction::None
        }
        KeyCode::PageUp => {
            state.scroll_up(state.page_size.max(1));
            KeyAction::None
        }
        KeyCode::Home | KeyCode::Char('g') => {
            state.scroll = 0;
            KeyAction::None
        }
        KeyCode::End | KeyCode::Char('G') => {
            state.scroll = usize::MAX;
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn handle_quit_confirm(state: &mut AppState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Char('y') => {
            state.show_quit_confirm = false;
            KeyAction::Quit
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            state.show_quit_confirm = false;
            KeyAction::Quit
        }
        _ => {
            state.show_quit_confirm = false;
            KeyAction::None
        }
    }
}

//! Main rendering logic for TUI.
//!
//! Rendering reads only what the app copied out of the providers for this
//! frame; it never triggers a fetch.

use chrono::{DateTime, Local, Utc};
use ratatui::Frame;
use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Row, Table};

use crate::provider::ProviderError;
use crate::scheduler::View;
use crate::storage::TableData;

use super::state::AppState;
use super::style::Styles;

/// What the active view shows in this frame.
#[derive(Debug, Clone)]
pub enum Content {
    /// Filtered rows plus the unfiltered row count.
    Table { data: TableData, total: usize },
    Text(String),
    /// Data not available yet, with the reason shown in place of it.
    Pending(String),
}

/// Copy of one provider's state taken right before drawing.
#[derive(Debug, Clone)]
pub struct Screen {
    pub content: Content,
    pub updated: Option<DateTime<Utc>>,
    pub error: Option<ProviderError>,
    pub fetching: bool,
}

/// Main render function.
pub fn render(frame: &mut Frame, state: &mut AppState, screen: &Screen) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Length(1), // Header
        Constraint::Length(1), // Filters
        Constraint::Min(3),    // Content
        Constraint::Length(1), // Status
    ])
    .split(area);

    render_header(frame, chunks[0], state);
    render_filters(frame, chunks[1], state);
    render_content(frame, chunks[2], state, &screen.content);
    render_status(frame, chunks[3], state, screen);

    if state.show_quit_confirm {
        render_quit_confirm(frame, area);
    }
}

fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
    let mut spans = vec![Span::styled(
        format!(" {} ", state.cluster.cluster_name),
        Styles::header(),
    )];
    for (idx, view) in View::ALL.iter().enumerate() {
        if !state.views.contains(view) {
            continue;
        }
        let style = if *view == state.active {
            Styles::tab_active()
        } else {
            Styles::tab_inactive()
        };
        spans.push(Span::styled(format!(" {}:{} ", idx + 1, view.title()), style));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_filters(frame: &mut Frame, area: Rect, state: &AppState) {
    let text = match state.active {
        View::Nodes | View::Jobs | View::Accounting => format!(
            " partition (p): {}   state (s): {}",
            state.selected_partition(),
            state.selected_state()
        ),
        View::AccountingManager => format!(" entity (e): {}", state.entity),
        View::Diagnostics => String::new(),
    };
    frame.render_widget(Paragraph::new(text).style(Styles::dim()), area);
}

fn render_content(frame: &mut Frame, area: Rect, state: &mut AppState, content: &Content) {
    let title = state.active.title();
    match content {
        Content::Table { data, total } => {
            // Borders and the header row.
            state.page_size = area.height.saturating_sub(3).max(1) as usize;
            state.clamp_scroll(data.len());
            let block = Block::default()
                .title(format!(" {} ({}/{}) ", title, data.len(), total))
                .borders(Borders::ALL);
            frame.render_widget(
                table_widget(data, state.scroll, state.page_size).block(block),
                area,
            );
        }
        Content::Text(text) => {
            state.page_size = area.height.saturating_sub(2).max(1) as usize;
            state.clamp_scroll(text.lines().count());
            let block = Block::default()
                .title(format!(" {} ", title))
                .borders(Borders::ALL);
            let scroll = u16::try_from(state.scroll).unwrap_or(u16::MAX);
            frame.render_widget(
                Paragraph::new(text.as_str())
                    .style(Styles::text())
                    .scroll((scroll, 0))
                    .block(block),
                area,
            );
        }
        Content::Pending(message) => {
            let block = Block::default()
                .title(format!(" {} ", title))
                .borders(Borders::ALL);
            frame.render_widget(
                Paragraph::new(message.as_str()).style(Styles::dim()).block(block),
                area,
            );
        }
    }
}

/// Table of the visible rows, columns sized by their tracked widths.
fn table_widget(data: &TableData, scroll: usize, page: usize) -> Table<'_> {
    let header = Row::new(
        data.headers
            .iter()
            .map(|c| Span::styled(c.display_name.as_str(), Styles::table_header())),
    )
    .style(Styles::table_header())
    .height(1);

    let rows: Vec<Row> = data
        .rows
        .iter()
        .skip(scroll)
        .take(page)
        .map(|r| Row::new(r.iter().map(String::as_str)).height(1))
        .collect();

    let widths: Vec<Constraint> = data
        .headers
        .iter()
        .map(|c| {
            let w = c.width.max(c.display_name.chars().count());
            Constraint::Length(u16::try_from(w).unwrap_or(u16::MAX))
        })
        .collect();

    Table::new(rows, widths).header(header).column_spacing(1)
}

fn render_status(frame: &mut Frame, area: Rect, state: &AppState, screen: &Screen) {
    let mut spans = Vec::new();
    match screen.updated {
        Some(at) => spans.push(Span::styled(
            format!(" data as of {}", at.with_timezone(&Local).format("%H:%M:%S")),
            Styles::text(),
        )),
        None => spans.push(Span::styled(" no data yet", Styles::dim())),
    }
    if screen.fetching {
        spans.push(Span::styled("  fetching...", Styles::fetching()));
    }
    if let Some(error) = &screen.error {
        spans.push(Span::styled(format!("  {}", error), Styles::error()));
    }
    if let Some(message) = &state.status_message {
        spans.push(Span::styled(format!("  {}", message), Styles::dim()));
    }
    spans.push(Span::styled("  q:quit ^R:refresh", Styles::dim()));
    spans.push(Span::styled(
        format!("  fetches:{} cmds:{}", state.fetches, state.commands),
        Styles::dim(),
    ));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_quit_confirm(frame: &mut Frame, area: Rect) {
    let [row] = Layout::vertical([Constraint::Length(3)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::horizontal([Constraint::Length(30)])
        .flex(Flex::Center)
        .areas(row);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(" Quit? (q/Enter to confirm)")
            .block(Block::default().borders(Borders::ALL)),
        popup,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ClusterInfo;
    use crate::storage::Column;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn draw(state: &mut AppState, screen: &Screen) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        terminal.draw(|frame| render(frame, state, screen)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn nodes() -> TableData {
        let mut name = Column::new("NodeName");
        name.width = 6;
        let mut state = Column::new("State");
        state.width = 5;
        TableData {
            headers: vec![name, state],
            rows: vec![
                vec!["linux1".into(), "MIXED".into()],
                vec!["linux2".into(), "IDLE".into()],
            ],
        }
    }

    #[test]
    fn test_table_title_shows_filtered_and_total() {
        let mut state = AppState::new(View::ALL.to_vec(), View::Nodes, ClusterInfo::default());
        let screen = Screen {
            content: Content::Table {
                data: nodes(),
                total: 4,
            },
            updated: None,
            error: Some(ProviderError::Execution("scontrol failed".into())),
            fetching: true,
        };
        let out = draw(&mut state, &screen);
        assert!(out.contains("Nodes (2/4)"));
        assert!(out.contains("NodeName"));
        assert!(out.contains("linux2"));
        assert!(out.contains("no data yet"));
        assert!(out.contains("scontrol failed"));
        assert_eq!(state.page_size, 6);
    }

    #[test]
    fn test_quit_popup_drawn() {
        let mut state =
            AppState::new(View::ALL.to_vec(), View::Diagnostics, ClusterInfo::default());
        state.show_quit_confirm = true;
        state.fetches = 3;
        state.commands = 7;
        let screen = Screen {
            content: Content::Text("Jobs submitted: 12".into()),
            updated: Some(Utc::now()),
            error: None,
            fetching: false,
        };
        let out = draw(&mut state, &screen);
        assert!(out.contains("Quit?"));
        assert!(out.contains("data as of"));
        assert!(out.contains("fetches:3 cmds:7"));
    }
}

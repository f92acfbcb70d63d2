//! Application state for the TUI.

use crate::collector::ClusterInfo;
use crate::config::{ALL_CATEGORIES, JOB_STATES, NODE_STATES};
use crate::provider::{FilterArgs, SacctMgrEntity};
use crate::scheduler::View;

/// UI state that survives between renders. Snapshots are not kept here;
/// every render reads fresh copies from the providers.
#[derive(Debug)]
pub struct AppState {
    /// Views with a provider, in key order.
    pub views: Vec<View>,
    pub active: View,
    pub cluster: ClusterInfo,
    /// Partition choices, `(all)` first.
    pub partitions: Vec<String>,
    pub partition_idx: usize,
    pub node_state_idx: usize,
    pub job_state_idx: usize,
    pub entity: SacctMgrEntity,
    /// First visible row of the active table.
    pub scroll: usize,
    /// Rows that fit the table area at the last render.
    pub page_size: usize,
    pub show_quit_confirm: bool,
    pub status_message: Option<String>,
    /// Process-wide successful fetches and executed commands.
    pub fetches: u64,
    pub commands: u64,
}

impl AppState {
    pub fn new(views: Vec<View>, active: View, cluster: ClusterInfo) -> Self {
        Self {
            views,
            active,
            cluster,
            partitions: vec![ALL_CATEGORIES.to_string()],
            partition_idx: 0,
            node_state_idx: 0,
            job_state_idx: 0,
            entity: SacctMgrEntity::default(),
            scroll: 0,
            page_size: 20,
            show_quit_confirm: false,
            status_message: None,
            fetches: 0,
            commands: 0,
        }
    }

    /// Preselects `partition` when it names one of the choices, adding it
    /// otherwise so a configured partition survives until partitions load.
    pub fn select_partition(&mut self, partition: &str) {
        if partition.is_empty() || partition == ALL_CATEGORIES {
            self.partition_idx = 0;
            return;
        }
        match self.partitions.iter().position(|p| p == partition) {
            Some(idx) => self.partition_idx = idx,
            None => {
                self.partitions.push(partition.to_string());
                self.partition_idx = self.partitions.len() - 1;
            }
        }
    }

    /// Replaces the partition choices, keeping the current selection by name.
    pub fn set_partitions(&mut self, names: Vec<String>) {
        let selected = self.selected_partition().to_string();
        self.partitions = std::iter::once(ALL_CATEGORIES.to_string())
            .chain(names.into_iter().filter(|n| n != ALL_CATEGORIES))
            .collect();
        self.partition_idx = 0;
        self.select_partition(&selected);
    }

    pub fn selected_partition(&self) -> &str {
        self.partitions
            .get(self.partition_idx)
            .map(String::as_str)
            .unwrap_or(ALL_CATEGORIES)
    }

    pub fn cycle_partition(&mut self) {
        self.partition_idx = (self.partition_idx + 1) % self.partitions.len().max(1);
        self.scroll = 0;
    }

    /// State choices of the active view; empty when it has no state filter.
    pub fn state_choices(&self) -> &'static [&'static str] {
        match self.active {
            View::Nodes => NODE_STATES,
            View::Jobs | View::Accounting => JOB_STATES,
            View::AccountingManager | View::Diagnostics => &[],
        }
    }

    fn state_idx_mut(&mut self) -> Option<&mut usize> {
        match self.active {
            View::Nodes => Some(&mut self.node_state_idx),
            View::Jobs | View::Accounting => Some(&mut self.job_state_idx),
            View::AccountingManager | View::Diagnostics => None,
        }
    }

    pub fn selected_state(&self) -> &'static str {
        let idx = match self.active {
            View::Nodes => self.node_state_idx,
            View::Jobs | View::Accounting => self.job_state_idx,
            View::AccountingManager | View::Diagnostics => 0,
        };
        self.state_choices().get(idx).copied().unwrap_or(ALL_CATEGORIES)
    }

    /// Preselects the node and job state filters. Names outside the choices
    /// select `(all)`.
    pub fn select_states(&mut self, node_state: &str, job_state: &str) {
        let position = |choices: &[&str], name: &str| {
            choices.iter().position(|c| *c == name.trim()).unwrap_or(0)
        };
        self.node_state_idx = position(NODE_STATES, node_state);
        self.job_state_idx = position(JOB_STATES, job_state);
    }

    pub fn cycle_state(&mut self) {
        let len = self.state_choices().len();
        if let Some(idx) = self.state_idx_mut() {
            *idx = (*idx + 1) % len.max(1);
        }
        self.scroll = 0;
    }

    /// Advances to the next accounting manager entity.
    pub fn cycle_entity(&mut self) -> SacctMgrEntity {
        let all = SacctMgrEntity::ALL;
        let idx = all.iter().position(|e| *e == self.entity).unwrap_or(0);
        self.entity = all[(idx + 1) % all.len()];
        self.scroll = 0;
        self.entity
    }

    /// Filter for the active view's provider.
    pub fn filter(&self) -> FilterArgs {
        FilterArgs::new(self.selected_partition(), self.selected_state())
    }

    /// Makes `view` active. Returns false when it has no provider.
    pub fn switch_view(&mut self, view: View) -> bool {
        if !self.views.contains(&view) {
            self.status_message = Some(format!("{} is not available", view));
            return false;
        }
        if self.active != view {
            self.active = view;
            self.scroll = 0;
        }
        true
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll = self.scroll.saturating_add(rows);
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll = self.scroll.saturating_sub(rows);
    }

    /// Keeps the scroll offset within a table of `total` rows.
    pub fn clamp_scroll(&mut self, total: usize) {
        let last_page = total.saturating_sub(self.page_size.max(1));
        self.scroll = self.scroll.min(last_page);
    }
}

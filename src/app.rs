//! Application state and navigation logic.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use pulse_types::{Metric, MetricSnapshot};
use tokio::sync::watch;

use crate::controller::{Controller, DashboardView};
use crate::ui::Theme;

/// How long a status message stays visible.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// The metric panel that has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Panel {
    /// Metrics from the `users` collection.
    #[default]
    Users,
    /// Metrics from the `improvementData` collection.
    Improvement,
}

impl Panel {
    /// Switch to the other panel.
    pub fn toggle(self) -> Self {
        match self {
            Panel::Users => Panel::Improvement,
            Panel::Improvement => Panel::Users,
        }
    }

    /// Returns the panel title.
    pub fn label(&self) -> &'static str {
        match self {
            Panel::Users => "User metrics",
            Panel::Improvement => "Improvement data",
        }
    }

    /// The metrics this panel shows from a snapshot.
    pub fn metrics<'a>(&self, snapshot: &'a MetricSnapshot) -> &'a [Metric] {
        match self {
            Panel::Users => &snapshot.users,
            Panel::Improvement => &snapshot.improvement_data,
        }
    }
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,
    pub show_detail: bool,

    controller: Controller,
    view_rx: watch::Receiver<DashboardView>,
    /// Latest view published by the controller.
    pub view: DashboardView,
    /// When the current snapshot arrived.
    pub last_update: Option<Instant>,

    // Navigation state
    pub panel: Panel,
    pub selected_user: usize,
    pub selected_improvement: usize,

    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create an App around a mounted controller.
    pub fn new(controller: Controller) -> Self {
        let mut view_rx = controller.subscribe();
        let view = view_rx.borrow_and_update().clone();
        let last_update = view.last_snapshot.as_ref().map(|_| Instant::now());
        Self {
            running: true,
            show_help: false,
            show_detail: false,
            controller,
            view_rx,
            view,
            last_update,
            panel: Panel::default(),
            selected_user: 0,
            selected_improvement: 0,
            theme: Theme::auto_detect(),
            status_message: None,
        }
    }

    /// Returns a description of the dashboard channel.
    pub fn source_description(&self) -> String {
        self.controller
            .channel_description()
            .unwrap_or_else(|| "no channel".to_string())
    }

    /// Pull the latest view from the controller.
    ///
    /// Returns true if anything changed since the last call.
    pub fn refresh(&mut self) -> bool {
        if !self.view_rx.has_changed().unwrap_or(false) {
            return false;
        }
        let view = self.view_rx.borrow_and_update().clone();
        if view.last_snapshot != self.view.last_snapshot {
            self.last_update = Some(Instant::now());
        }
        self.view = view;
        self.clamp_selection();
        true
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < STATUS_MESSAGE_TTL {
                return Some(msg);
            }
        }
        None
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Stop the main loop and tear the connection down.
    pub fn quit(&mut self) {
        self.controller.unmount();
        self.running = false;
    }

    /// Ask the controller for a new connection.
    pub fn reconnect(&mut self) {
        if self.view.is_connected() || self.view.is_connecting() {
            self.set_status_message(format!("Already {}", self.view.connection_state.label().to_lowercase()));
            return;
        }
        self.controller.reconnect();
        self.set_status_message("Reconnecting...".to_string());
    }

    /// Close the live session.
    pub fn disconnect(&mut self) {
        self.controller.disconnect();
        self.set_status_message("Disconnected".to_string());
    }

    pub fn switch_panel(&mut self) {
        self.panel = self.panel.toggle();
    }

    /// Metrics in the focused panel.
    pub fn panel_metrics(&self) -> &[Metric] {
        match &self.view.last_snapshot {
            Some(snapshot) => self.panel.metrics(snapshot),
            None => &[],
        }
    }

    /// Selected row in a panel.
    pub fn selected_index(&self, panel: Panel) -> usize {
        match panel {
            Panel::Users => self.selected_user,
            Panel::Improvement => self.selected_improvement,
        }
    }

    fn selected_mut(&mut self) -> &mut usize {
        match self.panel {
            Panel::Users => &mut self.selected_user,
            Panel::Improvement => &mut self.selected_improvement,
        }
    }

    /// The metric under the cursor in the focused panel.
    pub fn selected_metric(&self) -> Option<&Metric> {
        self.panel_metrics().get(self.selected_index(self.panel))
    }

    /// Move selection down by one item.
    pub fn select_next(&mut self) {
        let max = self.panel_metrics().len().saturating_sub(1);
        let selected = self.selected_mut();
        *selected = (*selected + 1).min(max);
    }

    /// Move selection up by one item.
    pub fn select_prev(&mut self) {
        let selected = self.selected_mut();
        *selected = selected.saturating_sub(1);
    }

    /// Jump to the first item in the list.
    pub fn select_first(&mut self) {
        *self.selected_mut() = 0;
    }

    /// Jump to the last item in the list.
    pub fn select_last(&mut self) {
        let last = self.panel_metrics().len().saturating_sub(1);
        *self.selected_mut() = last;
    }

    /// Open the detail overlay for the selected metric.
    pub fn open_detail(&mut self) {
        if self.selected_metric().is_some() {
            self.show_detail = true;
        }
    }

    pub fn close_detail(&mut self) {
        self.show_detail = false;
    }

    /// Keep selections inside the current snapshot after a replacement.
    fn clamp_selection(&mut self) {
        let (users, improvement) = match &self.view.last_snapshot {
            Some(s) => (s.users.len(), s.improvement_data.len()),
            None => (0, 0),
        };
        self.selected_user = self.selected_user.min(users.saturating_sub(1));
        self.selected_improvement = self.selected_improvement.min(improvement.saturating_sub(1));
        if self.selected_metric().is_none() {
            self.show_detail = false;
        }
    }

    /// Write the current snapshot to a JSON file.
    pub fn export_snapshot(&self, path: &Path) -> Result<()> {
        let snapshot = self
            .view
            .last_snapshot
            .as_ref()
            .context("No dashboard data received yet")?;
        write_snapshot(snapshot, path)
    }
}

/// Write a snapshot as pretty JSON in its wire shape.
pub fn write_snapshot(snapshot: &MetricSnapshot, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::controller::{ConnectionState, ErrorKind};

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    /// Badge color while connected.
    pub connected: Color,
    /// Badge color while a connection is in progress.
    pub connecting: Color,
    /// Badge color while disconnected.
    pub disconnected: Color,
    /// Badge and banner color for errors.
    pub error: Color,
    /// Banner color for non-fatal server errors.
    pub warning: Color,
    /// Color for borders and separators.
    pub border: Color,
    /// Style for header rows in tables.
    pub header: Style,
    /// Style for selected/highlighted rows.
    pub selected: Style,
    /// Border style of the focused panel.
    pub panel_active: Style,
    /// Border style of the other panel.
    pub panel_inactive: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            connected: Color::Green,
            connecting: Color::Yellow,
            disconnected: Color::Gray,
            error: Color::Red,
            warning: Color::Yellow,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD),
            panel_active: Style::default().fg(Color::Cyan),
            panel_inactive: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            connected: Color::Green,
            connecting: Color::Yellow,
            disconnected: Color::DarkGray,
            error: Color::Red,
            warning: Color::Magenta,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::LightBlue).add_modifier(Modifier::BOLD),
            panel_active: Style::default().fg(Color::Blue),
            panel_inactive: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Style for the connection badge.
    pub fn state_style(&self, state: ConnectionState) -> Style {
        match state {
            ConnectionState::Connected => Style::default().fg(self.connected),
            ConnectionState::Connecting => Style::default().fg(self.connecting),
            ConnectionState::Disconnected => Style::default().fg(self.disconnected),
            ConnectionState::Errored => Style::default().fg(self.error).add_modifier(Modifier::BOLD),
        }
    }

    /// Style for the error banner.
    pub fn error_style(&self, kind: ErrorKind) -> Style {
        match kind {
            ErrorKind::Application => Style::default().fg(self.warning),
            _ => Style::default().fg(self.error).add_modifier(Modifier::BOLD),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

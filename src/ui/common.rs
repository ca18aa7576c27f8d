//! Common UI components.
//!
//! This module contains the header bar, error banner, status bar, and help overlay.

use std::time::Duration;

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::App;

/// Render the header bar with the connection badge.
///
/// Displays: state indicator, metric counts, time since last update.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let state = app.view.connection_state;
    let badge_style = app.theme.state_style(state);

    let mut spans = vec![
        Span::styled(" ● ", badge_style),
        Span::styled("KAIZENPRO ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(state.label(), badge_style),
    ];

    match &app.view.last_snapshot {
        Some(snapshot) => {
            spans.push(Span::raw(" │ "));
            spans.push(Span::styled(
                snapshot.users.len().to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(" user │ "));
            spans.push(Span::styled(
                snapshot.improvement_data.len().to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(" improvement"));
        }
        None => spans.push(Span::raw(" │ Waiting for data...")),
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Lines the error banner needs, zero when there is no error.
pub fn error_banner_height(app: &App) -> u16 {
    if app.view.last_error.is_some() {
        3
    } else {
        0
    }
}

/// Render the error banner shown whenever the view carries an error.
pub fn render_error_banner(frame: &mut Frame, app: &App, area: Rect) {
    let Some(error) = &app.view.last_error else {
        return;
    };

    let style = app.theme.error_style(error.kind);
    let hint = if app.view.has_error() {
        " (r to reconnect)"
    } else {
        ""
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(style);
    let paragraph = Paragraph::new(Line::from(vec![
        Span::styled(error.message.as_str(), style),
        Span::styled(hint, Style::default().add_modifier(Modifier::DIM)),
    ]))
    .wrap(Wrap { trim: true })
    .block(block);

    frame.render_widget(paragraph, area);
}

/// Format an elapsed time for the status bar.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Render the status bar at the bottom.
///
/// Shows: channel description, time since last update, available controls.
/// Temporary status messages take precedence.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let updated = match app.last_update {
        Some(at) => format!("Updated {} ago", format_elapsed(at.elapsed())),
        None => "No data yet".to_string(),
    };

    let controls = if app.view.is_connected() || app.view.is_connecting() {
        "Tab:panel ↑↓:select Enter:detail d:disconnect e:export ?:help q:quit"
    } else {
        "r:reconnect Tab:panel ↑↓:select e:export ?:help q:quit"
    };

    let status = format!(
        " {} | {} | {}",
        app.source_description(),
        updated,
        controls
    );

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Center a box of the given size inside `area`, shrinking it to fit.
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let section = |title: &'static str| {
        Line::from(vec![Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        )])
    };

    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        section(" Navigation"),
        Line::from("  Tab ←/→     Switch panel"),
        Line::from("  ↑/↓ j/k     Navigate metrics"),
        Line::from("  Home/End    Jump to first/last"),
        Line::from("  Enter       Metric detail"),
        Line::from("  Esc         Close overlay"),
        Line::from(""),
        section(" Connection"),
        Line::from("  r           Reconnect"),
        Line::from("  d           Disconnect"),
        Line::from(""),
        section(" General"),
        Line::from("  e           Export snapshot to JSON"),
        Line::from("  q           Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let help_area = centered(area, 42, 20);
    frame.render_widget(Clear, help_area);
    frame.render_widget(Paragraph::new(help_text).block(block), help_area);
}

//! Metric panels.
//!
//! Two side-by-side tables, one per snapshot collection, plus a detail
//! overlay for the selected metric.

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::{App, Panel};
use crate::ui::common::centered;

/// Render both metric panels.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let columns =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).split(area);

    render_panel(frame, app, Panel::Users, columns[0]);
    render_panel(frame, app, Panel::Improvement, columns[1]);
}

fn render_panel(frame: &mut Frame, app: &App, panel: Panel, area: Rect) {
    let focused = app.panel == panel;
    let border_style = if focused {
        app.theme.panel_active
    } else {
        app.theme.panel_inactive
    };

    let block = Block::default()
        .title(format!(" {} ", panel.label()))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(border_style);

    let Some(snapshot) = &app.view.last_snapshot else {
        let waiting = if app.view.is_connecting() {
            "Waiting for dashboard data..."
        } else {
            "No data"
        };
        render_empty(frame, block, waiting, area);
        return;
    };

    let metrics = panel.metrics(snapshot);
    if metrics.is_empty() {
        render_empty(frame, block, "No data available", area);
        return;
    }

    let header = Row::new(vec![Cell::from("Metric"), Cell::from("Value")])
        .style(app.theme.header)
        .height(1);

    let rows: Vec<Row> = metrics
        .iter()
        .map(|m| {
            Row::new(vec![
                Cell::from(m.label.as_str()),
                Cell::from(Span::styled(
                    m.value.as_str(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
            ])
        })
        .collect();

    let widths = [Constraint::Min(16), Constraint::Length(12)];
    let highlight = if focused {
        app.theme.selected
    } else {
        Style::default()
    };
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(highlight)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    state.select(Some(app.selected_index(panel)));
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_empty(frame: &mut Frame, block: Block, text: &str, area: Rect) {
    let paragraph = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().add_modifier(Modifier::DIM),
    )))
    .alignment(Alignment::Center)
    .block(block);
    frame.render_widget(paragraph, area);
}

/// Render the detail overlay for the selected metric.
pub fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
    let Some(metric) = app.selected_metric() else {
        return;
    };

    let numeric = metric
        .value
        .trim()
        .parse::<f64>()
        .map(|v| format!("{}", v))
        .unwrap_or_else(|_| "not numeric".to_string());

    let total: usize = app.panel_metrics().len();
    let position = app.selected_index(app.panel) + 1;

    let lines = vec![
        Line::from(Span::styled(metric.label.as_str(), app.theme.header)),
        Line::from(""),
        Line::from(vec![
            Span::raw("  Value      "),
            Span::styled(
                metric.value.as_str(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(format!("  Numeric    {}", numeric)),
        Line::from(format!("  Panel      {}", app.panel.label())),
        Line::from(format!("  Position   {} of {}", position, total)),
        Line::from(""),
        Line::from(Span::styled(
            "Esc to close",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];

    let block = Block::default()
        .title(" Metric ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let detail_area = centered(area, 48, 11);
    frame.render_widget(Clear, detail_area);
    frame.render_widget(Paragraph::new(lines).block(block), detail_area);
}

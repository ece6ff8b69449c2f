use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row as TableRow, Table, Wrap};
use std::time::Duration;

use crate::app::Dashboard;
use crate::error::summarize_error_line;
use crate::tree::Row;

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const SELECTED: Color = Color::Rgb(24, 36, 58);

const HEADER_ROWS: u16 = 4;
const FOOTER_ROWS: u16 = 4;
const COLUMNS: [&str; 5] = ["NAME", "READY", "STATUS", "RESTARTS", "AGE"];

pub fn tree_rows_for_height(height: u16) -> usize {
    height.saturating_sub(HEADER_ROWS + FOOTER_ROWS).max(1) as usize
}

pub fn render(frame: &mut Frame, dashboard: &mut Dashboard, status: &str) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_ROWS),
            Constraint::Min(1),
            Constraint::Length(FOOTER_ROWS),
        ])
        .split(frame.area());

    dashboard.resize(root[1].height.max(1) as usize);

    render_header(frame, root[0], dashboard);
    render_tree(frame, root[1], dashboard);
    render_footer(frame, root[2], dashboard, status);

    if dashboard.show_help() {
        render_help_modal(frame);
    }
}

fn render_header(frame: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let refreshed = dashboard
        .last_refresh()
        .map(|time| time.to_rfc2822())
        .unwrap_or_else(|| "waiting for first refresh".to_string());
    let elapsed_style = match dashboard.last_elapsed() {
        Some(elapsed) if elapsed > Duration::from_secs(1) => Style::default().fg(WARN),
        _ => Style::default().fg(MUTED),
    };
    let elapsed = dashboard
        .last_elapsed()
        .map(format_elapsed)
        .unwrap_or_else(|| "-".to_string());

    let lines = vec![
        Line::from(vec![
            Span::styled(refreshed, Style::default().fg(Color::White)),
            Span::raw("  "),
            Span::styled(format!("Time to execute: {elapsed}"), elapsed_style),
        ]),
        Line::from(vec![
            Span::styled("Group: ", Style::default().fg(MUTED)),
            Span::styled(
                dashboard.group().name.clone(),
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(Span::styled(
            dashboard.summary(),
            Style::default().fg(MUTED),
        )),
    ];
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(1)])
        .split(area);
    frame.render_widget(
        Paragraph::new(lines).style(Style::default().bg(BG)),
        chunks[0],
    );

    let header = TableRow::new(COLUMNS.iter().map(|title| {
        Cell::from(*title).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().fg(ACCENT));
    frame.render_widget(
        Table::new([header], column_constraints()).column_spacing(1),
        chunks[1],
    );
}

fn render_tree(frame: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let tree = dashboard.tree();
    let cursor = tree.cursor();
    let rows = tree.visible_rows().into_iter().map(|(position, row)| {
        let style = if Some(position) == cursor {
            Style::default().bg(SELECTED).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        tree_row(&row).style(style)
    });

    let table = Table::new(rows, column_constraints())
        .column_spacing(1)
        .style(Style::default().bg(PANEL).fg(Color::White));
    frame.render_widget(table, area);
}

fn tree_row(row: &Row<'_>) -> TableRow<'static> {
    let [name, ready, status, restarts, age] = row_cells(row);
    let mut name_spans = vec![Span::raw(name)];
    if let Row::Namespace(namespace) = row {
        match namespace.error.as_deref() {
            Some(error) => name_spans.push(Span::styled(
                format!("  {}", summarize_error_line(error)),
                Style::default().fg(ERROR),
            )),
            None if namespace.groups.is_empty() => {
                name_spans.push(Span::styled("  No pods", Style::default().fg(MUTED)))
            }
            None => {}
        }
    }

    let name_style = match row {
        Row::Namespace(_) => Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        Row::PodGroup { .. } => Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        Row::Pod { .. } => Style::default().fg(Color::White),
        Row::Container { .. } => Style::default().fg(MUTED),
    };

    TableRow::new(vec![
        Cell::from(Line::from(name_spans)).style(name_style),
        Cell::from(ready),
        Cell::from(status.clone()).style(Style::default().fg(status_color(&status))),
        Cell::from(restarts),
        Cell::from(age),
    ])
}

/// NAME, READY, STATUS, RESTARTS and AGE text for one tree row.
pub fn row_cells(row: &Row<'_>) -> [String; 5] {
    let indent = "  ".repeat(row.depth());
    let marker = match row.expanded() {
        Some(true) => "▾ ",
        Some(false) => "▸ ",
        None => "  ",
    };

    match row {
        Row::Namespace(namespace) => [
            format!("{marker}{}/{}", namespace.context, namespace.name),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        ],
        Row::PodGroup { group, .. } => [
            format!("{indent}{marker}{}", group.name),
            format!("{}/{}", group.ready_pods(), group.pods.len()),
            String::new(),
            group.restarts().to_string(),
            String::new(),
        ],
        Row::Pod { pod, .. } => [
            format!("{indent}{marker}{}", pod.name),
            format!("{}/{}", pod.ready, pod.total),
            pod.status.clone(),
            pod.restarts.to_string(),
            pod.age.clone(),
        ],
        Row::Container { container, .. } => [
            format!("{indent}{marker}{}", container.name),
            if container.ready { "1/1" } else { "0/1" }.to_string(),
            container.status.clone(),
            container.restarts.to_string(),
            String::new(),
        ],
    }
}

pub fn status_color(status: &str) -> Color {
    match status {
        "" | "Running" | "Succeeded" | "Completed" => Color::White,
        "Pending" | "ContainerCreating" | "PodInitializing" | "Waiting" | "Terminating" => WARN,
        _ => ERROR,
    }
}

fn render_footer(frame: &mut Frame, area: Rect, dashboard: &Dashboard, status: &str) {
    let [first, second] = dashboard.footer_lines();
    let status_style = if status.starts_with("Error:") {
        Style::default().fg(ERROR)
    } else {
        Style::default().fg(ACCENT)
    };

    let lines = vec![
        Line::from(Span::styled(
            "─".repeat(area.width as usize),
            Style::default().fg(MUTED),
        )),
        Line::from(Span::styled(first, Style::default().fg(Color::White))),
        Line::from(Span::styled(second, Style::default().fg(Color::White))),
        Line::from(vec![
            Span::styled(status.to_string(), status_style),
            Span::styled(
                if status.is_empty() { "? help  q quit" } else { "" },
                Style::default().fg(MUTED),
            ),
        ]),
    ];
    frame.render_widget(
        Paragraph::new(lines).style(Style::default().bg(BG)),
        area,
    );
}

fn render_help_modal(frame: &mut Frame) {
    let area = centered_rect(64, 70, frame.area());
    frame.render_widget(Clear, area);

    let lines = help_lines()
        .into_iter()
        .map(Line::from)
        .collect::<Vec<_>>();
    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));

    frame.render_widget(modal, area);
}

fn help_lines() -> Vec<&'static str> {
    vec![
        "Up/k  Down/j      move selection",
        "PgUp  PgDn        move one page",
        "Home  End         first / last row",
        "Left  Right       collapse / expand",
        "Enter             toggle",
        "c  e              collapse all / expand all",
        "Ctrl+E            exec into selected pods",
        "Ctrl+L            open logs of selected pods",
        "Ctrl+K            follow logs of selected pods",
        "other keys        copy shortcut shown in footer",
        "?                 toggle this help",
        "Esc               close help, else quit",
        "q  Ctrl+C         quit",
    ]
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed >= Duration::from_secs(1) {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

fn column_constraints() -> [Constraint; 5] {
    [
        Constraint::Min(24),
        Constraint::Length(7),
        Constraint::Length(20),
        Constraint::Length(9),
        Constraint::Length(6),
    ]
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

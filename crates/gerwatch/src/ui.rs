use crate::state::App;
use crate::theme;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

const COLUMNS: [&str; 8] = [
    "Username",
    "Topic",
    "Url",
    "Project",
    "Subject",
    "Created On",
    "Status",
    "Comment",
];

const WIDTHS: [Constraint; 8] = [
    Constraint::Length(10),
    Constraint::Percentage(8),
    Constraint::Percentage(24),
    Constraint::Percentage(12),
    Constraint::Percentage(24),
    Constraint::Percentage(12),
    Constraint::Length(9),
    Constraint::Percentage(17),
];

pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.size();
    let block = Block::default().borders(Borders::ALL).style(theme::BODY_STYLE);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);
    render_table(frame, app, layout[0]);
    render_footer(frame, app, layout[1]);
}

fn render_table(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(COLUMNS.iter().map(|name| Cell::from(*name))).style(theme::HEADER_STYLE);
    let rows = app.rows.iter().map(|row| {
        let status_cell = match row.status {
            Some(status) => Cell::from(status.label()).style(theme::status_style(status)),
            None => Cell::from(""),
        };
        Row::new(vec![
            Cell::from(row.username.as_str()),
            Cell::from(row.topic.as_str()),
            Cell::from(row.url.as_str()),
            Cell::from(row.project.as_str()),
            Cell::from(row.subject.as_str()),
            Cell::from(row.created_on.as_str()),
            status_cell,
            Cell::from(row.comment.as_str()),
        ])
    });

    let table = Table::new(rows, WIDTHS)
        .header(header)
        .column_spacing(1)
        .style(theme::BODY_STYLE);
    frame.render_widget(table, area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);
    frame.render_widget(
        Paragraph::new("Waiting for events...").style(theme::BODY_STYLE),
        halves[0],
    );
    frame.render_widget(
        Paragraph::new(app.summary.as_str())
            .style(theme::SUMMARY_STYLE)
            .alignment(Alignment::Right),
        halves[1],
    );
}

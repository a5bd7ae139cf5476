use crate::app::App;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let records = app.visible_favorites();
    let resource_name = app
        .current_resource()
        .map(|r| r.display_name.as_str())
        .unwrap_or(&app.resource_key);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(Span::styled(
            format!(" ★ {} favorites[{}] ", resource_name, records.len()),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(1)])
        .split(inner);

    let help = Line::from(vec![
        Span::styled(" Enter", Style::default().fg(Color::Yellow)),
        Span::styled(": show in list  ", Style::default().fg(Color::DarkGray)),
        Span::styled("x", Style::default().fg(Color::Yellow)),
        Span::styled(": remove  ", Style::default().fg(Color::DarkGray)),
        Span::styled("Esc", Style::default().fg(Color::Yellow)),
        Span::styled(": back", Style::default().fg(Color::DarkGray)),
    ]);
    f.render_widget(Paragraph::new(help), chunks[0]);

    if records.is_empty() {
        f.render_widget(
            Paragraph::new(Span::styled(
                "No favorites yet. Press f on a row to star it.",
                Style::default().fg(Color::DarkGray),
            ))
            .alignment(Alignment::Center),
            chunks[1],
        );
        return;
    }

    let header_cells = [" NAME", "ALIAS", "ADDED"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells).height(1);

    let rows = records.iter().map(|record| {
        Row::new(vec![
            Cell::from(format!(" ★ {}", record.natural_key)),
            Cell::from(record.alias.clone().unwrap_or_else(|| "-".to_string())),
            Cell::from(record.added_label()).style(Style::default().fg(Color::DarkGray)),
        ])
    });

    let widths = [
        Constraint::Percentage(55),
        Constraint::Percentage(25),
        Constraint::Percentage(20),
    ];

    let table = Table::new(rows, widths).header(header).row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = TableState::default();
    state.select(Some(app.favorites_selected));

    f.render_stateful_widget(table, chunks[1], &mut state);
}

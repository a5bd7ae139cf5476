use crate::app::App;
use crate::resource::registry::{extract_json_value, get_color_for_value};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

const STAR: &str = "★";

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let Some(resource) = app.current_resource() else {
        return;
    };
    let store = app.current_store();
    let total = store.map(|s| s.len()).unwrap_or(0);

    let mut title = format!(" {}[{}] ", resource.display_name, app.filtered_items.len());
    if app.filter.is_active() {
        title = format!(" {}[{}/{}] ", resource.display_name, app.filtered_items.len(), total);
    }
    if app.filter.favorites_only {
        title.push_str(&format!("{} ", STAR));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    f.render_widget(block, area);

    // Failed refresh: keep the last rows and say why inline
    let error = store.and_then(|s| s.last_error());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(if error.is_some() { 1 } else { 0 }),
            Constraint::Min(1),
        ])
        .split(inner);

    if let Some(err) = error {
        let first_line = err.lines().next().unwrap_or(err);
        f.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(" ✗ ", Style::default().fg(Color::Red)),
                Span::styled(first_line.to_string(), Style::default().fg(Color::Red)),
            ])),
            chunks[0],
        );
    }

    if app.filtered_items.is_empty() {
        let text = match store {
            Some(s) if s.is_loading() && !s.is_loaded() => "Loading…",
            Some(s) if !s.is_empty() && app.filter.is_active() => "No items match the filter",
            _ => "No items",
        };
        f.render_widget(
            Paragraph::new(Span::styled(text, Style::default().fg(Color::DarkGray)))
                .alignment(Alignment::Center),
            chunks[1],
        );
        return;
    }

    let has_favorites = resource.favorites.is_some();

    let header_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let mut header_cells: Vec<Cell> = Vec::new();
    if has_favorites {
        header_cells.push(Cell::from(" "));
    }
    header_cells.extend(
        resource
            .columns
            .iter()
            .map(|c| Cell::from(c.header.clone()).style(header_style)),
    );
    let header = Row::new(header_cells).height(1);

    let rows = app.filtered_items.iter().map(|item| {
        let mut cells: Vec<Cell> = Vec::new();
        if has_favorites {
            let star = if app.is_favorite_item(item) { STAR } else { " " };
            cells.push(Cell::from(star).style(Style::default().fg(Color::Yellow)));
        }
        cells.extend(resource.columns.iter().map(|col| {
            let text = extract_json_value(item, &col.json_path);
            let style = col
                .color_map
                .as_deref()
                .and_then(|map| get_color_for_value(map, &text))
                .map(|[r, g, b]| Style::default().fg(Color::Rgb(r, g, b)))
                .unwrap_or_default();
            Cell::from(text).style(style)
        }));
        Row::new(cells)
    });

    let mut widths: Vec<Constraint> = Vec::new();
    if has_favorites {
        widths.push(Constraint::Length(2));
    }
    widths.extend(resource.columns.iter().map(|c| Constraint::Length(c.width)));

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .row_highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = TableState::default();
    state.select(Some(app.selected));

    f.render_stateful_widget(table, chunks[1], &mut state);
}

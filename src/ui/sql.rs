use crate::app::{App, SqlFocus};
use crate::sql_tabs::{QueryResult, TabOutput, CONNECTION_FIELDS};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(10),
            Constraint::Min(3),
        ])
        .split(area);

    render_tab_bar(f, app, rows[0]);

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[1]);

    render_editor(f, app, top[0]);
    if app.sql_focus == SqlFocus::Tables {
        render_tables(f, app, top[1]);
    } else {
        render_connection(f, app, top[1]);
    }
    render_output(f, app, rows[2]);
}

fn focus_color(focused: bool) -> Color {
    if focused {
        Color::Cyan
    } else {
        Color::DarkGray
    }
}

fn render_tab_bar(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in app.sql.tabs().iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));
        }
        if i == app.sql.active_index() {
            spans.push(Span::styled(
                format!(" ▸ {} ", tab.name),
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::styled(
                format!("   {} ", tab.name),
                Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
            ));
        }
    }

    let block = Block::default()
        .borders(Borders::TOP | Borders::BOTTOM)
        .border_style(Style::default().fg(Color::DarkGray));
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_editor(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.sql_focus == SqlFocus::Editor;
    let mut text = app.sql.active().sql.clone();
    if focused {
        text.push('█');
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(focus_color(focused)))
        .title(" SQL (ctrl-r run, ctrl-s save) ");
    f.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_connection(f: &mut Frame, app: &App, area: Rect) {
    let focused_field = match app.sql_focus {
        SqlFocus::Connection(i) => Some(i),
        _ => None,
    };

    let mut lines: Vec<Line> = CONNECTION_FIELDS
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let value = match i {
                5 => "•".repeat(app.connection.password.chars().count()),
                _ => app.connection.field(i).to_string(),
            };
            let style = if focused_field == Some(i) {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(vec![
                Span::styled(format!(" {:<10}", name), style),
                Span::styled(value, Style::default().fg(Color::White)),
            ])
        })
        .collect();

    if let Some(id) = app.connection.tunnel_id {
        lines.push(Line::from(Span::styled(
            format!(" via saved tunnel #{}", id),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(focus_color(focused_field.is_some())))
        .title(" Connection (Tab to edit) ");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_tables(f: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .sql_tables
        .iter()
        .enumerate()
        .map(|(i, table)| {
            let style = if i == app.sql_table_selected {
                Style::default()
                    .bg(Color::DarkGray)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(Span::styled(format!(" {}", table), style))
        })
        .collect();

    let skip = app
        .sql_table_selected
        .saturating_sub(area.height.saturating_sub(3) as usize);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Tables[{}] (Enter: SELECT) ", app.sql_tables.len()));
    f.render_widget(
        Paragraph::new(lines).block(block).scroll((skip as u16, 0)),
        area,
    );
}

fn render_output(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Results ");

    match &app.sql.active().output {
        TabOutput::Empty => f.render_widget(
            Paragraph::new(Span::styled(
                "Run a query to see results",
                Style::default().fg(Color::DarkGray),
            ))
            .alignment(Alignment::Center)
            .block(block),
            area,
        ),
        TabOutput::Running => f.render_widget(
            Paragraph::new(Span::styled("Running…", Style::default().fg(Color::Yellow)))
                .alignment(Alignment::Center)
                .block(block),
            area,
        ),
        TabOutput::Failed(err) => f.render_widget(
            Paragraph::new(Span::styled(err.clone(), Style::default().fg(Color::Red)))
                .wrap(Wrap { trim: false })
                .block(block),
            area,
        ),
        TabOutput::Rows(result) => render_rows(f, result, block, area),
    }
}

fn render_rows(f: &mut Frame, result: &QueryResult, block: Block, area: Rect) {
    let block = block.title_bottom(Line::from(Span::styled(
        format!(" {} ", result.summary()),
        Style::default().fg(Color::Green),
    )));

    if result.columns.is_empty() {
        f.render_widget(
            Paragraph::new(result.summary())
                .alignment(Alignment::Center)
                .block(block),
            area,
        );
        return;
    }

    let header = Row::new(result.columns.iter().map(|c| {
        Cell::from(c.clone()).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = (0..result.rows.len()).map(|r| {
        Row::new((0..result.columns.len()).map(|c| {
            let text = result.cell(r, c);
            let style = if text == "NULL" {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            Cell::from(text).style(style)
        }))
    });

    let width = (100 / result.columns.len().max(1)) as u16;
    let widths: Vec<Constraint> = result
        .columns
        .iter()
        .map(|_| Constraint::Percentage(width))
        .collect();

    f.render_widget(Table::new(rows, widths).header(header).block(block), area);
}

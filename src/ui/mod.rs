mod describe;
mod dialog;
mod favorites;
mod form;
mod header;
mod help;
mod notifications;
mod sql;
mod table;

use crate::app::{ActiveForm, App, Mode};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

pub fn render(f: &mut Frame, app: &App) {
    let show_bar = app.mode == Mode::Command || app.filter_active || !app.filter.text.is_empty();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Length(if show_bar { 3 } else { 0 }),
            Constraint::Min(3),
        ])
        .split(f.area());

    header::render(f, app, chunks[0]);
    if show_bar {
        render_input_bar(f, app, chunks[1]);
    }

    let over_sql = app.form.as_ref().is_some_and(ActiveForm::saves_sql);
    match app.mode {
        Mode::Sql => sql::render(f, app, chunks[2]),
        Mode::Form | Mode::Confirm | Mode::Warning if over_sql => sql::render(f, app, chunks[2]),
        Mode::Favorites => favorites::render(f, app, chunks[2]),
        Mode::Describe => describe::render(f, app, chunks[2]),
        _ => table::render(f, app, chunks[2]),
    }

    match app.mode {
        Mode::Command => render_suggestions(f, app, chunks[2]),
        Mode::Help => help::render(f, app),
        Mode::Form => form::render(f, app),
        Mode::Confirm | Mode::Warning => {
            // Dialogs raised from a form keep the form visible underneath
            if app.form.is_some() {
                form::render(f, app);
            }
            dialog::render(f, app);
        }
        _ => {}
    }

    notifications::render(f, app);
}

fn render_input_bar(f: &mut Frame, app: &App, area: Rect) {
    let line = if app.mode == Mode::Command {
        let ghost = app
            .command_preview
            .as_deref()
            .and_then(|p| p.strip_prefix(app.command_text.as_str()))
            .unwrap_or("");
        Line::from(vec![
            Span::styled(
                ":",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(&app.command_text, Style::default().fg(Color::White)),
            Span::styled(ghost, Style::default().fg(Color::DarkGray)),
        ])
    } else {
        let cursor = if app.filter_active { "█" } else { "" };
        Line::from(vec![
            Span::styled(
                "/",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(&app.filter.text, Style::default().fg(Color::White)),
            Span::styled(cursor, Style::default().fg(Color::Yellow)),
        ])
    };

    let border = if app.mode == Mode::Command {
        Color::Cyan
    } else {
        Color::Yellow
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn render_suggestions(f: &mut Frame, app: &App, area: Rect) {
    if app.command_suggestions.is_empty() {
        return;
    }

    let height = (app.command_suggestions.len() as u16 + 2).min(area.height);
    let width = 34.min(area.width);
    let popup = Rect::new(area.x + 1, area.y, width, height);

    let lines: Vec<Line> = app
        .command_suggestions
        .iter()
        .enumerate()
        .map(|(i, cmd)| {
            let style = if i == app.command_suggestion_selected {
                Style::default()
                    .bg(Color::DarkGray)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(Span::styled(format!(" {}", cmd), style))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    f.render_widget(Clear, popup);
    f.render_widget(Paragraph::new(lines).block(block), popup);
}

/// Popup area: `percent_x` of the width, fixed `height`, vertically centered
pub(crate) fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height.min(r.height)),
            Constraint::Min(0),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

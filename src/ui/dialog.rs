use crate::app::{App, Mode};
use ratatui::{
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::centered_rect;

pub fn render(f: &mut Frame, app: &App) {
    match app.mode {
        Mode::Confirm => render_confirm_dialog(f, app),
        Mode::Warning => render_warning_dialog(f, app),
        _ => {}
    }
}

fn render_confirm_dialog(f: &mut Frame, app: &App) {
    let Some(pending) = &app.pending_action else {
        return;
    };

    let (title, title_color) = if pending.destructive {
        ("Danger", Color::Red)
    } else {
        ("Confirm", Color::Yellow)
    };

    // Build Cancel/OK buttons with selection indicator
    let selected = Style::default().fg(Color::Black).bg(Color::Magenta);
    let unselected = Style::default().fg(Color::White);
    let (cancel_style, ok_style) = if pending.selected_yes {
        (unselected, selected)
    } else {
        (selected, unselected)
    };

    let message = wrap_text(&pending.message, 56);

    let mut text = vec![
        Line::from(Span::styled(
            format!("<{}>", title),
            Style::default()
                .fg(title_color)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    text.extend(
        message
            .into_iter()
            .map(|line| Line::from(Span::styled(line, Style::default().fg(Color::White)))),
    );
    text.push(Line::from(""));
    text.push(Line::from(vec![
        Span::styled(" Cancel ", cancel_style),
        Span::raw("    "),
        Span::styled(" OK ", ok_style),
    ]));

    let area = centered_rect(60, text.len() as u16 + 2, f.area());
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if pending.destructive {
            Color::Red
        } else {
            Color::DarkGray
        }));

    let paragraph = Paragraph::new(text)
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

fn render_warning_dialog(f: &mut Frame, app: &App) {
    let Some(message) = &app.warning_message else {
        return;
    };

    let wrapped_lines: Vec<Line> = wrap_text(message, 60)
        .into_iter()
        .map(|line| Line::from(Span::styled(line, Style::default().fg(Color::White))))
        .collect();

    let mut text = vec![
        Line::from(Span::styled(
            " Warning ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    text.extend(wrapped_lines);
    text.push(Line::from(""));
    text.push(Line::from(vec![Span::styled(
        " OK (Enter/Esc) ",
        Style::default().fg(Color::Black).bg(Color::Magenta),
    )]));

    let height = (text.len() as u16 + 2).min(15);
    let area = centered_rect(70, height, f.area());
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let paragraph = Paragraph::new(text)
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

/// Wrap text to fit within a given width; explicit line breaks are kept
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current_line = String::new();
        for word in paragraph.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.chars().count() + 1 + word.chars().count() <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

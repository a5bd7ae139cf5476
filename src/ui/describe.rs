use crate::app::App;
use crate::api_test::StatusBand;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Detail view: pretty JSON of the record, or the rendered result of an action
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let content = app.selected_item_json().unwrap_or_default();

    let border = match app.describe_band {
        Some(StatusBand::Success) => Color::Green,
        Some(StatusBand::Warning) => Color::Yellow,
        Some(StatusBand::Danger) => Color::Red,
        None => Color::Cyan,
    };
    let title = app.describe_title.as_deref().unwrap_or("Describe");

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(
            format!(" {} ", title),
            Style::default().fg(border).add_modifier(Modifier::BOLD),
        ))
        .title_alignment(Alignment::Center);

    let lines: Vec<Line> = content.lines().map(highlight_line).collect();

    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((app.describe_scroll.min(u16::MAX as usize) as u16, 0));
    f.render_widget(paragraph, area);
}

/// Color JSON keys apart from values
fn highlight_line(line: &str) -> Line<'static> {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix('"') {
        if let Some(end) = rest.find("\":") {
            let indent = &line[..line.len() - trimmed.len()];
            let key = &rest[..end];
            let value = &rest[end + 2..];
            return Line::from(vec![
                Span::raw(indent.to_string()),
                Span::styled(format!("\"{}\"", key), Style::default().fg(Color::Cyan)),
                Span::raw(":"),
                Span::styled(value.to_string(), Style::default().fg(Color::White)),
            ]);
        }
    }
    Line::from(Span::styled(line.to_string(), Style::default().fg(Color::White)))
}

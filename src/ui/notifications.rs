use crate::app::App;
use crate::notify::Level;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

const WIDTH: u16 = 48;

fn level_color(level: Level) -> Color {
    match level {
        Level::Success => Color::Green,
        Level::Info => Color::Cyan,
        Level::Warning => Color::Yellow,
        Level::Danger => Color::Red,
    }
}

/// Stack of toasts in the bottom-right corner, newest at the bottom
pub fn render(f: &mut Frame, app: &App) {
    let screen = f.area();
    if app.notifications.is_empty() || screen.width < WIDTH + 2 {
        return;
    }

    let mut bottom = screen.y + screen.height;
    for entry in app.notifications.entries().iter().rev() {
        let color = level_color(entry.level);
        let mut lines: Vec<Line> = Vec::new();
        for (i, text) in entry.message.lines().enumerate() {
            let prefix = if i == 0 {
                format!("{} ", entry.level.icon())
            } else {
                "  ".to_string()
            };
            lines.push(Line::from(vec![
                Span::styled(prefix, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::styled(text.to_string(), Style::default().fg(Color::White)),
            ]));
        }

        let inner_width = (WIDTH - 2) as usize;
        let wrapped: usize = lines
            .iter()
            .map(|l| l.width().div_ceil(inner_width).max(1))
            .sum();
        let height = wrapped as u16 + 2;
        if bottom < screen.y + height {
            break;
        }
        bottom -= height;

        let area = Rect::new(screen.x + screen.width - WIDTH - 1, bottom, WIDTH, height);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color));

        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
            area,
        );
    }
}

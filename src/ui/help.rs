use crate::app::App;
use crate::resource::registry::{get_resource, top_level_resource_keys};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::centered_rect;

pub fn render(f: &mut Frame, _app: &App) {
    let mut help_text = vec![
        Line::from(""),
        create_section("Navigation"),
        create_key_line("j / Down", "Move down"),
        create_key_line("k / Up", "Move up"),
        create_key_line("gg / G", "Go to top / bottom"),
        create_key_line("Backspace", "Back to parent"),
        Line::from(""),
        create_section("Views"),
        create_key_line("d / Enter", "Describe item"),
        create_key_line("r", "Refresh"),
        create_key_line("/", "Filter by name"),
        create_key_line(":", "Switch panel / :sql"),
        create_key_line("?", "Toggle help"),
        Line::from(""),
        create_section("Favorites"),
        create_key_line("f", "Star / unstar row"),
        create_key_line("F", "Starred rows only"),
        create_key_line("v", "Favorites tab"),
        Line::from(""),
        create_section("Actions"),
        create_key_line("n", "Create"),
        create_key_line("Ctrl+d", "Delete (asks first)"),
        create_key_line("", "Other keys are listed in the header"),
        Line::from(""),
        create_section("SQL runner"),
        create_key_line("Ctrl+r", "Run query"),
        create_key_line("Ctrl+n / Ctrl+w", "New / close tab"),
        create_key_line("PgDn / PgUp", "Next / previous tab"),
        create_key_line("Ctrl+t / Ctrl+l", "Test connection / tables"),
        Line::from(""),
        create_section("Panels"),
    ];

    let mut keys = top_level_resource_keys();
    keys.sort();
    for key in keys {
        if let Some(resource) = get_resource(key) {
            help_text.push(create_key_line_owned(format!(":{}", key), resource.display_name.clone()));
        }
    }
    help_text.push(Line::from(""));
    help_text.push(create_key_line("Esc", "Close / Cancel"));
    help_text.push(create_key_line("Ctrl+c", "Quit application"));

    let area = centered_rect(60, f.area().height.saturating_sub(4), f.area());
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(" Help ")
        .title_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(help_text).block(block);

    f.render_widget(paragraph, area);
}

fn create_section(title: &str) -> Line<'_> {
    Line::from(vec![Span::styled(
        format!("  {} ", title),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )])
}

fn create_key_line(key: &str, description: &str) -> Line<'static> {
    create_key_line_owned(key.to_string(), description.to_string())
}

fn create_key_line_owned(key: String, description: String) -> Line<'static> {
    Line::from(vec![
        Span::raw("    "),
        Span::styled(
            format!("{:>20}", key),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(description, Style::default().fg(Color::White)),
    ])
}

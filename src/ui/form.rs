use crate::action::form::FieldInput;
use crate::app::App;
use crate::resource::registry::FieldKind;
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::centered_rect;

pub fn render(f: &mut Frame, app: &App) {
    let Some(form) = &app.form else {
        return;
    };
    let state = &form.state;

    let mut lines: Vec<Line> = vec![Line::from("")];
    for (index, field) in state.visible_fields() {
        let focused = index == state.focused;
        lines.push(field_line(field, focused));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(" Enter", Style::default().fg(Color::Yellow)),
        Span::styled(" submit  ", Style::default().fg(Color::DarkGray)),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::styled(" next  ", Style::default().fg(Color::DarkGray)),
        Span::styled("←/→", Style::default().fg(Color::Yellow)),
        Span::styled(" choose  ", Style::default().fg(Color::DarkGray)),
        Span::styled("Esc", Style::default().fg(Color::Yellow)),
        Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
    ]));

    let height = lines.len() as u16 + 2;
    let area = centered_rect(70, height, f.area());
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(format!(" {} ", state.title))
        .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn field_line(field: &FieldInput, focused: bool) -> Line<'_> {
    let def = field.def;
    let marker = if def.required { "*" } else { " " };
    let label_style = if focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };

    let shown = match def.kind {
        FieldKind::Secret => "•".repeat(field.value.chars().count()),
        FieldKind::Bool => {
            if field.value == "true" {
                "[x]".to_string()
            } else {
                "[ ]".to_string()
            }
        }
        FieldKind::Select => format!("‹ {} ›", field.value),
        _ => field.value.clone(),
    };
    let hint = match def.kind {
        FieldKind::Json => " (JSON)",
        FieldKind::Pairs => " (key=value, ...)",
        FieldKind::Number => " (number)",
        _ => "",
    };
    let cursor = if focused && !matches!(def.kind, FieldKind::Bool | FieldKind::Select) {
        "█"
    } else {
        ""
    };

    Line::from(vec![
        Span::styled(format!(" {}{:<22}", marker, def.label), label_style),
        Span::styled(shown, Style::default().fg(Color::White)),
        Span::styled(cursor, Style::default().fg(Color::Yellow)),
        Span::styled(hint, Style::default().fg(Color::DarkGray)),
    ])
}

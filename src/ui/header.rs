use crate::app::{App, Mode};
use crate::resource::registry::ResourceDef;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30), // Context info
            Constraint::Percentage(18), // Sub-resource / favorites shortcuts
            Constraint::Percentage(19), // Keybindings col 1
            Constraint::Percentage(19), // Keybindings col 2
            Constraint::Percentage(14), // Logo
        ])
        .split(area);

    render_context_column(f, app, columns[0]);
    render_shortcuts_column(f, app, columns[1]);
    render_keybindings_col1(f, app, columns[2]);
    render_keybindings_col2(f, app, columns[3]);
    render_logo(f, columns[4]);
}

fn label(text: &str) -> Span<'_> {
    Span::styled(format!("{:<9}", text), Style::default().fg(Color::DarkGray))
}

fn render_context_column(f: &mut Frame, app: &App, area: Rect) {
    let (resource_name, service) = match app.current_resource() {
        Some(r) => (r.display_name.as_str(), r.service.as_str()),
        None => (app.resource_key.as_str(), ""),
    };

    let mut lines = vec![
        Line::from(vec![
            label("Backend:"),
            Span::styled(
                &app.backend_url,
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            label("Panel:"),
            Span::styled(
                resource_name.to_string(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!(" ({})", service), Style::default().fg(Color::DarkGray)),
        ]),
    ];

    if app.parent_context.is_some() {
        lines.push(Line::from(vec![
            label("Context:"),
            Span::styled(
                app.get_breadcrumb().join(" › "),
                Style::default().fg(Color::Yellow),
            ),
        ]));
    }

    let status = match app.current_store() {
        _ if app.is_loading() => Span::styled("loading…", Style::default().fg(Color::Yellow)),
        Some(store) if store.is_stale() => {
            Span::styled("stale (refresh failed)", Style::default().fg(Color::Red))
        }
        Some(store) if store.is_loaded() => Span::styled(
            format!("{} items", store.len()),
            Style::default().fg(Color::Green),
        ),
        _ => Span::styled("-", Style::default().fg(Color::DarkGray)),
    };
    lines.push(Line::from(vec![label("Status:"), status]));

    if app.readonly {
        lines.push(Line::from(vec![
            label("Mode:"),
            Span::styled(
                "READONLY",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
        ]));
    }

    f.render_widget(Paragraph::new(lines), area);
}

fn render_shortcuts_column(f: &mut Frame, app: &App, area: Rect) {
    if app.mode == Mode::Sql {
        render_bindings(
            f,
            &[
                ("<ctrl-r>", "Run query"),
                ("<ctrl-n>", "New tab"),
                ("<ctrl-w>", "Close tab"),
                ("<ctrl-t>", "Test conn"),
                ("<ctrl-l>", "Tables"),
            ],
            area,
        );
        return;
    }

    let Some(resource) = app.current_resource() else {
        return;
    };
    if !resource.sub_resources.is_empty() {
        render_subresource_shortcuts(f, resource, area);
    } else if resource.favorites.is_some() {
        render_bindings(
            f,
            &[("<f>", "Star"), ("<F>", "Starred only"), ("<v>", "Favorites")],
            area,
        );
    }
}

fn render_subresource_shortcuts(f: &mut Frame, resource: &ResourceDef, area: Rect) {
    let mut lines: Vec<Line> = vec![Line::from(Span::styled(
        "Sub-resources:",
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    ))];

    for sub in resource.sub_resources.iter().take(4) {
        lines.push(Line::from(vec![
            Span::styled(
                format!("<{}>", sub.shortcut),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw(" "),
            Span::styled(sub.display_name.clone(), Style::default().fg(Color::White)),
        ]));
    }
    if resource.favorites.is_some() {
        lines.push(Line::from(vec![
            Span::styled("<f>", Style::default().fg(Color::Yellow)),
            Span::raw(" "),
            Span::styled("Star", Style::default().fg(Color::White)),
        ]));
    }

    f.render_widget(Paragraph::new(lines), area);
}

/// Resource actions with a shortcut, as `<key>` / name pairs
fn action_bindings(app: &App) -> Vec<(String, String)> {
    app.get_action_hints()
        .into_iter()
        .map(|(key, name)| (format!("<{}>", key.replace("ctrl+", "ctrl-")), name))
        .collect()
}

fn render_keybindings_col1(f: &mut Frame, app: &App, area: Rect) {
    let actions = action_bindings(app);
    let half = actions.len().div_ceil(2);

    let mut bindings = vec![("<d>".to_string(), "Describe".to_string())];
    bindings.extend(actions.into_iter().take(half));
    bindings.push(("<?>".to_string(), "Help".to_string()));

    render_owned_bindings(f, &bindings, area);
}

fn render_keybindings_col2(f: &mut Frame, app: &App, area: Rect) {
    let actions = action_bindings(app);
    let half = actions.len().div_ceil(2);

    let mut bindings: Vec<(String, String)> = actions.into_iter().skip(half).collect();
    bindings.push(("</>".to_string(), "Filter".to_string()));
    bindings.push(("<:>".to_string(), "Panels".to_string()));
    bindings.push(("<bs>".to_string(), "Parent".to_string()));
    bindings.push(("<ctrl-c>".to_string(), "Quit".to_string()));

    render_owned_bindings(f, &bindings, area);
}

fn render_bindings(f: &mut Frame, bindings: &[(&str, &str)], area: Rect) {
    let owned: Vec<(String, String)> = bindings
        .iter()
        .map(|(k, d)| (k.to_string(), d.to_string()))
        .collect();
    render_owned_bindings(f, &owned, area);
}

fn render_owned_bindings(f: &mut Frame, bindings: &[(String, String)], area: Rect) {
    let lines: Vec<Line> = bindings
        .iter()
        .take(area.height as usize)
        .map(|(key, desc)| {
            Line::from(vec![
                Span::styled(format!("{:<10}", key), Style::default().fg(Color::Yellow)),
                Span::styled(desc.clone(), Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    f.render_widget(Paragraph::new(lines), area);
}

fn render_logo(f: &mut Frame, area: Rect) {
    let logo_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let logo = vec![
        Line::from(Span::styled("▄▀█ █ █ █ █▀", logo_style)),
        Line::from(Span::styled("█▀█ ▀▄▀▄▀ ▄█", logo_style)),
        Line::from(""),
        Line::from(Span::styled("awsdesk", Style::default().fg(Color::DarkGray))),
        Line::from(Span::styled(
            crate::VERSION,
            Style::default().fg(Color::DarkGray),
        )),
    ];

    f.render_widget(Paragraph::new(logo), area);
}

use std::path::PathBuf;
use std::sync::Arc;
use std::{io, time::Duration};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

mod action;
mod app;
mod backend;
mod config;
mod error;
mod notify;
mod resource;
mod sql_tabs;
mod ui;

use app::{App, Mode, SqlFocus};
use backend::client::BackendClient;
use config::Config;

/// Version injected at compile time via AWSDESK_VERSION env var (set by CI/CD),
/// or falls back to Cargo.toml version for local builds.
pub const VERSION: &str = match option_env!("AWSDESK_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

/// Terminal console for an AWS management backend
#[derive(Parser, Debug)]
#[command(name = "awsdesk", version = VERSION, about, long_about = None)]
struct Args {
    /// Backend base URL (overrides AWSDESK_BACKEND_URL and the config file)
    #[arg(short, long)]
    backend_url: Option<String>,

    /// Panel to open on start (e.g. secrets, ecs-clusters)
    #[arg(short, long)]
    panel: Option<String>,

    /// Log level for debugging (logs to ~/.config/awsdesk/awsdesk.log)
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Run in read-only mode (block all write operations)
    #[arg(long)]
    readonly: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    // No log file, no logging; the console itself still works
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok()?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("awsdesk started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("awsdesk").join("awsdesk.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".awsdesk").join("awsdesk.log");
    }
    PathBuf::from("awsdesk.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Keep guard alive for the duration of the program
    let _log_guard = setup_logging(args.log_level);

    tracing::info!("Starting awsdesk v{}", VERSION);
    tracing::debug!("CLI args: {:?}", args);

    let mut config = Config::load();
    let backend_url = config.effective_backend_url(args.backend_url.as_deref());
    tracing::info!("Backend: {}", backend_url);

    // Fail before touching the terminal on a malformed URL
    let client = BackendClient::new(&backend_url, config.request_timeout())?;

    let mut app = App::new(Arc::new(client), &config, args.readonly, args.panel.as_deref());
    app.backend_url = backend_url;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.refresh();

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = config.set_last_panel(app.root_resource_key()) {
        tracing::warn!("Failed to save config: {}", e);
    }

    tracing::info!("awsdesk shutdown");
    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.drain_events();
        terminal.draw(|f| ui::render(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                tracing::trace!("Key event: {:?}", key);
                let quit = match app.mode {
                    Mode::Normal => handle_normal_mode(app, key.code, key.modifiers),
                    Mode::Command => handle_command_mode(app, key.code),
                    Mode::Help => {
                        handle_help_mode(app, key.code);
                        false
                    }
                    Mode::Confirm => {
                        handle_confirm_mode(app, key.code);
                        false
                    }
                    Mode::Warning => {
                        handle_warning_mode(app, key.code);
                        false
                    }
                    Mode::Describe => {
                        handle_describe_mode(app, key.code);
                        false
                    }
                    Mode::Form => {
                        handle_form_mode(app, key.code);
                        false
                    }
                    Mode::Favorites => {
                        handle_favorites_mode(app, key.code, key.modifiers);
                        false
                    }
                    Mode::Sql => {
                        handle_sql_mode(app, key.code, key.modifiers);
                        false
                    }
                };
                if quit {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Shortcut string for a key press as written in resource definitions
fn shortcut_of(code: KeyCode, modifiers: KeyModifiers) -> Option<String> {
    let KeyCode::Char(c) = code else {
        return None;
    };
    if modifiers.contains(KeyModifiers::CONTROL) {
        Some(format!("ctrl+{}", c))
    } else {
        Some(c.to_string())
    }
}

fn handle_normal_mode(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> bool {
    if modifiers.contains(KeyModifiers::CONTROL) {
        if code == KeyCode::Char('c') {
            return true;
        }
        if let Some(action_index) =
            shortcut_of(code, modifiers).and_then(|s| app.find_action_by_shortcut(&s))
        {
            tracing::info!("Action shortcut {:?} triggered", code);
            app.trigger_action(action_index);
        }
        return false;
    }

    if app.filter_active {
        match code {
            KeyCode::Esc => app.clear_filter(),
            KeyCode::Enter => app.filter_active = false,
            KeyCode::Backspace => app.pop_filter_char(),
            KeyCode::Char(c) => app.push_filter_char(c),
            KeyCode::Down => app.next(),
            KeyCode::Up => app.previous(),
            _ => {}
        }
        return false;
    }

    match code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('j') | KeyCode::Down => app.next(),
        KeyCode::Char('k') | KeyCode::Up => app.previous(),
        KeyCode::Char('g') => {
            // Check for 'gg' sequence (go to top)
            let now = std::time::Instant::now();
            if let Some((KeyCode::Char('g'), last_time)) = app.last_key_press {
                if now.duration_since(last_time) < Duration::from_millis(500) {
                    app.go_to_top();
                    app.last_key_press = None;
                    return false;
                }
            }
            app.last_key_press = Some((KeyCode::Char('g'), now));
        }
        KeyCode::Char('G') | KeyCode::End => app.go_to_bottom(),
        KeyCode::Home => app.go_to_top(),
        KeyCode::PageDown => app.page_down(10),
        KeyCode::PageUp => app.page_up(10),
        KeyCode::Char('r') => {
            tracing::debug!("Manual refresh triggered");
            app.refresh();
        }
        KeyCode::Enter => {
            if !app.load_selected_command() {
                app.enter_describe_mode();
            }
        }
        KeyCode::Char('d') => app.enter_describe_mode(),
        KeyCode::Char('f') => app.toggle_favorite(),
        KeyCode::Char('F') => app.toggle_favorites_only(),
        KeyCode::Char('v') => app.enter_favorites_mode(),
        KeyCode::Char('?') => app.enter_help_mode(),
        KeyCode::Char(':') => app.enter_command_mode(),
        KeyCode::Char('/') => {
            app.filter_active = true;
            app.filter.text.clear();
            app.apply_filter();
        }
        KeyCode::Backspace => app.navigate_back(),
        KeyCode::Esc => {
            if app.filter.is_active() {
                app.filter.favorites_only = false;
                app.clear_filter();
            }
        }
        KeyCode::Char(c) => {
            let shortcut = c.to_string();

            // Sub-resources first, then actions
            if let Some(sub_resource_key) = app.find_sub_resource_by_shortcut(&shortcut) {
                tracing::info!(
                    "Sub-resource shortcut '{}' triggered -> {}",
                    shortcut,
                    sub_resource_key
                );
                app.navigate_to_sub_resource(&sub_resource_key);
            } else if let Some(action_index) = app.find_action_by_shortcut(&shortcut) {
                tracing::info!("Action shortcut '{}' triggered", shortcut);
                app.trigger_action(action_index);
            }
        }
        _ => {}
    }

    false
}

fn handle_command_mode(app: &mut App, code: KeyCode) -> bool {
    match code {
        KeyCode::Esc => app.exit_mode(),
        KeyCode::Enter => {
            tracing::debug!("Executing command: {}", app.command_text);
            return app.execute_command();
        }
        KeyCode::Backspace => {
            app.command_text.pop();
            app.update_command_suggestions();
        }
        KeyCode::Tab | KeyCode::Right => app.apply_suggestion(),
        KeyCode::Down => app.next_suggestion(),
        KeyCode::Up => app.prev_suggestion(),
        KeyCode::Char(c) => {
            app.command_text.push(c);
            app.update_command_suggestions();
        }
        _ => {}
    }

    false
}

fn handle_help_mode(app: &mut App, code: KeyCode) {
    if matches!(code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
        app.exit_mode();
    }
}

fn handle_confirm_mode(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => app.decline_pending(),
        KeyCode::Enter => app.execute_pending_action(),
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            // Quick yes - set selected_yes and execute
            if let Some(ref mut pending) = app.pending_action {
                pending.selected_yes = true;
            }
            app.execute_pending_action();
        }
        KeyCode::Left | KeyCode::Char('h') => {
            if let Some(ref mut pending) = app.pending_action {
                pending.selected_yes = false;
            }
        }
        KeyCode::Right | KeyCode::Char('l') => {
            if let Some(ref mut pending) = app.pending_action {
                pending.selected_yes = true;
            }
        }
        KeyCode::Tab => {
            if let Some(ref mut pending) = app.pending_action {
                pending.selected_yes = !pending.selected_yes;
            }
        }
        _ => {}
    }
}

fn handle_warning_mode(app: &mut App, code: KeyCode) {
    if matches!(code, KeyCode::Esc | KeyCode::Enter) {
        if app.form.is_some() {
            app.warning_message = None;
            app.mode = Mode::Form;
        } else {
            app.exit_mode();
        }
    }
}

fn handle_describe_mode(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('d') => app.exit_mode(),
        KeyCode::Char('j') | KeyCode::Down => {
            app.describe_scroll = app.describe_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.describe_scroll = app.describe_scroll.saturating_sub(1);
        }
        KeyCode::PageDown => app.describe_scroll = app.describe_scroll.saturating_add(20),
        KeyCode::PageUp => app.describe_scroll = app.describe_scroll.saturating_sub(20),
        KeyCode::Char('g') => app.describe_scroll = 0,
        KeyCode::Char('G') => app.describe_scroll_to_bottom(30), // Approximate visible lines
        _ => {}
    }
}

fn handle_form_mode(app: &mut App, code: KeyCode) {
    if code == KeyCode::Esc {
        app.cancel_form();
        return;
    }
    if code == KeyCode::Enter {
        app.submit_form();
        return;
    }
    let Some(form) = app.form.as_mut() else {
        app.mode = Mode::Normal;
        return;
    };
    let state = &mut form.state;
    match code {
        KeyCode::Tab | KeyCode::Down => state.next_field(),
        KeyCode::BackTab | KeyCode::Up => state.prev_field(),
        KeyCode::Left => state.cycle(false),
        KeyCode::Right => state.cycle(true),
        KeyCode::Backspace => state.backspace(),
        KeyCode::Char(c) => state.input(c),
        _ => {}
    }
}

fn handle_favorites_mode(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('d') {
        app.request_remove_favorite();
        return;
    }
    match code {
        KeyCode::Esc | KeyCode::Char('v') | KeyCode::Char('q') => app.mode = Mode::Normal,
        KeyCode::Char('j') | KeyCode::Down => app.next(),
        KeyCode::Char('k') | KeyCode::Up => app.previous(),
        KeyCode::Char('g') | KeyCode::Home => app.go_to_top(),
        KeyCode::Char('G') | KeyCode::End => app.go_to_bottom(),
        KeyCode::Char('x') | KeyCode::Delete => app.request_remove_favorite(),
        KeyCode::Enter => app.open_selected_favorite(),
        KeyCode::Char('r') => app.refresh(),
        _ => {}
    }
}

fn handle_sql_mode(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    if modifiers.contains(KeyModifiers::CONTROL) {
        match code {
            KeyCode::Char('r') => app.run_active_query(),
            KeyCode::Char('n') => app.new_sql_tab(),
            KeyCode::Char('w') => app.close_sql_tab(),
            KeyCode::Char('t') => app.test_sql_connection(),
            KeyCode::Char('l') => app.list_sql_tables(),
            KeyCode::Char('s') => app.save_sql_command(),
            KeyCode::Char('c') => app.mode = Mode::Normal,
            _ => {}
        }
        return;
    }

    match code {
        KeyCode::Esc => app.mode = Mode::Normal,
        KeyCode::Tab => app.cycle_sql_focus(),
        KeyCode::PageDown => app.sql.next(),
        KeyCode::PageUp => app.sql.previous(),
        KeyCode::F(n) => app.switch_sql_tab(n as usize),
        KeyCode::Down => app.sql_field_step(true),
        KeyCode::Up => app.sql_field_step(false),
        KeyCode::Left | KeyCode::Right if app.sql_focus == SqlFocus::Connection(0) => {
            app.connection.cycle_engine()
        }
        KeyCode::Enter => match app.sql_focus {
            SqlFocus::Editor => app.sql_input('\n'),
            SqlFocus::Tables => app.use_selected_table(),
            SqlFocus::Connection(_) => app.sql_field_step(true),
        },
        KeyCode::Backspace => app.sql_backspace(),
        KeyCode::Char(c) => app.sql_input(c),
        _ => {}
    }
}

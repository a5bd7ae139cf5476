use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::action::form::FormState;
use crate::action::{busy_key, success_text, BusySet};
use crate::api_test::{StatusBand, TestResponse, Tool};
use crate::backend::client::{parse_method, Backend};
use crate::backend::dispatch::{execute, fetch_detail, list_resources, ActionRequest};
use crate::backend::encoding::{substitute_text, Scope};
use crate::backend::envelope::Reply;
use crate::config::Config;
use crate::error::ConsoleResult;
use crate::notify::NotificationSink;
use crate::resource::favorites::{self, FavoriteRecord, ToggleOutcome};
use crate::resource::filter::{filter, filter_favorites, FilterState};
use crate::resource::registry::{
    get_form, get_resource, top_level_resource_keys, ActionDef, ActionScope, ResourceDef,
};
use crate::resource::store::ResourceStore;
use crate::sql_tabs::{self, ConnectionParams, QueryResult, SqlTabs, TabOutput, CONNECTION_FIELDS};

pub const DEFAULT_PANEL: &str = "ec2-instances";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,    // Viewing list
    Command,   // : command input
    Help,      // ? help popup
    Confirm,   // Confirmation dialog
    Warning,   // Warning/info dialog (OK only)
    Describe,  // Viewing JSON details of selected item
    Form,      // Action input form
    Favorites, // Favorites tab of the current panel
    Sql,       // SQL tab runner
}

#[derive(Debug, Clone)]
pub enum PendingKind {
    Action {
        resource_key: String,
        action_index: usize,
        item: Option<Value>,
        values: Option<Value>,
    },
    RemoveFavorite {
        resource_key: String,
        key: String,
    },
}

/// Pending operation that requires confirmation
#[derive(Debug, Clone)]
pub struct PendingAction {
    /// Display message for confirmation dialog
    pub message: String,
    /// If true, show as destructive (red)
    pub destructive: bool,
    /// Currently selected option (true = Yes, false = No)
    pub selected_yes: bool,
    pub kind: PendingKind,
}

/// Parent context for hierarchical navigation
#[derive(Debug, Clone)]
pub struct ParentContext {
    pub resource_key: String,
    /// Parent item (the selected item)
    pub item: Value,
    /// Display name for breadcrumb
    pub display_name: String,
}

/// Where the values of a submitted form go
#[derive(Debug, Clone)]
pub enum FormTarget {
    Action {
        resource_key: String,
        action_index: usize,
        item: Option<Value>,
    },
    /// Name and description for the active SQL tab's query
    SqlCommand,
}

#[derive(Debug, Clone)]
pub struct ActiveForm {
    pub target: FormTarget,
    pub state: FormState,
}

impl ActiveForm {
    fn is_for_action(&self, resource_key: &str, action_index: usize) -> bool {
        matches!(
            &self.target,
            FormTarget::Action { resource_key: r, action_index: i, .. }
                if r == resource_key && *i == action_index
        )
    }

    pub fn saves_sql(&self) -> bool {
        matches!(self.target, FormTarget::SqlCommand)
    }
}

const SAVE_COMMAND_BUSY: &str = "sql-commands#save";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlFocus {
    Editor,
    Connection(usize),
    Tables,
}

/// Completion of a background backend call
#[derive(Debug)]
pub enum AppEvent {
    Listed {
        resource_key: String,
        parents: Vec<Value>,
        items: ConsoleResult<Vec<Value>>,
        favorites: Option<ConsoleResult<Vec<FavoriteRecord>>>,
    },
    FavoritesLoaded {
        resource_key: String,
        result: ConsoleResult<Vec<FavoriteRecord>>,
    },
    FavoriteToggled {
        resource_key: String,
        key: String,
        busy: String,
        result: ConsoleResult<ToggleOutcome>,
    },
    FavoriteRemoved {
        resource_key: String,
        key: String,
        busy: String,
        result: ConsoleResult<Reply>,
    },
    ActionDone {
        resource_key: String,
        action_index: usize,
        item: Option<Value>,
        busy: String,
        result: ConsoleResult<Reply>,
    },
    FormPreloaded {
        resource_key: String,
        action_index: usize,
        result: ConsoleResult<Reply>,
    },
    Described {
        resource_key: String,
        result: ConsoleResult<Value>,
    },
    RefreshDue {
        resource_key: String,
    },
    QueryDone {
        tab_id: usize,
        result: ConsoleResult<QueryResult>,
    },
    ConnectionTested {
        result: ConsoleResult<Reply>,
    },
    TablesListed {
        result: ConsoleResult<Vec<String>>,
    },
    CommandSaved {
        result: ConsoleResult<Reply>,
    },
}

pub struct App {
    pub backend: Arc<dyn Backend>,
    pub backend_url: String,

    events_tx: UnboundedSender<AppEvent>,
    events_rx: UnboundedReceiver<AppEvent>,
    tasks: Vec<JoinHandle<()>>,

    // Current resource being viewed
    pub resource_key: String,

    // One store per resource key
    pub stores: HashMap<String, ResourceStore>,
    pub filtered_items: Vec<Value>,

    // Navigation state
    pub selected: usize,
    pub mode: Mode,
    pub filter: FilterState,
    pub filter_active: bool,

    // Hierarchical navigation
    pub parent_context: Option<ParentContext>,
    pub navigation_stack: Vec<ParentContext>,

    // Command input
    pub command_text: String,
    pub command_suggestions: Vec<String>,
    pub command_suggestion_selected: usize,
    pub command_preview: Option<String>, // Ghost text for hovered suggestion

    // Confirmation
    pub pending_action: Option<PendingAction>,
    pub form: Option<ActiveForm>,
    pub busy: BusySet,

    // Favorites tab
    pub favorites_selected: usize,

    // Describe view
    pub describe_scroll: usize,
    pub describe_title: Option<String>,
    pub describe_data: Option<Value>,
    pub describe_text: Option<String>,
    pub describe_band: Option<StatusBand>,

    // SQL runner
    pub sql: SqlTabs,
    pub connection: ConnectionParams,
    pub sql_focus: SqlFocus,
    pub sql_tables: Vec<String>,
    pub sql_table_selected: usize,

    // Key press tracking for sequences (e.g., 'gg')
    pub last_key_press: Option<(KeyCode, Instant)>,

    // Warning message for modal dialog
    pub warning_message: Option<String>,

    pub notifications: NotificationSink,
    pub transition_delay: Duration,

    // Read-only mode (blocks all write operations)
    pub readonly: bool,
}

impl App {
    pub fn new(backend: Arc<dyn Backend>, config: &Config, readonly: bool, panel: Option<&str>) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        let top = top_level_resource_keys();
        let resource_key = panel
            .or(config.last_panel.as_deref())
            .filter(|k| top.iter().any(|t| t == k))
            .unwrap_or(DEFAULT_PANEL)
            .to_string();

        Self {
            backend,
            backend_url: config.effective_backend_url(None),
            events_tx,
            events_rx,
            tasks: Vec::new(),
            resource_key,
            stores: HashMap::new(),
            filtered_items: Vec::new(),
            selected: 0,
            mode: Mode::Normal,
            filter: FilterState::default(),
            filter_active: false,
            parent_context: None,
            navigation_stack: Vec::new(),
            command_text: String::new(),
            command_suggestions: Vec::new(),
            command_suggestion_selected: 0,
            command_preview: None,
            pending_action: None,
            form: None,
            busy: BusySet::default(),
            favorites_selected: 0,
            describe_scroll: 0,
            describe_title: None,
            describe_data: None,
            describe_text: None,
            describe_band: None,
            sql: SqlTabs::new(),
            connection: ConnectionParams::new(),
            sql_focus: SqlFocus::Editor,
            sql_tables: Vec::new(),
            sql_table_selected: 0,
            last_key_press: None,
            warning_message: None,
            notifications: NotificationSink::new(config.notification_ttl()),
            transition_delay: config.transition_delay(),
            readonly,
        }
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.events_tx.clone();
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(tokio::spawn(async move {
            // Receiver only goes away on shutdown
            let _ = tx.send(task.await);
        }));
    }

    /// Apply every completed call; called once per frame
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
        self.notifications.prune(Instant::now());
    }

    /// Wait until no call is in flight and every completion is applied
    #[cfg(test)]
    pub async fn settle(&mut self) {
        loop {
            let tasks = std::mem::take(&mut self.tasks);
            for task in tasks {
                let _ = task.await;
            }
            self.drain_events();
            if self.tasks.is_empty() {
                break;
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.current_store().is_some_and(|s| s.is_loading()) || !self.busy.is_empty()
    }

    // =========================================================================
    // Resource Definition Access
    // =========================================================================

    /// Get current resource definition
    pub fn current_resource(&self) -> Option<&'static ResourceDef> {
        get_resource(&self.resource_key)
    }

    pub fn current_store(&self) -> Option<&ResourceStore> {
        self.stores.get(&self.resource_key)
    }

    /// Ancestor items of the current view, nearest last
    pub fn parent_items(&self) -> Vec<Value> {
        self.navigation_stack
            .iter()
            .chain(self.parent_context.iter())
            .map(|ctx| ctx.item.clone())
            .collect()
    }

    /// Top-level panel the current view descends from
    pub fn root_resource_key(&self) -> &str {
        self.navigation_stack
            .first()
            .or(self.parent_context.as_ref())
            .map(|ctx| ctx.resource_key.as_str())
            .unwrap_or(&self.resource_key)
    }

    /// Get available commands for autocomplete
    pub fn get_available_commands(&self) -> Vec<String> {
        let mut commands: Vec<String> = top_level_resource_keys()
            .iter()
            .map(|s| s.to_string())
            .collect();

        if let Some(resource) = self.current_resource() {
            commands.extend(resource.sub_resources.iter().map(|s| s.resource_key.clone()));
        }
        commands.push("sql".to_string());

        commands.sort();
        commands.dedup();
        commands
    }

    // =========================================================================
    // Data Fetching
    // =========================================================================

    /// Re-fetch the current resource
    pub fn refresh(&mut self) {
        let key = self.resource_key.clone();
        self.refresh_resource(&key);
    }

    /// Fetch one collection in the background; favorites follow a successful list
    pub fn refresh_resource(&mut self, resource_key: &str) {
        let Some(def) = get_resource(resource_key) else {
            self.notifications
                .warning(format!("Resource {} not found", resource_key));
            return;
        };

        let parents = if resource_key == self.resource_key {
            self.parent_items()
        } else {
            self.stores
                .get(resource_key)
                .map(|s| s.parents.clone())
                .unwrap_or_default()
        };
        if parents.is_empty() && def.reads_parent() {
            debug!("Skipping refresh of {}: no parent selected", resource_key);
            return;
        }

        let store = self
            .stores
            .entry(resource_key.to_string())
            .or_insert_with(|| ResourceStore::new(parents.clone()));
        if store.parents != parents {
            *store = ResourceStore::new(parents.clone());
        }
        store.begin_loading();

        debug!("Refreshing {}", resource_key);
        let backend = Arc::clone(&self.backend);
        let resource_key = resource_key.to_string();
        self.spawn(async move {
            let items = list_resources(backend.as_ref(), def, &parents).await;
            let favorites = match (&items, &def.favorites) {
                (Ok(_), Some(fav)) => Some(favorites::load(backend.as_ref(), fav).await),
                _ => None,
            };
            AppEvent::Listed {
                resource_key,
                parents,
                items,
                favorites,
            }
        });
    }

    fn reload_favorites(&mut self, resource_key: &str) {
        let Some(fav) = get_resource(resource_key).and_then(|r| r.favorites.as_ref()) else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        let resource_key = resource_key.to_string();
        self.spawn(async move {
            let result = favorites::load(backend.as_ref(), fav).await;
            AppEvent::FavoritesLoaded {
                resource_key,
                result,
            }
        });
    }

    /// One re-fetch after a delay, for long-running state changes
    fn schedule_refresh(&mut self, resource_key: &str) {
        let delay = self.transition_delay;
        let resource_key = resource_key.to_string();
        debug!("Scheduling refresh of {} in {:?}", resource_key, delay);
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            AppEvent::RefreshDue { resource_key }
        });
    }

    fn apply_favorites(&mut self, resource_key: &str, result: ConsoleResult<Vec<FavoriteRecord>>) {
        let Some(store) = self.stores.get_mut(resource_key) else {
            return;
        };
        match result {
            Ok(records) => store.set_favorites(records),
            Err(e) => {
                warn!("Favorites unavailable for {}: {}", resource_key, e);
                store.set_favorites(Vec::new());
            }
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Listed {
                resource_key,
                parents,
                items,
                favorites,
            } => {
                let Some(store) = self.stores.get_mut(&resource_key) else {
                    return;
                };
                if store.parents != parents {
                    debug!("Dropping {} listing for a previous parent", resource_key);
                    return;
                }
                match items {
                    Ok(items) => {
                        info!("Loaded {} {} items", items.len(), resource_key);
                        store.replace(items);
                    }
                    Err(e) => {
                        warn!("Refresh of {} failed: {}", resource_key, e);
                        store.fail(e.notification_text());
                    }
                }
                if let Some(result) = favorites {
                    self.apply_favorites(&resource_key, result);
                }
                self.after_store_change(&resource_key);
            }
            AppEvent::FavoritesLoaded {
                resource_key,
                result,
            } => {
                self.apply_favorites(&resource_key, result);
                self.after_store_change(&resource_key);
            }
            AppEvent::FavoriteToggled {
                resource_key,
                key,
                busy,
                result,
            } => {
                self.busy.release(&busy);
                match result {
                    Ok(outcome) => {
                        if let Some(store) = self.stores.get_mut(&resource_key) {
                            store.mark_favorite(&key, outcome.is_favorite());
                        }
                        match outcome {
                            ToggleOutcome::Added => {
                                self.notifications.success(format!("Added '{}' to favorites", key))
                            }
                            ToggleOutcome::Removed => self
                                .notifications
                                .success(format!("Removed '{}' from favorites", key)),
                        }
                        self.reload_favorites(&resource_key);
                        self.after_store_change(&resource_key);
                    }
                    Err(e) => self.notifications.report(&e),
                }
            }
            AppEvent::FavoriteRemoved {
                resource_key,
                key,
                busy,
                result,
            } => {
                self.busy.release(&busy);
                match result {
                    Ok(_) => {
                        if let Some(store) = self.stores.get_mut(&resource_key) {
                            store.mark_favorite(&key, false);
                        }
                        self.notifications
                            .success(format!("Removed '{}' from favorites", key));
                        self.reload_favorites(&resource_key);
                        self.after_store_change(&resource_key);
                    }
                    Err(e) => self.notifications.report(&e),
                }
            }
            AppEvent::ActionDone {
                resource_key,
                action_index,
                item,
                busy,
                result,
            } => {
                self.busy.release(&busy);
                self.finish_action(&resource_key, action_index, item.as_ref(), result);
            }
            AppEvent::FormPreloaded {
                resource_key,
                action_index,
                result,
            } => {
                let Some(form) = self
                    .form
                    .as_mut()
                    .filter(|f| f.is_for_action(&resource_key, action_index))
                else {
                    return;
                };
                match result {
                    Ok(reply) => form.state.seed(&reply.payload),
                    Err(e) => warn!("Could not preload form values: {}", e),
                }
            }
            AppEvent::Described {
                resource_key,
                result,
            } => {
                if self.mode != Mode::Describe || resource_key != self.resource_key {
                    return;
                }
                match result {
                    Ok(data) => self.describe_data = Some(data),
                    Err(e) => self.notifications.report(&e),
                }
            }
            AppEvent::RefreshDue { resource_key } => {
                self.refresh_resource(&resource_key);
            }
            AppEvent::QueryDone { tab_id, result } => {
                let output = match result {
                    Ok(rows) => {
                        self.notifications.success(rows.summary());
                        TabOutput::Rows(rows)
                    }
                    Err(e) => {
                        self.notifications.report(&e);
                        TabOutput::Failed(e.notification_text())
                    }
                };
                if let Some(tab) = self.sql.get_mut(tab_id) {
                    tab.output = output;
                }
            }
            AppEvent::ConnectionTested { result } => match result {
                Ok(reply) => self.notifications.success(
                    reply
                        .message
                        .unwrap_or_else(|| "Connection succeeded".to_string()),
                ),
                Err(e) => self.notifications.report(&e),
            },
            AppEvent::TablesListed { result } => match result {
                Ok(tables) => {
                    self.notifications
                        .info(format!("{} table(s) found", tables.len()));
                    self.sql_tables = tables;
                    self.sql_table_selected = 0;
                    if !self.sql_tables.is_empty() {
                        self.sql_focus = SqlFocus::Tables;
                    }
                }
                Err(e) => self.notifications.report(&e),
            },
            AppEvent::CommandSaved { result } => {
                self.busy.release(SAVE_COMMAND_BUSY);
                match result {
                    Ok(reply) => {
                        self.notifications.success(
                            reply
                                .message
                                .unwrap_or_else(|| "Command saved".to_string()),
                        );
                        if self.form.as_ref().is_some_and(ActiveForm::saves_sql) {
                            self.form = None;
                            if self.mode == Mode::Form {
                                self.mode = Mode::Sql;
                            }
                        }
                        self.refresh_resource("sql-commands");
                    }
                    Err(e) => self.notifications.report(&e),
                }
            }
        }
    }

    fn after_store_change(&mut self, resource_key: &str) {
        if resource_key == self.resource_key {
            self.apply_filter();
        }
    }

    // =========================================================================
    // Filtering
    // =========================================================================

    /// Recompute the visible rows from the full collection
    pub fn apply_filter(&mut self) {
        let Some(resource) = self.current_resource() else {
            self.filtered_items.clear();
            return;
        };
        self.filtered_items = match self.stores.get(&self.resource_key) {
            Some(store) => filter(store.items(), &self.filter, resource, store.favorite_keys()),
            None => Vec::new(),
        };

        if self.selected >= self.filtered_items.len() {
            self.selected = self.filtered_items.len().saturating_sub(1);
        }
        let favorites = self.visible_favorites().len();
        if self.favorites_selected >= favorites {
            self.favorites_selected = favorites.saturating_sub(1);
        }
    }

    pub fn clear_filter(&mut self) {
        self.filter.text.clear();
        self.filter_active = false;
        self.apply_filter();
    }

    pub fn push_filter_char(&mut self, c: char) {
        self.filter.text.push(c);
        self.apply_filter();
    }

    pub fn pop_filter_char(&mut self) {
        self.filter.text.pop();
        self.apply_filter();
    }

    /// Show only favorited rows
    pub fn toggle_favorites_only(&mut self) {
        if self.current_resource().and_then(|r| r.favorites.as_ref()).is_none() {
            self.notifications.info("This panel has no favorites");
            return;
        }
        self.filter.favorites_only = !self.filter.favorites_only;
        self.apply_filter();
    }

    pub fn visible_favorites(&self) -> Vec<FavoriteRecord> {
        self.current_store()
            .map(|s| filter_favorites(s.favorites(), &self.filter.text))
            .unwrap_or_default()
    }

    pub fn is_favorite_item(&self, item: &Value) -> bool {
        let (Some(resource), Some(store)) = (self.current_resource(), self.current_store()) else {
            return false;
        };
        resource
            .natural_key(item)
            .is_some_and(|k| store.is_favorite(&k))
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn selected_item(&self) -> Option<&Value> {
        self.filtered_items.get(self.selected)
    }

    pub fn selected_item_json(&self) -> Option<String> {
        if let Some(text) = &self.describe_text {
            return Some(text.clone());
        }
        if let Some(ref data) = self.describe_data {
            return Some(serde_json::to_string_pretty(data).unwrap_or_default());
        }
        self.selected_item()
            .map(|item| serde_json::to_string_pretty(item).unwrap_or_default())
    }

    /// Get the number of lines in the describe content
    pub fn describe_line_count(&self) -> usize {
        self.selected_item_json()
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// Scroll describe view to bottom
    pub fn describe_scroll_to_bottom(&mut self, visible_lines: usize) {
        let total = self.describe_line_count();
        self.describe_scroll = total.saturating_sub(visible_lines);
    }

    fn list_len(&self) -> usize {
        match self.mode {
            Mode::Favorites => self.visible_favorites().len(),
            _ => self.filtered_items.len(),
        }
    }

    fn cursor_mut(&mut self) -> &mut usize {
        match self.mode {
            Mode::Favorites => &mut self.favorites_selected,
            _ => &mut self.selected,
        }
    }

    pub fn next(&mut self) {
        let len = self.list_len();
        if len > 0 {
            let cursor = self.cursor_mut();
            *cursor = (*cursor + 1).min(len - 1);
        }
    }

    pub fn previous(&mut self) {
        let cursor = self.cursor_mut();
        *cursor = cursor.saturating_sub(1);
    }

    pub fn go_to_top(&mut self) {
        *self.cursor_mut() = 0;
    }

    pub fn go_to_bottom(&mut self) {
        let len = self.list_len();
        if len > 0 {
            *self.cursor_mut() = len - 1;
        }
    }

    pub fn page_down(&mut self, page_size: usize) {
        let len = self.list_len();
        if len > 0 {
            let cursor = self.cursor_mut();
            *cursor = (*cursor + page_size).min(len - 1);
        }
    }

    pub fn page_up(&mut self, page_size: usize) {
        let cursor = self.cursor_mut();
        *cursor = cursor.saturating_sub(page_size);
    }

    // =========================================================================
    // Mode Transitions
    // =========================================================================

    pub fn enter_command_mode(&mut self) {
        self.mode = Mode::Command;
        self.command_text.clear();
        self.command_suggestions = self.get_available_commands();
        self.command_suggestion_selected = 0;
        self.command_preview = None;
    }

    pub fn update_command_suggestions(&mut self) {
        let input = self.command_text.to_lowercase();
        let all_commands = self.get_available_commands();

        if input.is_empty() {
            self.command_suggestions = all_commands;
        } else {
            self.command_suggestions = all_commands
                .into_iter()
                .filter(|cmd| cmd.contains(&input))
                .collect();
        }

        if self.command_suggestion_selected >= self.command_suggestions.len() {
            self.command_suggestion_selected = 0;
        }

        self.update_preview();
    }

    fn update_preview(&mut self) {
        self.command_preview = self
            .command_suggestions
            .get(self.command_suggestion_selected)
            .cloned();
    }

    pub fn next_suggestion(&mut self) {
        if !self.command_suggestions.is_empty() {
            self.command_suggestion_selected =
                (self.command_suggestion_selected + 1) % self.command_suggestions.len();
            self.update_preview();
        }
    }

    pub fn prev_suggestion(&mut self) {
        if !self.command_suggestions.is_empty() {
            if self.command_suggestion_selected == 0 {
                self.command_suggestion_selected = self.command_suggestions.len() - 1;
            } else {
                self.command_suggestion_selected -= 1;
            }
            self.update_preview();
        }
    }

    pub fn apply_suggestion(&mut self) {
        if let Some(preview) = &self.command_preview {
            self.command_text = preview.clone();
            self.update_command_suggestions();
        }
    }

    pub fn enter_help_mode(&mut self) {
        self.mode = Mode::Help;
    }

    /// Show the selected row, then the detail endpoint's record once it arrives
    pub fn enter_describe_mode(&mut self) {
        let Some(item) = self.selected_item().cloned() else {
            return;
        };
        let Some(resource) = self.current_resource() else {
            return;
        };

        self.mode = Mode::Describe;
        self.describe_scroll = 0;
        self.describe_title = Some(resource.item_name(&item));
        self.describe_text = None;
        self.describe_band = None;
        self.describe_data = Some(item.clone());

        if resource.detail.is_some() {
            let backend = Arc::clone(&self.backend);
            let parents = self.parent_items();
            let resource_key = self.resource_key.clone();
            self.spawn(async move {
                let result = fetch_detail(backend.as_ref(), resource, &item, &parents).await;
                AppEvent::Described {
                    resource_key,
                    result,
                }
            });
        }
    }

    pub fn enter_favorites_mode(&mut self) {
        if self.current_resource().and_then(|r| r.favorites.as_ref()).is_none() {
            self.notifications.info("This panel has no favorites");
            return;
        }
        self.favorites_selected = 0;
        self.mode = Mode::Favorites;
    }

    pub fn enter_sql_mode(&mut self) {
        self.mode = Mode::Sql;
        self.sql_focus = SqlFocus::Editor;
    }

    /// Show a warning modal with OK button
    pub fn show_warning(&mut self, message: &str) {
        self.warning_message = Some(message.to_string());
        self.mode = Mode::Warning;
    }

    pub fn exit_mode(&mut self) {
        self.mode = Mode::Normal;
        self.pending_action = None;
        self.describe_title = None;
        self.describe_data = None;
        self.describe_text = None;
        self.describe_band = None;
        self.warning_message = None;
    }

    // =========================================================================
    // Resource Navigation
    // =========================================================================

    /// Navigate to a resource (top-level)
    pub fn navigate_to_resource(&mut self, resource_key: &str) {
        if get_resource(resource_key).is_none() {
            self.notifications
                .warning(format!("Unknown resource: {}", resource_key));
            return;
        }

        self.parent_context = None;
        self.navigation_stack.clear();
        self.resource_key = resource_key.to_string();
        self.selected = 0;
        self.filter = FilterState::default();
        self.filter_active = false;
        self.mode = Mode::Normal;

        self.apply_filter();
        self.refresh();
    }

    /// Navigate to sub-resource with parent context
    pub fn navigate_to_sub_resource(&mut self, sub_resource_key: &str) {
        let Some(selected_item) = self.selected_item().cloned() else {
            return;
        };
        let Some(current_resource) = self.current_resource() else {
            return;
        };

        let is_valid = current_resource
            .sub_resources
            .iter()
            .any(|s| s.resource_key == sub_resource_key);
        if !is_valid {
            self.notifications.warning(format!(
                "{} is not a sub-resource of {}",
                sub_resource_key, self.resource_key
            ));
            return;
        }

        let display_name = current_resource.item_name(&selected_item);

        if let Some(ctx) = self.parent_context.take() {
            self.navigation_stack.push(ctx);
        }
        self.parent_context = Some(ParentContext {
            resource_key: self.resource_key.clone(),
            item: selected_item,
            display_name,
        });

        self.resource_key = sub_resource_key.to_string();
        self.selected = 0;
        self.filter = FilterState::default();
        self.filter_active = false;

        // A collection fetched under another parent is a different collection
        let parents = self.parent_items();
        self.stores
            .insert(self.resource_key.clone(), ResourceStore::new(parents));
        self.apply_filter();
        self.refresh();
    }

    /// Navigate back to parent resource
    pub fn navigate_back(&mut self) {
        if let Some(parent) = self.parent_context.take() {
            self.stores.remove(&self.resource_key);
            self.parent_context = self.navigation_stack.pop();

            self.resource_key = parent.resource_key;
            self.selected = 0;
            self.filter = FilterState::default();
            self.filter_active = false;

            self.apply_filter();
            if let Some(pos) = self.filtered_items.iter().position(|i| *i == parent.item) {
                self.selected = pos;
            }
            self.refresh();
        }
    }

    /// Get breadcrumb path
    pub fn get_breadcrumb(&self) -> Vec<String> {
        let mut path: Vec<String> = self
            .navigation_stack
            .iter()
            .chain(self.parent_context.iter())
            .map(|ctx| format!("{}:{}", ctx.resource_key, ctx.display_name))
            .collect();
        path.push(self.resource_key.clone());
        path
    }

    // =========================================================================
    // Command Execution
    // =========================================================================

    pub fn execute_command(&mut self) -> bool {
        // Use preview if user navigated to a suggestion, otherwise use typed text
        let command_text = if self.command_text.is_empty() {
            self.command_preview.clone().unwrap_or_default()
        } else if let Some(preview) = &self.command_preview {
            if preview.contains(&self.command_text) {
                preview.clone()
            } else {
                self.command_text.clone()
            }
        } else {
            self.command_text.clone()
        };

        let Some(cmd) = command_text.split_whitespace().next() else {
            self.mode = Mode::Normal;
            return false;
        };

        self.mode = Mode::Normal;
        match cmd {
            "q" | "quit" => return true,
            "back" => self.navigate_back(),
            "sql" => self.enter_sql_mode(),
            _ => {
                let is_sub = self
                    .current_resource()
                    .is_some_and(|r| r.sub_resources.iter().any(|s| s.resource_key == cmd));
                if is_sub && self.selected_item().is_some() {
                    self.navigate_to_sub_resource(cmd);
                } else if top_level_resource_keys().iter().any(|k| *k == cmd) {
                    self.navigate_to_resource(cmd);
                } else {
                    self.notifications
                        .warning(format!("Unknown command: {}", cmd));
                }
            }
        }
        false
    }

    // =========================================================================
    // Action Execution
    // =========================================================================

    /// Find action by shortcut key and return its index
    pub fn find_action_by_shortcut(&self, shortcut: &str) -> Option<usize> {
        self.current_resource()?
            .actions
            .iter()
            .position(|a| a.shortcut.as_deref() == Some(shortcut))
    }

    /// Find sub-resource by shortcut key and return its resource_key
    pub fn find_sub_resource_by_shortcut(&self, shortcut: &str) -> Option<String> {
        self.selected_item()?;

        self.current_resource()?
            .sub_resources
            .iter()
            .find(|s| s.shortcut == shortcut)
            .map(|s| s.resource_key.clone())
    }

    /// Get action hints for the current resource (for display in header)
    pub fn get_action_hints(&self) -> Vec<(String, String)> {
        let Some(resource) = self.current_resource() else {
            return Vec::new();
        };

        resource
            .actions
            .iter()
            .filter_map(|a| {
                a.shortcut
                    .as_ref()
                    .map(|s| (s.clone(), a.display_name.clone()))
            })
            .collect()
    }

    /// Trigger an action by index: open its form, ask for confirmation or run it
    pub fn trigger_action(&mut self, action_index: usize) {
        let Some(resource) = self.current_resource() else {
            return;
        };
        let Some(action) = resource.actions.get(action_index) else {
            return;
        };

        if self.readonly && is_mutating(action) {
            self.show_warning("This operation is not supported in read-only mode");
            return;
        }

        let item = match action.scope {
            ActionScope::Item => match self.selected_item() {
                Some(item) => Some(item.clone()),
                None => {
                    self.show_warning("No item selected");
                    return;
                }
            },
            ActionScope::Collection => None,
        };

        let target = item.as_ref().and_then(|i| resource.natural_key(i));
        if self
            .busy
            .is_busy(&busy_key(&self.resource_key, action_index, target.as_deref()))
        {
            debug!("'{}' already running, trigger ignored", action.display_name);
            return;
        }

        if let Some(form_def) = &action.form {
            let state = FormState::new(form_def, item.as_ref());
            if let Some(preload) = &form_def.preload {
                let parents = self.parent_items();
                let scope = Scope {
                    key: target.as_deref(),
                    item: item.as_ref(),
                    parents: &parents,
                    form: None,
                };
                match ActionRequest::resolve(preload, None, &scope) {
                    Ok(request) => {
                        let backend = Arc::clone(&self.backend);
                        let resource_key = self.resource_key.clone();
                        self.spawn(async move {
                            let result = execute(backend.as_ref(), &request).await;
                            AppEvent::FormPreloaded {
                                resource_key,
                                action_index,
                                result,
                            }
                        });
                    }
                    Err(e) => warn!("Preload of '{}' skipped: {}", action.display_name, e),
                }
            }
            self.form = Some(ActiveForm {
                target: FormTarget::Action {
                    resource_key: self.resource_key.clone(),
                    action_index,
                    item,
                },
                state,
            });
            self.mode = Mode::Form;
            return;
        }

        self.confirm_or_dispatch(action_index, item, None);
    }

    /// Validate the open form and continue with confirmation or the call
    pub fn submit_form(&mut self) {
        let Some(form) = &self.form else {
            return;
        };
        let target = form.target.clone();
        let values = match form.state.collect() {
            Ok(values) => values,
            Err(e) => {
                self.notifications.report(&e);
                return;
            }
        };

        let (resource_key, action_index, item) = match target {
            FormTarget::SqlCommand => {
                self.submit_sql_command(&values);
                return;
            }
            FormTarget::Action {
                resource_key,
                action_index,
                item,
            } => (resource_key, action_index, item),
        };
        let Some(action) = get_resource(&resource_key).and_then(|r| r.actions.get(action_index))
        else {
            return;
        };
        if let Some(tool) = action.tool.as_deref().and_then(Tool::from_name) {
            if let Err(e) = tool.precheck(&values) {
                self.notifications.report(&e);
                return;
            }
        }

        self.confirm_or_dispatch(action_index, item, Some(values));
    }

    pub fn cancel_form(&mut self) {
        let back_to_sql = self.form.as_ref().is_some_and(ActiveForm::saves_sql);
        self.form = None;
        self.mode = if back_to_sql { Mode::Sql } else { Mode::Normal };
    }

    fn confirm_or_dispatch(&mut self, action_index: usize, item: Option<Value>, values: Option<Value>) {
        let Some(resource) = self.current_resource() else {
            return;
        };
        let Some(action) = resource.actions.get(action_index) else {
            return;
        };

        let Some(confirm) = &action.confirm else {
            self.dispatch_action(action_index, item, values);
            return;
        };

        let key = item.as_ref().and_then(|i| resource.natural_key(i));
        let parents = self.parent_items();
        let scope = Scope {
            key: key.as_deref(),
            item: item.as_ref(),
            parents: &parents,
            form: values.as_ref(),
        };
        let message = substitute_text(&confirm.message, &scope);

        self.pending_action = Some(PendingAction {
            message,
            destructive: confirm.destructive,
            selected_yes: false, // Default to No for safety
            kind: PendingKind::Action {
                resource_key: self.resource_key.clone(),
                action_index,
                item,
                values,
            },
        });
        self.mode = Mode::Confirm;
    }

    fn dispatch_action(&mut self, action_index: usize, item: Option<Value>, values: Option<Value>) {
        let Some(resource) = self.current_resource() else {
            return;
        };
        let Some(action) = resource.actions.get(action_index) else {
            return;
        };

        let key = item.as_ref().and_then(|i| resource.natural_key(i));
        let parents = self.parent_items();
        let scope = Scope {
            key: key.as_deref(),
            item: item.as_ref(),
            parents: &parents,
            form: values.as_ref(),
        };
        let request = match ActionRequest::for_action(action, &scope) {
            Ok(request) => request,
            Err(e) => {
                self.notifications.report(&e);
                return;
            }
        };

        let busy = busy_key(&self.resource_key, action_index, key.as_deref());
        if !self.busy.try_acquire(&busy) {
            debug!("'{}' already running, trigger ignored", action.display_name);
            return;
        }

        info!(
            "Executing action '{}' on {}",
            action.display_name, resource.display_name
        );
        let backend = Arc::clone(&self.backend);
        let resource_key = self.resource_key.clone();
        self.spawn(async move {
            let result = execute(backend.as_ref(), &request).await;
            AppEvent::ActionDone {
                resource_key,
                action_index,
                item,
                busy,
                result,
            }
        });
    }

    fn finish_action(
        &mut self,
        resource_key: &str,
        action_index: usize,
        item: Option<&Value>,
        result: ConsoleResult<Reply>,
    ) {
        let Some(resource) = get_resource(resource_key) else {
            return;
        };
        let Some(action) = resource.actions.get(action_index) else {
            return;
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                // The form stays open with its values for resubmission
                warn!("Action '{}' failed: {}", action.display_name, e);
                self.notifications.report(&e);
                return;
            }
        };

        let target = item.map(|i| resource.item_name(i));
        self.notifications
            .success(success_text(action, &reply, target.as_deref()));

        let form_done = self
            .form
            .as_ref()
            .is_some_and(|f| f.is_for_action(resource_key, action_index));
        if form_done {
            self.form = None;
            if self.mode == Mode::Form {
                self.mode = Mode::Normal;
            }
        }

        if let Some(port) = reply.get("local_port").and_then(Value::as_u64) {
            let tunnel_id = match resource_key {
                "db-tunnels" => item.and_then(|i| i.get("id")).and_then(Value::as_i64),
                _ => reply.get("tunnel_id").and_then(Value::as_i64),
            };
            self.connection.use_tunnel(port, tunnel_id);
            self.notifications
                .info(format!("SQL connection now targets localhost:{}", port));
        }

        if action.show_result {
            self.show_result(action, &reply);
        }

        if action.transition {
            self.schedule_refresh(resource_key);
        } else if is_mutating(action) {
            self.refresh_resource(resource_key);
        }
        for cascade in &action.refresh {
            self.refresh_resource(cascade);
        }
    }

    fn show_result(&mut self, action: &ActionDef, reply: &Reply) {
        self.describe_scroll = 0;
        self.describe_title = Some(action.display_name.clone());
        self.describe_band = None;
        self.describe_text = None;
        self.describe_data = Some(reply.data());

        if action.tool.as_deref().and_then(Tool::from_name) == Some(Tool::ApiTest) {
            if let Some(response) = TestResponse::from_reply(reply) {
                self.describe_band = Some(response.band());
                self.describe_text = Some(response.render());
            }
        }
        self.mode = Mode::Describe;
    }

    /// Execute the pending action
    pub fn execute_pending_action(&mut self) {
        let Some(pending) = self.pending_action.take() else {
            return;
        };

        if !pending.selected_yes {
            self.cancel_pending(pending);
            return;
        }

        match pending.kind {
            PendingKind::Action {
                resource_key,
                action_index,
                item,
                values,
            } => {
                self.mode = if self.form.is_some() {
                    Mode::Form
                } else {
                    Mode::Normal
                };
                if resource_key != self.resource_key {
                    debug!(
                        "Confirmed action #{} of {} dropped, {} is shown now",
                        action_index, resource_key, self.resource_key
                    );
                    self.notifications
                        .warning("Panel changed before the action ran; nothing was sent");
                    return;
                }
                self.dispatch_action(action_index, item, values);
            }
            PendingKind::RemoveFavorite { resource_key, key } => {
                self.mode = Mode::Favorites;
                self.remove_favorite(&resource_key, &key);
            }
        }
    }

    /// Declined confirmation: nothing is sent
    pub fn decline_pending(&mut self) {
        if let Some(pending) = self.pending_action.take() {
            self.cancel_pending(pending);
        }
    }

    fn cancel_pending(&mut self, pending: PendingAction) {
        debug!("Confirmation declined: {}", pending.message);
        self.mode = match pending.kind {
            PendingKind::RemoveFavorite { .. } => Mode::Favorites,
            PendingKind::Action { .. } if self.form.is_some() => Mode::Form,
            PendingKind::Action { .. } => Mode::Normal,
        };
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    /// Star or unstar the selected row
    pub fn toggle_favorite(&mut self) {
        if self.readonly {
            self.show_warning("This operation is not supported in read-only mode");
            return;
        }
        let Some(resource) = self.current_resource() else {
            return;
        };
        let Some(fav) = resource.favorites.as_ref() else {
            self.notifications.info("This panel has no favorites");
            return;
        };
        let Some(key) = self.selected_item().and_then(|i| resource.natural_key(i)) else {
            return;
        };

        let busy = format!("favorite:{}:{}", self.resource_key, key);
        if !self.busy.try_acquire(&busy) {
            return;
        }

        let backend = Arc::clone(&self.backend);
        let resource_key = self.resource_key.clone();
        self.spawn(async move {
            let result = favorites::toggle(backend.as_ref(), fav, &key).await;
            AppEvent::FavoriteToggled {
                resource_key,
                key,
                busy,
                result,
            }
        });
    }

    /// Ask before removing the selected record of the favorites tab
    pub fn request_remove_favorite(&mut self) {
        if self.readonly {
            self.show_warning("This operation is not supported in read-only mode");
            return;
        }
        let Some(record) = self.visible_favorites().get(self.favorites_selected).cloned() else {
            return;
        };
        self.pending_action = Some(PendingAction {
            message: format!("Remove '{}' from favorites?", record.natural_key),
            destructive: false,
            selected_yes: false,
            kind: PendingKind::RemoveFavorite {
                resource_key: self.resource_key.clone(),
                key: record.natural_key,
            },
        });
        self.mode = Mode::Confirm;
    }

    fn remove_favorite(&mut self, resource_key: &str, key: &str) {
        let Some(fav) = get_resource(resource_key).and_then(|r| r.favorites.as_ref()) else {
            return;
        };
        let busy = format!("favorite:{}:{}", resource_key, key);
        if !self.busy.try_acquire(&busy) {
            return;
        }
        let backend = Arc::clone(&self.backend);
        let resource_key = resource_key.to_string();
        let key = key.to_string();
        self.spawn(async move {
            let result = favorites::remove(backend.as_ref(), fav, &key).await;
            AppEvent::FavoriteRemoved {
                resource_key,
                key,
                busy,
                result,
            }
        });
    }

    /// Jump from the favorites tab to the matching row of the main list
    pub fn open_selected_favorite(&mut self) {
        let Some(record) = self.visible_favorites().get(self.favorites_selected).cloned() else {
            return;
        };
        self.mode = Mode::Normal;
        self.filter.text = record.natural_key.clone();
        self.filter.favorites_only = false;
        self.apply_filter();
        let Some(resource) = self.current_resource() else {
            return;
        };
        if let Some(pos) = self
            .filtered_items
            .iter()
            .position(|i| resource.natural_key(i).as_deref() == Some(record.natural_key.as_str()))
        {
            self.selected = pos;
        }
    }

    // =========================================================================
    // SQL Runner
    // =========================================================================

    pub fn run_active_query(&mut self) {
        let (tab_id, sql) = {
            let tab = self.sql.active();
            (tab.id, tab.sql.clone())
        };
        if sql.trim().is_empty() {
            self.notifications.warning("Enter a SQL query");
            return;
        }
        if let Err(e) = self.connection.validate() {
            self.notifications.report(&e);
            return;
        }
        if self.sql.active().output == TabOutput::Running {
            return;
        }
        self.sql.active_mut().output = TabOutput::Running;

        let backend = Arc::clone(&self.backend);
        let conn = self.connection.clone();
        self.spawn(async move {
            let result = sql_tabs::execute_query(backend.as_ref(), &conn, &sql).await;
            AppEvent::QueryDone { tab_id, result }
        });
    }

    pub fn new_sql_tab(&mut self) {
        self.sql.create();
        self.sql_focus = SqlFocus::Editor;
    }

    /// Activate the n-th tab (1-based, as shown in the tab bar)
    pub fn switch_sql_tab(&mut self, position: usize) {
        let Some(id) = self.sql.tabs().get(position.wrapping_sub(1)).map(|t| t.id) else {
            return;
        };
        if let Err(e) = self.sql.switch(id) {
            self.notifications.warning(e.to_string());
        }
    }

    pub fn close_sql_tab(&mut self) {
        let id = self.sql.active().id;
        if let Err(e) = self.sql.close(id) {
            self.notifications.warning(e.to_string());
        }
    }

    pub fn test_sql_connection(&mut self) {
        if let Err(e) = self.connection.validate() {
            self.notifications.report(&e);
            return;
        }
        let backend = Arc::clone(&self.backend);
        let conn = self.connection.clone();
        self.spawn(async move {
            let result = sql_tabs::test_connection(backend.as_ref(), &conn).await;
            AppEvent::ConnectionTested { result }
        });
    }

    pub fn list_sql_tables(&mut self) {
        if let Err(e) = self.connection.validate() {
            self.notifications.report(&e);
            return;
        }
        let backend = Arc::clone(&self.backend);
        let conn = self.connection.clone();
        self.spawn(async move {
            let result = sql_tabs::get_tables(backend.as_ref(), &conn).await;
            AppEvent::TablesListed { result }
        });
    }

    /// Ask for a name and description, then save the active tab's SQL
    pub fn save_sql_command(&mut self) {
        if self.readonly {
            self.show_warning("This operation is not supported in read-only mode");
            return;
        }
        if self.sql.active().sql.trim().is_empty() {
            self.notifications.warning("Enter a SQL query");
            return;
        }
        if self.busy.is_busy(SAVE_COMMAND_BUSY) {
            debug!("SQL command save already running, trigger ignored");
            return;
        }
        let Some(def) = get_form("save-sql-command") else {
            return;
        };
        self.form = Some(ActiveForm {
            target: FormTarget::SqlCommand,
            state: FormState::new(def, None),
        });
        self.mode = Mode::Form;
    }

    fn submit_sql_command(&mut self, values: &Value) {
        let name = values
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let description = values
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let sql = self.sql.active().sql.clone();

        if !self.busy.try_acquire(SAVE_COMMAND_BUSY) {
            debug!("SQL command save already running, submit ignored");
            return;
        }
        info!("Saving SQL command '{}'", name);
        let backend = Arc::clone(&self.backend);
        let conn = self.connection.clone();
        self.spawn(async move {
            let result = sql_tabs::save_command(
                backend.as_ref(),
                &conn,
                &name,
                description.as_deref(),
                &sql,
            )
            .await;
            AppEvent::CommandSaved { result }
        });
    }

    /// Put `SELECT * FROM <table>` in the active tab
    pub fn use_selected_table(&mut self) {
        if let Some(table) = self.sql_tables.get(self.sql_table_selected) {
            self.sql.active_mut().sql = sql_tabs::select_template(table);
            self.sql_focus = SqlFocus::Editor;
        }
    }

    /// Load a saved command from the sql-commands panel into the active tab
    pub fn load_selected_command(&mut self) -> bool {
        if self.resource_key != "sql-commands" {
            return false;
        }
        let Some(sql) = self
            .selected_item()
            .and_then(|i| i.get("sql_command"))
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            return false;
        };
        self.sql.active_mut().sql = sql;
        self.enter_sql_mode();
        true
    }

    pub fn cycle_sql_focus(&mut self) {
        self.sql_focus = match self.sql_focus {
            SqlFocus::Editor => SqlFocus::Connection(0),
            SqlFocus::Connection(_) if !self.sql_tables.is_empty() => SqlFocus::Tables,
            SqlFocus::Connection(_) | SqlFocus::Tables => SqlFocus::Editor,
        };
    }

    pub fn sql_field_step(&mut self, forward: bool) {
        match self.sql_focus {
            SqlFocus::Connection(i) => {
                let n = CONNECTION_FIELDS.len();
                let next = if forward { (i + 1) % n } else { (i + n - 1) % n };
                self.sql_focus = SqlFocus::Connection(next);
            }
            SqlFocus::Tables => {
                if forward {
                    self.sql_table_selected = (self.sql_table_selected + 1)
                        .min(self.sql_tables.len().saturating_sub(1));
                } else {
                    self.sql_table_selected = self.sql_table_selected.saturating_sub(1);
                }
            }
            SqlFocus::Editor => {}
        }
    }

    pub fn sql_input(&mut self, c: char) {
        match self.sql_focus {
            SqlFocus::Editor => self.sql.active_mut().sql.push(c),
            SqlFocus::Connection(0) => self.connection.cycle_engine(),
            SqlFocus::Connection(i) => {
                if let Some(field) = self.connection.field_mut(i) {
                    field.push(c);
                }
            }
            SqlFocus::Tables => {}
        }
    }

    pub fn sql_backspace(&mut self) {
        match self.sql_focus {
            SqlFocus::Editor => {
                self.sql.active_mut().sql.pop();
            }
            SqlFocus::Connection(i) if i > 0 => {
                if let Some(field) = self.connection.field_mut(i) {
                    field.pop();
                }
            }
            _ => {}
        }
    }
}

fn is_mutating(action: &ActionDef) -> bool {
    parse_method(&action.api.method) != Method::GET
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::error::ConsoleError;
    use crate::notify::Level;
    use serde_json::json;

    fn test_config() -> Config {
        Config {
            transition_refresh_delay_ms: Some(0),
            ..Default::default()
        }
    }

    fn app_on(mock: &Arc<MockBackend>, panel: &str) -> App {
        App::new(mock.clone(), &test_config(), false, Some(panel))
    }

    fn action_index(app: &App, name: &str) -> usize {
        app.current_resource()
            .unwrap()
            .actions
            .iter()
            .position(|a| a.display_name == name)
            .unwrap()
    }

    fn select(app: &mut App, key_field: &str, key: &str) {
        app.selected = app
            .filtered_items
            .iter()
            .position(|i| i[key_field] == key)
            .unwrap();
    }

    fn queues_mock() -> Arc<MockBackend> {
        let mock = Arc::new(MockBackend::new());
        mock.on(
            Method::GET,
            "/messaging/sqs/queues",
            json!({"success": true, "queues": [
                {"name": "orders", "url": "https://sqs/1/orders", "messages_available": 5},
                {"name": "dead-letter", "url": "https://sqs/1/dead-letter", "messages_available": 0}
            ]}),
        );
        mock
    }

    #[tokio::test]
    async fn test_refresh_and_filter_queues() {
        let mock = queues_mock();
        let mut app = app_on(&mock, "sqs-queues");
        app.refresh();
        app.settle().await;
        assert_eq!(app.filtered_items.len(), 2);

        for c in "order".chars() {
            app.push_filter_char(c);
        }
        assert_eq!(app.filtered_items.len(), 1);
        assert_eq!(app.filtered_items[0]["name"], "orders");

        app.clear_filter();
        "xyz".chars().for_each(|c| app.push_filter_char(c));
        assert!(app.filtered_items.is_empty());
        assert_eq!(app.current_store().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_rows_inline() {
        // first listing succeeds, the one after it is refused
        let mock = queues_mock();
        mock.fail(
            Method::GET,
            "/messaging/sqs/queues",
            ConsoleError::Transport("connection refused".into()),
        );
        let mut app = app_on(&mock, "sqs-queues");
        app.refresh();
        app.settle().await;
        assert_eq!(app.filtered_items.len(), 2);

        app.refresh();
        app.settle().await;

        let store = app.current_store().unwrap();
        assert!(store.is_stale());
        assert!(store.last_error().unwrap().contains("connection refused"));
        assert_eq!(app.filtered_items.len(), 2);
        assert!(app.notifications.is_empty());
    }

    #[tokio::test]
    async fn test_favorites_failure_degrades_to_empty() {
        let mock = Arc::new(MockBackend::new());
        mock.on(
            Method::GET,
            "/secrets/list",
            json!({"success": true, "secrets": [{"name": "db/prod"}]}),
        );
        mock.fail(
            Method::GET,
            "/secrets/favorites",
            ConsoleError::Decode {
                status: 500,
                body: "boom".into(),
            },
        );
        let mut app = app_on(&mock, "secrets");
        app.refresh();
        app.settle().await;

        assert_eq!(app.filtered_items.len(), 1);
        assert!(app.current_store().unwrap().favorites().is_empty());
        assert!(!app.current_store().unwrap().is_stale());
    }

    #[tokio::test]
    async fn test_declined_destructive_action_sends_nothing() {
        let mock = queues_mock();
        let mut app = app_on(&mock, "sqs-queues");
        app.refresh();
        app.settle().await;
        let before = mock.call_count();

        select(&mut app, "name", "orders");
        app.trigger_action(action_index(&app, "Purge"));
        assert_eq!(app.mode, Mode::Confirm);
        assert!(app.pending_action.as_ref().unwrap().destructive);

        app.decline_pending();
        app.settle().await;
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(mock.call_count(), before);

        // Enter on the default "No" also declines
        app.trigger_action(action_index(&app, "Delete Queue"));
        app.execute_pending_action();
        app.settle().await;
        assert_eq!(mock.call_count(), before);
    }

    #[tokio::test]
    async fn test_confirmed_delete_sends_body_and_refreshes() {
        let mock = queues_mock();
        let mut app = app_on(&mock, "sqs-queues");
        app.refresh();
        app.settle().await;

        select(&mut app, "name", "orders");
        app.trigger_action(action_index(&app, "Delete Queue"));
        app.pending_action.as_mut().unwrap().selected_yes = true;
        app.execute_pending_action();
        app.settle().await;

        let deletes = mock.calls_to(Method::DELETE, "/messaging/sqs/queues");
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].body, Some(json!({"queue_url": "https://sqs/1/orders"})));
        assert_eq!(mock.calls_to(Method::GET, "/messaging/sqs/queues").len(), 2);
        assert_eq!(app.notifications.latest().unwrap().level, Level::Success);
    }

    #[tokio::test]
    async fn test_empty_owner_name_warns_without_request() {
        let mock = Arc::new(MockBackend::new());
        let mut app = app_on(&mock, "catalog-owners");
        let create = app.current_resource().unwrap().create_action().unwrap();

        app.trigger_action(create);
        assert_eq!(app.mode, Mode::Form);
        app.submit_form();
        app.settle().await;

        assert_eq!(app.notifications.latest().unwrap().level, Level::Warning);
        assert!(mock.calls_to(Method::POST, "/api-catalog/owners").is_empty());
        assert_eq!(app.mode, Mode::Form);
    }

    #[tokio::test]
    async fn test_secret_create_sends_string_encoded_pairs() {
        let mock = Arc::new(MockBackend::new());
        let mut app = app_on(&mock, "secrets");
        let create = app.current_resource().unwrap().create_action().unwrap();

        app.trigger_action(create);
        let form = &mut app.form.as_mut().unwrap().state;
        form.set("name", "db/creds");
        form.set("secret_value_type", "json");
        form.set("secret_pairs", "user=a, pass=b");
        app.submit_form();
        app.settle().await;

        let posts = mock.calls_to(Method::POST, "/secrets/create");
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].body,
            Some(json!({
                "name": "db/creds",
                "secret_value": "{\"user\":\"a\",\"pass\":\"b\"}",
                "description": null
            }))
        );
        assert!(app.form.is_none());
        assert_eq!(app.mode, Mode::Normal);
    }

    #[tokio::test]
    async fn test_rejected_create_keeps_form_and_lists_errors() {
        let mock = Arc::new(MockBackend::new());
        mock.on(
            Method::POST,
            "/api-catalog/owners",
            json!({"success": false, "message": "Owner already exists", "errors": ["name: duplicate"]}),
        );
        let mut app = app_on(&mock, "catalog-owners");
        app.trigger_action(app.current_resource().unwrap().create_action().unwrap());
        app.form.as_mut().unwrap().state.set("name", "payments");
        app.submit_form();
        app.settle().await;

        let latest = app.notifications.latest().unwrap();
        assert_eq!(latest.level, Level::Danger);
        assert_eq!(latest.message, "Owner already exists\n• name: duplicate");
        assert_eq!(app.mode, Mode::Form);
        assert_eq!(
            app.form.as_ref().unwrap().state.value_of("name"),
            Some("payments")
        );
        assert!(app.busy.is_empty());
    }

    #[tokio::test]
    async fn test_owner_delete_cascades() {
        let mock = Arc::new(MockBackend::new());
        mock.on(
            Method::GET,
            "/api-catalog/owners",
            json!({"success": true, "owners": [{"id": 4, "name": "core"}]}),
        );
        let mut app = app_on(&mock, "catalog-owners");
        app.refresh();
        app.settle().await;

        app.trigger_action(action_index(&app, "Delete Owner"));
        app.pending_action.as_mut().unwrap().selected_yes = true;
        app.execute_pending_action();
        app.settle().await;

        assert_eq!(mock.calls_to(Method::DELETE, "/api-catalog/owners/4").len(), 1);
        assert_eq!(mock.calls_to(Method::GET, "/api-catalog/apis").len(), 1);
        assert_eq!(mock.calls_to(Method::GET, "/api-catalog/authentications").len(), 1);
        assert_eq!(mock.calls_to(Method::GET, "/api-catalog/owners").len(), 2);
    }

    #[tokio::test]
    async fn test_busy_action_ignores_second_trigger() {
        let mock = Arc::new(MockBackend::new());
        mock.on(
            Method::GET,
            "/ec2/instances",
            json!({"success": true, "instances": [{"instance_id": "i-1", "name": "web", "state": "stopped"}]}),
        );
        let mut app = app_on(&mock, "ec2-instances");
        app.refresh();
        app.settle().await;

        let start = action_index(&app, "Start");
        for _ in 0..2 {
            app.trigger_action(start);
            if app.mode == Mode::Confirm {
                app.pending_action.as_mut().unwrap().selected_yes = true;
                app.execute_pending_action();
            }
        }
        app.settle().await;

        assert_eq!(mock.calls_to(Method::POST, "/ec2/instances/i-1/start").len(), 1);
        // transition: a single delayed re-fetch
        assert_eq!(mock.calls_to(Method::GET, "/ec2/instances").len(), 2);
        assert!(app.busy.is_empty());
    }

    #[tokio::test]
    async fn test_readonly_blocks_mutations_but_not_reads() {
        let mock = Arc::new(MockBackend::new());
        mock.on(
            Method::GET,
            "/parameters/list",
            json!({"success": true, "parameters": [{"name": "/app/db"}]}),
        );
        let mut app = App::new(mock.clone(), &test_config(), true, Some("parameters"));
        app.refresh();
        app.settle().await;

        app.trigger_action(action_index(&app, "Delete Parameter"));
        assert_eq!(app.mode, Mode::Warning);
        app.exit_mode();

        app.trigger_action(action_index(&app, "History"));
        app.settle().await;
        assert_eq!(mock.calls_to(Method::GET, "/parameters/%2Fapp%2Fdb/history").len(), 1);
        assert_eq!(app.mode, Mode::Describe);
    }

    #[tokio::test]
    async fn test_star_toggle_updates_list_and_reloads_favorites() {
        let mock = Arc::new(MockBackend::new());
        mock.on(
            Method::GET,
            "/cloudwatch/log-groups",
            json!({"success": true, "log_groups": [{"name": "/aws/lambda/fn"}, {"name": "/aws/ecs/api"}]}),
        );
        mock.on(
            Method::GET,
            "/cloudwatch/favorites",
            json!({"success": true, "favorites": []}),
        );
        mock.on(
            Method::GET,
            "/cloudwatch/favorites",
            json!({"success": true, "favorites": [{"log_group_name": "/aws/lambda/fn", "alias": null}]}),
        );
        mock.on(
            Method::GET,
            "/cloudwatch/favorites/check/%2Faws%2Flambda%2Ffn",
            json!({"success": true, "is_favorite": false}),
        );
        let mut app = app_on(&mock, "log-groups");
        app.refresh();
        app.settle().await;

        select(&mut app, "name", "/aws/lambda/fn");
        app.toggle_favorite();
        app.settle().await;

        let item = app.selected_item().cloned().unwrap();
        assert!(app.is_favorite_item(&item));
        assert_eq!(
            mock.calls_to(Method::POST, "/cloudwatch/favorites")[0].body,
            Some(json!({"log_group_name": "/aws/lambda/fn"}))
        );
        assert_eq!(mock.calls_to(Method::GET, "/cloudwatch/favorites").len(), 2);

        app.toggle_favorites_only();
        assert_eq!(app.filtered_items.len(), 1);
    }

    #[tokio::test]
    async fn test_favorites_tab_removal_needs_confirmation() {
        let mock = Arc::new(MockBackend::new());
        mock.on(
            Method::GET,
            "/rds/instances",
            json!({"success": true, "instances": []}),
        );
        mock.on(
            Method::GET,
            "/rds/favorites",
            json!({"success": true, "favorites": [{"instance_identifier": "gone-db"}]}),
        );
        let mut app = app_on(&mock, "rds-instances");
        app.refresh();
        app.settle().await;

        app.enter_favorites_mode();
        assert_eq!(app.visible_favorites().len(), 1);
        app.request_remove_favorite();
        assert_eq!(app.mode, Mode::Confirm);
        app.decline_pending();
        assert_eq!(app.mode, Mode::Favorites);
        assert!(mock.calls_to(Method::DELETE, "/rds/favorites/gone-db").is_empty());

        app.request_remove_favorite();
        app.pending_action.as_mut().unwrap().selected_yes = true;
        app.execute_pending_action();
        app.settle().await;
        assert_eq!(mock.calls_to(Method::DELETE, "/rds/favorites/gone-db").len(), 1);
    }

    #[tokio::test]
    async fn test_sub_resource_navigation() {
        let mock = Arc::new(MockBackend::new());
        mock.on(
            Method::GET,
            "/ecs/clusters",
            json!({"success": true, "clusters": [{"name": "prod"}]}),
        );
        mock.on(
            Method::GET,
            "/ecs/clusters/prod/services",
            json!({"success": true, "services": [{"name": "api", "desired_count": 2}]}),
        );
        let mut app = app_on(&mock, "ecs-clusters");
        app.refresh();
        app.settle().await;

        let sub = app.find_sub_resource_by_shortcut("s").unwrap();
        app.navigate_to_sub_resource(&sub);
        app.settle().await;
        assert_eq!(app.resource_key, "ecs-services");
        assert_eq!(app.filtered_items.len(), 1);
        assert_eq!(app.get_breadcrumb(), vec!["ecs-clusters:prod", "ecs-services"]);

        app.trigger_action(action_index(&app, "Start"));
        app.form.as_mut().unwrap().state.set("desired_count", "4");
        app.submit_form();
        app.settle().await;
        let calls = mock.calls_to(Method::POST, "/ecs/clusters/prod/services/api/start");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body.as_ref().unwrap()["desired_count"], json!(4));

        app.navigate_back();
        app.settle().await;
        assert_eq!(app.resource_key, "ecs-clusters");
        assert!(!app.stores.contains_key("ecs-services"));
    }

    #[tokio::test]
    async fn test_api_test_preloads_and_shows_response() {
        let mock = Arc::new(MockBackend::new());
        mock.on(
            Method::GET,
            "/api-catalog/apis",
            json!({"success": true, "apis": [{"id": 1, "name": "billing"}]}),
        );
        mock.on(
            Method::GET,
            "/api-catalog/endpoints?api_id=1",
            json!({"success": true, "endpoints": [{"id": 2, "path": "/invoices"}]}),
        );
        mock.on(
            Method::GET,
            "/api-catalog/requests?endpoint_id=2",
            json!({"success": true, "requests": [{"id": 3, "name": "list"}]}),
        );
        mock.on(
            Method::GET,
            "/api-catalog/test-params/3",
            json!({"success": true, "body": "", "query_params": "{\"page\": 1}", "headers": null}),
        );
        mock.on(
            Method::POST,
            "/api-catalog/test/3",
            json!({"success": true, "response": {"status_code": 404, "headers": {}, "json": null, "body": "nope"}}),
        );
        let mut app = app_on(&mock, "catalog-apis");
        app.refresh();
        app.settle().await;
        app.navigate_to_sub_resource("catalog-endpoints");
        app.settle().await;
        app.navigate_to_sub_resource("catalog-requests");
        app.settle().await;

        app.trigger_action(action_index(&app, "Test Request"));
        app.settle().await;
        assert_eq!(
            app.form.as_ref().unwrap().state.value_of("query_params"),
            Some("{\"page\": 1}")
        );

        app.submit_form();
        app.settle().await;
        let sent = mock.calls_to(Method::POST, "/api-catalog/test/3");
        assert_eq!(
            sent[0].body,
            Some(json!({"body": null, "query_params": {"page": 1}, "headers": null}))
        );
        assert_eq!(app.mode, Mode::Describe);
        assert_eq!(app.describe_band, Some(StatusBand::Danger));
        assert_eq!(
            app.notifications.latest().unwrap().message,
            "Parameters saved automatically"
        );
    }

    #[tokio::test]
    async fn test_sql_tabs_and_query() {
        let mock = Arc::new(MockBackend::new());
        mock.on(
            Method::POST,
            "/db-query/execute-query",
            json!({"success": true, "columns": ["n"], "rows": [[1]], "execution_time": 0.01}),
        );
        let mut app = app_on(&mock, "db-tunnels");
        app.enter_sql_mode();

        app.close_sql_tab();
        assert_eq!(app.sql.len(), 1);
        assert_eq!(app.notifications.latest().unwrap().level, Level::Warning);

        "select 1".chars().for_each(|c| app.sql_input(c));
        app.run_active_query();
        assert!(mock.calls().is_empty());
        assert_eq!(app.notifications.latest().unwrap().level, Level::Warning);

        app.connection.database = "orders".into();
        app.connection.username = "app".into();
        app.connection.password = "pw".into();
        app.run_active_query();
        app.settle().await;
        assert!(matches!(app.sql.active().output, TabOutput::Rows(_)));
    }

    #[tokio::test]
    async fn test_sql_command_save_asks_for_name_and_sends_once() {
        let mock = Arc::new(MockBackend::new());
        let mut app = app_on(&mock, "db-tunnels");
        app.enter_sql_mode();
        "select * from orders".chars().for_each(|c| app.sql_input(c));

        app.save_sql_command();
        assert_eq!(app.mode, Mode::Form);
        assert!(mock.calls().is_empty());

        app.submit_form();
        assert_eq!(app.notifications.latest().unwrap().level, Level::Warning);
        assert!(mock.calls().is_empty());

        let form = &mut app.form.as_mut().unwrap().state;
        form.set("name", "recent orders");
        form.set("description", "last 24h");
        app.submit_form();
        app.submit_form();
        app.settle().await;

        let saved = mock.calls_to(Method::POST, "/db-query/sql-commands");
        assert_eq!(saved.len(), 1);
        let body = saved[0].body.as_ref().unwrap();
        assert_eq!(body["name"], "recent orders");
        assert_eq!(body["description"], "last 24h");
        assert_eq!(body["sql_command"], "select * from orders");
        assert_eq!(app.mode, Mode::Sql);
        assert!(app.form.is_none());
        assert!(app.busy.is_empty());
    }

    #[tokio::test]
    async fn test_sql_command_form_cancel_returns_to_editor() {
        let mock = Arc::new(MockBackend::new());
        let mut app = app_on(&mock, "db-tunnels");
        app.enter_sql_mode();
        app.save_sql_command();
        assert!(app.form.is_none());
        assert_eq!(app.notifications.latest().unwrap().message, "Enter a SQL query");

        "select 1".chars().for_each(|c| app.sql_input(c));
        app.save_sql_command();
        app.cancel_form();
        assert_eq!(app.mode, Mode::Sql);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_dropped_after_panel_change_warns() {
        let mock = queues_mock();
        let mut app = app_on(&mock, "sqs-queues");
        app.refresh();
        app.settle().await;

        app.trigger_action(action_index(&app, "Delete Queue"));
        assert_eq!(app.mode, Mode::Confirm);
        app.navigate_to_resource("sns-topics");
        app.pending_action.as_mut().unwrap().selected_yes = true;
        app.execute_pending_action();
        assert_eq!(app.notifications.latest().unwrap().level, Level::Warning);

        app.settle().await;
        assert!(mock.calls_to(Method::DELETE, "/messaging/sqs/queues").is_empty());
    }

    #[tokio::test]
    async fn test_received_message_delete_sends_receipt_handle() {
        let mock = queues_mock();
        mock.on(
            Method::POST,
            "/messaging/sqs/messages/receive",
            json!({"success": true, "messages": [
                {"MessageId": "m-1", "ReceiptHandle": "rh-1", "Body": "hello"}
            ]}),
        );
        let mut app = app_on(&mock, "sqs-queues");
        app.refresh();
        app.settle().await;
        select(&mut app, "name", "orders");

        let sub = app.find_sub_resource_by_shortcut("m").unwrap();
        app.navigate_to_sub_resource(&sub);
        app.settle().await;
        assert_eq!(app.resource_key, "sqs-messages");
        let received = mock.calls_to(Method::POST, "/messaging/sqs/messages/receive");
        assert_eq!(
            received[0].body,
            Some(json!({"queue_url": "https://sqs/1/orders", "max_messages": 10}))
        );
        assert_eq!(app.filtered_items.len(), 1);

        app.trigger_action(action_index(&app, "Delete Message"));
        assert_eq!(app.mode, Mode::Confirm);
        app.pending_action.as_mut().unwrap().selected_yes = true;
        app.execute_pending_action();
        app.settle().await;

        let deletes = mock.calls_to(Method::DELETE, "/messaging/sqs/messages");
        assert_eq!(deletes.len(), 1);
        assert_eq!(
            deletes[0].body,
            Some(json!({"queue_url": "https://sqs/1/orders", "receipt_handle": "rh-1"}))
        );
    }

    #[tokio::test]
    async fn test_saved_query_runs_through_insights_form() {
        let mock = Arc::new(MockBackend::new());
        mock.on(
            Method::GET,
            "/cloudwatch/saved-queries",
            json!({"success": true, "queries": [{
                "id": 1,
                "name": "errors",
                "log_group_name": "/aws/lambda/fn",
                "query_string": "fields @message"
            }]}),
        );
        mock.on(
            Method::POST,
            "/cloudwatch/insights/query",
            json!({"success": true, "results": [[{"field": "@message", "value": "boom"}]]}),
        );
        let mut app = app_on(&mock, "saved-queries");
        app.refresh();
        app.settle().await;

        app.trigger_action(action_index(&app, "Run Query"));
        assert_eq!(app.mode, Mode::Form);
        assert_eq!(
            app.form.as_ref().unwrap().state.value_of("query_string"),
            Some("fields @message")
        );

        app.submit_form();
        app.settle().await;
        let runs = mock.calls_to(Method::POST, "/cloudwatch/insights/query");
        assert_eq!(runs.len(), 1);
        let body = runs[0].body.as_ref().unwrap();
        assert_eq!(body["log_group_names"], json!(["/aws/lambda/fn"]));
        assert_eq!(body["query_string"], "fields @message");
        assert_eq!(app.mode, Mode::Describe);
    }
}

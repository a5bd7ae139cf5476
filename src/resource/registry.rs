use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/common.json"),
    include_str!("../resources/api_catalog.json"),
    include_str!("../resources/cloudwatch.json"),
    include_str!("../resources/db_query.json"),
    include_str!("../resources/dynamodb.json"),
    include_str!("../resources/ec2.json"),
    include_str!("../resources/ecs.json"),
    include_str!("../resources/kafka.json"),
    include_str!("../resources/messaging.json"),
    include_str!("../resources/parameters.json"),
    include_str!("../resources/secrets.json"),
    include_str!("../resources/rds.json"),
];

fn default_method() -> String {
    "GET".to_string()
}

fn default_favorites_path() -> String {
    "favorites".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiDef {
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDef {
    pub header: String,
    pub json_path: String,
    pub width: u16,
    #[serde(default)]
    pub color_map: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmConfig {
    pub message: String,
    #[serde(default)]
    pub destructive: bool,
}

/// Whether an action targets the selected row or the collection as a whole
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionScope {
    #[default]
    Item,
    Collection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Secret,
    Number,
    Bool,
    Json,
    Pairs,
    Select,
}

/// Show a field only when another field holds a given value
#[derive(Debug, Clone, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    pub equals: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    /// Output key when several alternative inputs feed one body field
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub when: Option<FieldCondition>,
    #[serde(default)]
    pub options: Vec<String>,
    /// Item field used as the initial value (update forms)
    #[serde(default)]
    pub prefill: Option<String>,
    /// Send the collected value as a compact JSON string
    #[serde(default)]
    pub stringify: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormDef {
    pub title: String,
    pub fields: Vec<FieldDef>,
    /// Endpoint whose reply seeds field values before the form opens
    #[serde(default)]
    pub preload: Option<ApiDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionDef {
    pub display_name: String,
    pub api: ApiDef,
    #[serde(default)]
    pub shortcut: Option<String>,
    #[serde(default)]
    pub confirm: Option<ConfirmConfig>,
    #[serde(default)]
    pub scope: ActionScope,
    #[serde(default)]
    pub form: Option<FormDef>,
    /// Body template; defaults to the collected form values
    #[serde(default)]
    pub body: Option<Value>,
    /// Long-running state change: refresh once after a delay instead of immediately
    #[serde(default)]
    pub transition: bool,
    /// Other resources re-fetched after success
    #[serde(default)]
    pub refresh: Vec<String>,
    /// Show the reply payload in the describe view
    #[serde(default)]
    pub show_result: bool,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub success_message: Option<String>,
}

/// Sub-resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct SubResourceDef {
    pub resource_key: String,
    pub display_name: String,
    pub shortcut: String,
}

/// Uniform favorites sub-API of a panel
#[derive(Debug, Clone, Deserialize)]
pub struct FavoritesDef {
    pub list_path: String,
    pub check_path: String,
    pub add: ApiDef,
    #[serde(default)]
    pub add_body: Option<Value>,
    pub remove_path: String,
    /// Field of a favorite record holding the natural key
    pub key_field: String,
    #[serde(default = "default_favorites_path")]
    pub response_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    pub service: String,
    pub api: ApiDef,
    /// Sent with the listing call when the backend lists through a POST
    #[serde(default)]
    pub list_body: Option<Value>,
    pub response_path: String,
    /// Natural key field; empty when items are bare strings
    pub key_field: String,
    pub name_field: String,
    #[serde(default)]
    pub search_fields: Vec<String>,
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    #[serde(default)]
    pub sub_resources: Vec<SubResourceDef>,
    #[serde(default)]
    pub favorites: Option<FavoritesDef>,
    #[serde(default)]
    pub detail: Option<ApiDef>,
}

impl ResourceDef {
    /// Natural key of an item, or None when the key field is missing
    pub fn natural_key(&self, item: &Value) -> Option<String> {
        let value = if self.key_field.is_empty() {
            item
        } else {
            lookup_field(item, &self.key_field)?
        };
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Display name of an item, falling back to its key
    pub fn item_name(&self, item: &Value) -> String {
        if self.name_field.is_empty() {
            return self.natural_key(item).unwrap_or_else(|| "-".to_string());
        }
        match extract_json_value(item, &self.name_field) {
            name if name != "-" => name,
            _ => self.natural_key(item).unwrap_or_else(|| "-".to_string()),
        }
    }

    /// Whether listing needs a selected parent item
    pub fn reads_parent(&self) -> bool {
        self.api.path.contains("{parent.")
            || self
                .list_body
                .as_ref()
                .is_some_and(|b| b.to_string().contains("{parent."))
    }

    /// Actions reachable from the "create" key
    #[cfg(test)]
    pub fn create_action(&self) -> Option<usize> {
        self.actions
            .iter()
            .position(|a| a.scope == ActionScope::Collection && a.shortcut.as_deref() == Some("n"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColorDef {
    pub value: String,
    pub color: [u8; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub color_maps: HashMap<String, Vec<ColorDef>>,
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
    /// Forms opened outside any resource action, by name
    #[serde(default)]
    pub forms: HashMap<String, FormDef>,
}

static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            color_maps: HashMap::new(),
            resources: HashMap::new(),
            forms: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig =
                serde_json::from_str(content).expect("Failed to parse embedded resource JSON");
            final_config.color_maps.extend(partial.color_maps);
            final_config.resources.extend(partial.resources);
            final_config.forms.extend(partial.forms);
        }

        final_config
    })
}

pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

pub fn get_form(name: &str) -> Option<&'static FormDef> {
    get_registry().forms.get(name)
}

pub fn get_all_resource_keys() -> Vec<&'static str> {
    let mut keys: Vec<&str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    keys.sort_unstable();
    keys
}

/// Keys of resources that are reachable only through a parent
pub fn sub_resource_keys() -> Vec<&'static str> {
    let mut keys: Vec<&str> = get_registry()
        .resources
        .values()
        .flat_map(|r| r.sub_resources.iter().map(|s| s.resource_key.as_str()))
        .collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}

/// Top-level resources, the ones `:` can jump to
pub fn top_level_resource_keys() -> Vec<&'static str> {
    let subs = sub_resource_keys();
    get_all_resource_keys()
        .into_iter()
        .filter(|k| !subs.contains(k))
        .collect()
}

pub fn get_color_map(name: &str) -> Option<&'static Vec<ColorDef>> {
    get_registry().color_maps.get(name)
}

/// Get color for a value based on color map name
pub fn get_color_for_value(color_map_name: &str, value: &str) -> Option<[u8; 3]> {
    get_color_map(color_map_name)?
        .iter()
        .find(|c| c.value.eq_ignore_ascii_case(value))
        .map(|c| c.color)
}

/// Raw JSON at a path: direct key first, then dot/bracket notation
pub fn lookup_field<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(v) = value.get(path) {
        return Some(v);
    }
    let ptr = format!("/{}", path.replace(['.', '['], "/").replace(']', ""));
    value.pointer(&ptr)
}

/// Extract a value from JSON using a path string
/// Supports dot notation (e.g., "containers.0.name")
/// and array notation (e.g., "containers[0].name")
pub fn extract_json_value(value: &Value, path: &str) -> String {
    if path.is_empty() {
        return format_json_value(value);
    }
    lookup_field(value, path)
        .map(format_json_value)
        .unwrap_or_else(|| "-".to_string())
}

/// Format a JSON value as a string for display
pub fn format_json_value(v: &Value) -> String {
    match v {
        Value::String(s) if s.is_empty() => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "yes" } else { "no" }.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            if arr.is_empty() {
                "-".to_string()
            } else if arr.iter().all(|v| v.is_string()) {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                format!("[{} items]", arr.len())
            }
        }
        Value::Object(_) => "[object]".to_string(),
    }
}

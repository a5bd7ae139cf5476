//! Input form backing create/update actions
//!
//! Holds one text buffer per field. `collect` turns the buffers into the JSON
//! object sent to the backend and is the only place client-side validation
//! happens: required fields must be non-empty, structured fields must parse.

use serde_json::{Map, Value};

use crate::backend::encoding::value_text;
use crate::error::{ConsoleError, ConsoleResult};
use crate::resource::registry::{lookup_field, FieldDef, FieldKind, FormDef};

#[derive(Debug, Clone)]
pub struct FieldInput {
    pub def: &'static FieldDef,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct FormState {
    pub title: String,
    pub fields: Vec<FieldInput>,
    pub focused: usize,
}

impl FormState {
    /// Build a form with defaults, then item prefills for update actions
    pub fn new(def: &'static FormDef, item: Option<&Value>) -> Self {
        let fields = def
            .fields
            .iter()
            .map(|f| {
                let prefilled = f
                    .prefill
                    .as_deref()
                    .zip(item)
                    .and_then(|(path, item)| lookup_field(item, path))
                    .filter(|v| !v.is_null())
                    .map(value_text);
                let value = prefilled
                    .or_else(|| f.default.clone())
                    .unwrap_or_else(|| match f.kind {
                        FieldKind::Bool => "false".to_string(),
                        FieldKind::Select => f.options.first().cloned().unwrap_or_default(),
                        _ => String::new(),
                    });
                FieldInput { def: f, value }
            })
            .collect();

        Self {
            title: def.title.clone(),
            fields,
            focused: 0,
        }
    }

    /// Overwrite fields with values returned by a preload endpoint
    pub fn seed(&mut self, values: &Value) {
        for field in &mut self.fields {
            if let Some(v) = values.get(&field.def.name).filter(|v| !v.is_null()) {
                field.value = value_text(v);
            }
        }
    }

    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.def.name == name)
            .map(|f| f.value.as_str())
    }

    #[cfg(test)]
    pub fn set(&mut self, name: &str, value: &str) {
        if let Some(field) = self.fields.iter_mut().find(|f| f.def.name == name) {
            field.value = value.to_string();
        }
    }

    /// Hidden fields are neither shown nor submitted
    pub fn is_visible(&self, index: usize) -> bool {
        let Some(field) = self.fields.get(index) else {
            return false;
        };
        match &field.def.when {
            Some(cond) => self.value_of(&cond.field) == Some(cond.equals.as_str()),
            None => true,
        }
    }

    pub fn visible_fields(&self) -> impl Iterator<Item = (usize, &FieldInput)> {
        self.fields
            .iter()
            .enumerate()
            .filter(move |(i, _)| self.is_visible(*i))
    }

    pub fn next_field(&mut self) {
        let n = self.fields.len();
        for step in 1..=n {
            let idx = (self.focused + step) % n;
            if self.is_visible(idx) {
                self.focused = idx;
                return;
            }
        }
    }

    pub fn prev_field(&mut self) {
        let n = self.fields.len();
        for step in 1..=n {
            let idx = (self.focused + n - step) % n;
            if self.is_visible(idx) {
                self.focused = idx;
                return;
            }
        }
    }

    pub fn input(&mut self, c: char) {
        let Some(field) = self.fields.get_mut(self.focused) else {
            return;
        };
        match field.def.kind {
            FieldKind::Bool => {
                if c == ' ' {
                    field.value = toggled(&field.value);
                }
            }
            FieldKind::Select => {
                if c == ' ' {
                    field.value = cycled(field.def, &field.value, true);
                }
            }
            _ => field.value.push(c),
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.fields.get_mut(self.focused) {
            if !matches!(field.def.kind, FieldKind::Bool | FieldKind::Select) {
                field.value.pop();
            }
        }
    }

    /// Left/right on select and bool fields
    pub fn cycle(&mut self, forward: bool) {
        let Some(field) = self.fields.get_mut(self.focused) else {
            return;
        };
        match field.def.kind {
            FieldKind::Bool => field.value = toggled(&field.value),
            FieldKind::Select => field.value = cycled(field.def, &field.value, forward),
            _ => {}
        }
    }

    /// Validate and convert the visible fields into a JSON object
    pub fn collect(&self) -> ConsoleResult<Value> {
        let mut out = Map::new();
        for (_, field) in self.visible_fields() {
            let def = field.def;
            let raw = field.value.trim();
            let key = def.target.clone().unwrap_or_else(|| def.name.clone());

            if raw.is_empty() {
                if def.required {
                    return Err(ConsoleError::validation(format!("{} is required", def.label)));
                }
                out.insert(key, Value::Null);
                continue;
            }

            let value = convert(def, raw)?;
            let value = if def.stringify {
                Value::String(value.to_string())
            } else {
                value
            };
            out.insert(key, value);
        }
        Ok(Value::Object(out))
    }
}

fn convert(def: &FieldDef, raw: &str) -> ConsoleResult<Value> {
    match def.kind {
        FieldKind::Text | FieldKind::Secret => Ok(Value::String(raw.to_string())),
        FieldKind::Select => {
            if def.options.iter().any(|o| o == raw) {
                Ok(Value::String(raw.to_string()))
            } else {
                Err(ConsoleError::validation(format!(
                    "{} must be one of: {}",
                    def.label,
                    def.options.join(", ")
                )))
            }
        }
        FieldKind::Bool => Ok(Value::Bool(raw.eq_ignore_ascii_case("true"))),
        FieldKind::Number => {
            if let Ok(n) = raw.parse::<i64>() {
                return Ok(Value::from(n));
            }
            raw.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| ConsoleError::validation(format!("{} must be a number", def.label)))
        }
        FieldKind::Json => serde_json::from_str(raw)
            .map_err(|e| ConsoleError::validation(format!("{} is not valid JSON: {}", def.label, e))),
        FieldKind::Pairs => parse_pairs(raw)
            .map(Value::Object)
            .map_err(|e| ConsoleError::validation(format!("{}: {}", def.label, e))),
    }
}

/// `k=v, k2=v2` (commas or newlines) into an ordered object
///
/// A comma starts a new pair only when the text after it holds a `=`;
/// otherwise it belongs to the previous value, so `pass=p,ssw0rd` keeps
/// its comma.
pub fn parse_pairs(raw: &str) -> Result<Map<String, Value>, String> {
    let mut entries: Vec<String> = Vec::new();
    for line in raw.lines() {
        let mut current: Option<String> = None;
        for chunk in line.split(',') {
            if chunk.contains('=') {
                entries.extend(current.take());
                current = Some(chunk.to_string());
            } else if chunk.trim().is_empty() {
                continue;
            } else if let Some(entry) = current.as_mut() {
                entry.push(',');
                entry.push_str(chunk);
            } else {
                return Err(format!("expected key=value, got '{}'", chunk.trim()));
            }
        }
        entries.extend(current);
    }

    let mut map = Map::new();
    for entry in &entries {
        let Some((k, v)) = entry.split_once('=') else {
            return Err(format!("expected key=value, got '{}'", entry.trim()));
        };
        let k = k.trim();
        if k.is_empty() {
            return Err(format!("missing key in '{}'", entry.trim()));
        }
        map.insert(k.to_string(), Value::String(v.trim().to_string()));
    }
    if map.is_empty() {
        return Err("no key=value pairs".to_string());
    }
    Ok(map)
}

fn toggled(value: &str) -> String {
    if value.eq_ignore_ascii_case("true") {
        "false".to_string()
    } else {
        "true".to_string()
    }
}

fn cycled(def: &FieldDef, value: &str, forward: bool) -> String {
    let n = def.options.len();
    if n == 0 {
        return value.to_string();
    }
    let idx = def.options.iter().position(|o| o == value);
    let next = match (idx, forward) {
        (Some(i), true) => (i + 1) % n,
        (Some(i), false) => (i + n - 1) % n,
        (None, _) => 0,
    };
    def.options[next].clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::registry::{get_resource, ActionDef};
    use serde_json::json;

    fn action(resource: &str, name: &str) -> &'static ActionDef {
        get_resource(resource)
            .unwrap()
            .actions
            .iter()
            .find(|a| a.display_name == name)
            .unwrap()
    }

    fn form_for(resource: &str, name: &str, item: Option<&Value>) -> FormState {
        FormState::new(action(resource, name).form.as_ref().unwrap(), item)
    }

    #[test]
    fn test_required_field_is_validation_error() {
        let form = form_for("catalog-owners", "Create Owner", None);
        let err = form.collect().unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(_)));
        assert!(err.to_string().contains("required"));
    }

    #[test]
    fn test_secret_pairs_are_string_encoded() {
        let mut form = form_for("secrets", "Create Secret", None);
        form.set("name", "db/creds");
        form.set("secret_value_type", "json");
        form.set("secret_pairs", "user=a, pass=b");

        let values = form.collect().unwrap();
        assert_eq!(values["secret_value"], json!(r#"{"user":"a","pass":"b"}"#));
        assert_eq!(values["name"], "db/creds");
        assert_eq!(values["description"], Value::Null);
        assert!(values.get("secret_text").is_none());
    }

    #[test]
    fn test_secret_plaintext_uses_text_field() {
        let mut form = form_for("secrets", "Create Secret", None);
        form.set("name", "token");
        form.set("secret_text", "s3cr3t");

        let values = form.collect().unwrap();
        assert_eq!(values["secret_value"], "s3cr3t");
    }

    #[test]
    fn test_hidden_fields_are_skipped_in_navigation() {
        let mut form = form_for("secrets", "Create Secret", None);
        assert_eq!(form.fields[form.focused].def.name, "name");
        form.next_field();
        form.next_field();
        assert_eq!(form.fields[form.focused].def.name, "secret_text");
        form.next_field();
        assert_eq!(form.fields[form.focused].def.name, "description");
        form.prev_field();
        assert_eq!(form.fields[form.focused].def.name, "secret_text");
    }

    #[test]
    fn test_typed_conversions() {
        let mut form = form_for("rds-instances", "Create Instance", None);
        form.set("db_instance_identifier", "orders-db");
        form.set("master_username", "admin");
        form.set("master_password", "pw");
        form.set("multi_az", "true");

        let values = form.collect().unwrap();
        assert_eq!(values["allocated_storage"], json!(20));
        assert_eq!(values["multi_az"], json!(true));
        assert_eq!(values["publicly_accessible"], json!(false));
        assert_eq!(values["engine"], "postgres");

        form.set("allocated_storage", "lots");
        assert!(form.collect().unwrap_err().to_string().contains("number"));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let mut form = form_for("catalog-requests", "Test Request", None);
        form.set("body", "{\"a\": 1");
        assert!(matches!(form.collect(), Err(ConsoleError::Validation(_))));

        form.set("body", "{\"a\": 1}");
        form.set("headers", "");
        let values = form.collect().unwrap();
        assert_eq!(values["body"], json!({"a": 1}));
        assert_eq!(values["headers"], Value::Null);
    }

    #[test]
    fn test_prefill_and_seed() {
        let item = json!({"name": "/app/db", "description": "primary"});
        let mut form = form_for("parameters", "Update Value", Some(&item));
        assert_eq!(form.value_of("description"), Some("primary"));
        assert_eq!(form.value_of("value"), Some(""));

        form.seed(&json!({"value": "new", "unrelated": 1}));
        assert_eq!(form.value_of("value"), Some("new"));
    }

    #[test]
    fn test_select_and_bool_cycle() {
        let mut form = form_for("rds-instances", "Create Instance", None);
        form.focused = form.fields.iter().position(|f| f.def.name == "engine").unwrap();
        form.cycle(true);
        assert_eq!(form.value_of("engine"), Some("mysql"));
        form.cycle(false);
        form.cycle(false);
        assert_eq!(form.value_of("engine"), Some("mariadb"));
        form.input('x');
        assert_eq!(form.value_of("engine"), Some("mariadb"));

        form.focused = form.fields.iter().position(|f| f.def.name == "multi_az").unwrap();
        form.input(' ');
        assert_eq!(form.value_of("multi_az"), Some("true"));
    }

    #[test]
    fn test_parse_pairs() {
        let map = parse_pairs("b=2,\n a = 1 ").unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(map["a"], "1");
        assert!(parse_pairs("novalue").is_err());
        assert!(parse_pairs("=x").is_err());
        assert!(parse_pairs(" , ").is_err());
    }

    #[test]
    fn test_pairs_keep_commas_inside_values() {
        let map = parse_pairs("user=a, pass=p,ssw0rd").unwrap();
        assert_eq!(map["user"], "a");
        assert_eq!(map["pass"], "p,ssw0rd");

        let map = parse_pairs("hosts=a, b, c\nport=5432").unwrap();
        assert_eq!(map["hosts"], "a, b, c");
        assert_eq!(map["port"], "5432");

        assert!(parse_pairs("lonely, user=a").is_err());
    }

    #[test]
    fn test_secret_value_with_comma() {
        let mut form = form_for("secrets", "Create Secret", None);
        form.set("name", "db/creds");
        form.set("secret_value_type", "json");
        form.set("secret_pairs", "user=a, pass=p,ssw0rd");

        let values = form.collect().unwrap();
        assert_eq!(
            values["secret_value"],
            json!(r#"{"user":"a","pass":"p,ssw0rd"}"#)
        );
    }
}

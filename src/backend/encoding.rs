//! Placeholder interpolation for request paths and bodies
//!
//! Paths: every `{placeholder}` is resolved against a [`Scope`] and embedded
//! as one percent-encoded path segment, so a key like `/aws/lambda/fn`
//! travels as `%2Faws%2Flambda%2Ffn`. A placeholder that resolves to nothing
//! is a validation error; no request with a hole in its path is ever sent.
//!
//! Bodies: a string that is exactly `"{placeholder}"` is replaced by the raw
//! JSON value (null when absent); placeholders embedded in longer strings are
//! substituted as text.

use serde_json::Value;

use crate::error::{ConsoleError, ConsoleResult};
use crate::resource::registry::lookup_field;

/// Values a placeholder can resolve against
///
/// - `{key}` natural key of the target item
/// - `{parent.<field>}` field of the parent item (sub-resources);
///   `{parent.parent.<field>}` reaches one level further up
/// - `{form.<field>}` submitted form value
/// - `{<field>}` field of the target item
#[derive(Debug, Default, Clone, Copy)]
pub struct Scope<'a> {
    pub key: Option<&'a str>,
    pub item: Option<&'a Value>,
    /// Ancestor items, nearest last
    pub parents: &'a [Value],
    pub form: Option<&'a Value>,
}

impl<'a> Scope<'a> {
    pub fn item(key: &'a str, item: &'a Value) -> Self {
        Self {
            key: Some(key),
            item: Some(item),
            ..Default::default()
        }
    }

    pub fn key(key: &'a str) -> Self {
        Self {
            key: Some(key),
            ..Default::default()
        }
    }

    pub fn with_parents(mut self, parents: &'a [Value]) -> Self {
        self.parents = parents;
        self
    }

    #[cfg(test)]
    pub fn with_form(mut self, form: Option<&'a Value>) -> Self {
        self.form = form;
        self
    }

    pub fn resolve(&self, placeholder: &str) -> Option<Value> {
        let found = if placeholder == "key" {
            self.key.map(|k| Value::String(k.to_string()))
        } else if placeholder.starts_with("parent.") {
            let mut field = placeholder;
            let mut depth = 0;
            while let Some(rest) = field.strip_prefix("parent.") {
                field = rest;
                depth += 1;
            }
            self.parents
                .len()
                .checked_sub(depth)
                .and_then(|i| self.parents.get(i))
                .and_then(|p| lookup_field(p, field))
                .cloned()
        } else if let Some(field) = placeholder.strip_prefix("form.") {
            self.form.and_then(|f| lookup_field(f, field)).cloned()
        } else {
            self.item.and_then(|i| lookup_field(i, placeholder)).cloned()
        };
        found.filter(|v| !v.is_null())
    }
}

/// Percent-encode a natural key as a single path segment
pub fn encode_key(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

/// Plain text form of a scalar used in paths and messages
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Resolve every placeholder of a path template, percent-encoding each value
pub fn interpolate_path(template: &str, scope: &Scope) -> ConsoleResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let name = &after[..end];
        let value = scope
            .resolve(name)
            .map(|v| value_text(&v))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConsoleError::validation(format!("Missing value for '{}'", name)))?;
        out.push_str(&encode_key(&value));
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Resolve a body template into the JSON sent to the backend
pub fn render_body(template: &Value, scope: &Scope) -> Value {
    match template {
        Value::String(s) => {
            if let Some(name) = exact_placeholder(s) {
                return scope.resolve(name).unwrap_or(Value::Null);
            }
            Value::String(substitute_text(s, scope))
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| render_body(v, scope)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_body(v, scope)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Substitute placeholders into display text (confirmation messages)
pub fn substitute_text(template: &str, scope: &Scope) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if let Some(v) = scope.resolve(name) {
            out.push_str(&value_text(&v));
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn exact_placeholder(s: &str) -> Option<&str> {
    let inner = s.strip_prefix('{')?.strip_suffix('}')?;
    if inner.is_empty() || inner.contains(['{', '}']) {
        return None;
    }
    Some(inner)
}

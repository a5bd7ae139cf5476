//! Backend response envelope
//!
//! Every backend endpoint answers `{success, message?, errors?, ...data}`.
//! `Envelope` turns that loose shape into a tagged result once, right after
//! decoding, so nothing downstream checks for property presence.

use serde_json::Value;

use crate::error::{ConsoleError, ConsoleResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Success { message: Option<String>, payload: Value },
    Failure { message: String, errors: Vec<String> },
}

/// Successful reply: optional backend message plus the full response object
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub message: Option<String>,
    pub payload: Value,
}

impl Reply {
    /// Array found at a dotted path (e.g. "log_groups" or "result.items")
    pub fn items(&self, path: &str) -> Vec<Value> {
        let target = if path.is_empty() {
            Some(&self.payload)
        } else {
            self.payload
                .pointer(&format!("/{}", path.replace('.', "/")))
        };
        target
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Payload without the envelope keys, for detail views
    pub fn data(&self) -> Value {
        match &self.payload {
            Value::Object(map) => {
                let mut map = map.clone();
                map.remove("success");
                map.remove("message");
                Value::Object(map)
            }
            other => other.clone(),
        }
    }
}

impl Envelope {
    pub fn from_value(value: Value) -> Self {
        let Value::Object(ref map) = value else {
            return Envelope::Failure {
                message: "Unexpected response shape from backend".to_string(),
                errors: Vec::new(),
            };
        };

        let message = map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        if map.get("success").and_then(Value::as_bool) == Some(true) {
            return Envelope::Success {
                message,
                payload: value,
            };
        }

        let errors = map.get("errors").map(collect_errors).unwrap_or_default();
        Envelope::Failure {
            message: message.unwrap_or_else(|| "Request failed".to_string()),
            errors,
        }
    }

    #[cfg(test)]
    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    pub fn into_result(self) -> ConsoleResult<Reply> {
        match self {
            Envelope::Success { message, payload } => Ok(Reply { message, payload }),
            Envelope::Failure { message, errors } => Err(ConsoleError::Rejected { message, errors }),
        }
    }
}

/// Sub-errors arrive as strings, `{field, message}` objects or a field map
fn collect_errors(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => {
                    let msg = obj.get("message").and_then(Value::as_str)?;
                    match obj.get("field").and_then(Value::as_str) {
                        Some(field) => Some(format!("{}: {}", field, msg)),
                        None => Some(msg.to_string()),
                    }
                }
                _ => None,
            })
            .collect(),
        Value::Object(obj) => obj
            .iter()
            .map(|(field, msg)| match msg {
                Value::String(s) => format!("{}: {}", field, s),
                other => format!("{}: {}", field, other),
            })
            .collect(),
        Value::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

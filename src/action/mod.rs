//! Mutating actions: busy guard and outcome wording

pub mod form;

use std::collections::HashSet;

use crate::backend::envelope::Reply;
use crate::resource::registry::ActionDef;

/// Controls with a call in flight. A second trigger of a busy control is ignored.
#[derive(Debug, Default)]
pub struct BusySet {
    inner: HashSet<String>,
}

impl BusySet {
    /// Mark a control busy; false when it already was
    pub fn try_acquire(&mut self, key: &str) -> bool {
        self.inner.insert(key.to_string())
    }

    pub fn release(&mut self, key: &str) {
        self.inner.remove(key);
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.inner.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Busy key of an action on one target
pub fn busy_key(resource_key: &str, action_index: usize, target: Option<&str>) -> String {
    format!("{}#{}@{}", resource_key, action_index, target.unwrap_or("*"))
}

/// Notification text for a successful call: the backend's message, else the configured one, else a default
pub fn success_text(action: &ActionDef, reply: &Reply, target: Option<&str>) -> String {
    if let Some(msg) = reply.message.as_deref().filter(|m| !m.is_empty()) {
        return msg.to_string();
    }
    if let Some(msg) = &action.success_message {
        return msg.clone();
    }
    match target {
        Some(name) => format!("{} '{}' succeeded", action.display_name, name),
        None => format!("{} succeeded", action.display_name),
    }
}

//! Notification log
//!
//! Append-only list of operation outcomes. Every entry expires after a fixed
//! TTL and is pruned on the next tick of the event loop.

use std::time::{Duration, Instant};

use crate::error::ConsoleError;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

/// Cap so a burst of failures cannot grow the overlay without bound
const MAX_ENTRIES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Warning,
    Danger,
}

impl Level {
    pub fn icon(self) -> &'static str {
        match self {
            Level::Success => "✔",
            Level::Info => "ℹ",
            Level::Warning => "⚠",
            Level::Danger => "✘",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    pub created_at: Instant,
}

#[derive(Debug)]
pub struct NotificationSink {
    entries: Vec<Notification>,
    ttl: Duration,
}

impl Default for NotificationSink {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl NotificationSink {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Vec::new(),
            ttl,
        }
    }

    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        self.push_at(level, message, Instant::now());
    }

    pub fn push_at(&mut self, level: Level, message: impl Into<String>, now: Instant) {
        let message = message.into();
        match level {
            Level::Danger => tracing::warn!("notify [{:?}] {}", level, message),
            _ => tracing::debug!("notify [{:?}] {}", level, message),
        }
        self.entries.push(Notification {
            level,
            message,
            created_at: now,
        });
        if self.entries.len() > MAX_ENTRIES {
            let overflow = self.entries.len() - MAX_ENTRIES;
            self.entries.drain(..overflow);
        }
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(Level::Success, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Level::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Level::Warning, message);
    }

    pub fn report(&mut self, err: &ConsoleError) {
        self.push(err.level(), err.notification_text());
    }

    /// Drop every entry older than the TTL
    pub fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|n| now.saturating_duration_since(n.created_at) < ttl);
    }

    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<&Notification> {
        self.entries.last()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

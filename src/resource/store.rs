//! Last fetched collection of one resource type plus its favorites

use std::collections::HashSet;

use serde_json::Value;

use super::favorites::FavoriteRecord;

/// Owned by the app, one per resource key. Replaced wholesale on every
/// successful fetch; a failed fetch leaves the previous items in place and
/// marks the store stale.
#[derive(Debug, Clone, Default)]
pub struct ResourceStore {
    /// Ancestor items the collection was fetched under, nearest last
    pub parents: Vec<Value>,
    items: Vec<Value>,
    favorites: Vec<FavoriteRecord>,
    favorite_keys: HashSet<String>,
    loaded: bool,
    loading: bool,
    error: Option<String>,
}

impl ResourceStore {
    pub fn new(parents: Vec<Value>) -> Self {
        Self {
            parents,
            ..Default::default()
        }
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn replace(&mut self, items: Vec<Value>) {
        self.items = items;
        self.loaded = true;
        self.loading = false;
        self.error = None;
    }

    /// Record a failed refresh without touching the items
    pub fn fail(&mut self, error: impl Into<String>) {
        self.loading = false;
        self.error = Some(error.into());
    }

    pub fn begin_loading(&mut self) {
        self.loading = true;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Last refresh failed; the items shown come from an earlier fetch (or none)
    pub fn is_stale(&self) -> bool {
        self.error.is_some()
    }

    pub fn set_favorites(&mut self, records: Vec<FavoriteRecord>) {
        self.favorite_keys = records.iter().map(|r| r.natural_key.clone()).collect();
        self.favorites = records;
    }

    pub fn favorites(&self) -> &[FavoriteRecord] {
        &self.favorites
    }

    pub fn favorite_keys(&self) -> &HashSet<String> {
        &self.favorite_keys
    }

    pub fn is_favorite(&self, key: &str) -> bool {
        self.favorite_keys.contains(key)
    }

    /// Apply a confirmed toggle locally until the favorites list is reloaded
    pub fn mark_favorite(&mut self, key: &str, favorite: bool) {
        if favorite {
            if self.favorite_keys.insert(key.to_string()) {
                self.favorites.push(FavoriteRecord::new(key));
            }
        } else {
            self.favorite_keys.remove(key);
            self.favorites.retain(|r| r.natural_key != key);
        }
    }
}

//! Local filtering of a fetched collection
//!
//! Pure functions over borrowed data: the store is never touched, every
//! keystroke recomputes the view from the full collection.

use std::collections::HashSet;

use serde_json::Value;

use super::favorites::FavoriteRecord;
use super::registry::{extract_json_value, ResourceDef};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub text: String,
    pub favorites_only: bool,
}

impl FilterState {
    pub fn is_active(&self) -> bool {
        !self.text.is_empty() || self.favorites_only
    }
}

/// Items whose name or any search field contains the filter text, case-insensitively.
/// With `favorites_only`, items must also have their key in `favorites`.
pub fn filter(
    items: &[Value],
    state: &FilterState,
    resource: &ResourceDef,
    favorites: &HashSet<String>,
) -> Vec<Value> {
    let needle = state.text.to_lowercase();

    items
        .iter()
        .filter(|item| {
            if state.favorites_only {
                let is_fav = resource
                    .natural_key(item)
                    .is_some_and(|k| favorites.contains(&k));
                if !is_fav {
                    return false;
                }
            }
            needle.is_empty() || matches_text(item, resource, &needle)
        })
        .cloned()
        .collect()
}

fn matches_text(item: &Value, resource: &ResourceDef, needle: &str) -> bool {
    std::iter::once(resource.name_field.as_str())
        .chain(resource.search_fields.iter().map(String::as_str))
        .any(|field| {
            let value = extract_json_value(item, field);
            value != "-" && value.to_lowercase().contains(needle)
        })
}

/// Favorites tab: match on natural key or alias
pub fn filter_favorites(records: &[FavoriteRecord], text: &str) -> Vec<FavoriteRecord> {
    let needle = text.to_lowercase();
    records
        .iter()
        .filter(|r| {
            needle.is_empty()
                || r.natural_key.to_lowercase().contains(&needle)
                || r
                    .alias
                    .as_deref()
                    .is_some_and(|a| a.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

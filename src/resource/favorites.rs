//! Favorites sub-API shared by the panels that support starring
//!
//! Toggling is check-then-act: the current status is read from the backend,
//! then the opposite call is issued. Two consoles toggling the same key at
//! once can both see the same status; the backend keeps the last write.

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use super::registry::{lookup_field, FavoritesDef};
use crate::backend::client::Backend;
use crate::backend::dispatch::{execute, ActionRequest};
use crate::backend::encoding::{interpolate_path, value_text, Scope};
use crate::backend::envelope::Reply;
use crate::error::ConsoleResult;

#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteRecord {
    pub natural_key: String,
    pub alias: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl FavoriteRecord {
    pub fn new(natural_key: &str) -> Self {
        Self {
            natural_key: natural_key.to_string(),
            alias: None,
            created_at: None,
        }
    }

    /// Parse one backend record; records without the key field are dropped
    pub fn from_value(value: &Value, key_field: &str) -> Option<Self> {
        let natural_key = lookup_field(value, key_field)
            .map(value_text)
            .filter(|k| !k.is_empty())?;
        let alias = value
            .get("alias")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        let created_at = value
            .get("created_at")
            .and_then(Value::as_str)
            .and_then(parse_timestamp);

        Some(Self {
            natural_key,
            alias,
            created_at,
        })
    }

    pub fn added_label(&self) -> String {
        self.created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|t| t.and_utc())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
}

impl ToggleOutcome {
    pub fn is_favorite(self) -> bool {
        self == ToggleOutcome::Added
    }
}

/// Fetch the favorites list of a panel
pub async fn load(backend: &dyn Backend, def: &FavoritesDef) -> ConsoleResult<Vec<FavoriteRecord>> {
    let reply = backend.call(Method::GET, &def.list_path, None).await?;
    let records: Vec<FavoriteRecord> = reply
        .items(&def.response_path)
        .iter()
        .filter_map(|v| FavoriteRecord::from_value(v, &def.key_field))
        .collect();
    debug!("Loaded {} favorites from {}", records.len(), def.list_path);
    Ok(records)
}

/// Read the remote status of one key
pub async fn check(backend: &dyn Backend, def: &FavoritesDef, key: &str) -> ConsoleResult<bool> {
    let path = interpolate_path(&def.check_path, &Scope::key(key))?;
    let reply = backend.call(Method::GET, &path, None).await?;
    Ok(reply.flag("is_favorite"))
}

pub async fn add(backend: &dyn Backend, def: &FavoritesDef, key: &str) -> ConsoleResult<Reply> {
    let request = ActionRequest::resolve(&def.add, def.add_body.as_ref(), &Scope::key(key))?;
    execute(backend, &request).await
}

pub async fn remove(backend: &dyn Backend, def: &FavoritesDef, key: &str) -> ConsoleResult<Reply> {
    let path = interpolate_path(&def.remove_path, &Scope::key(key))?;
    backend.call(Method::DELETE, &path, None).await
}

/// Flip the favorite status of a key
pub async fn toggle(
    backend: &dyn Backend,
    def: &FavoritesDef,
    key: &str,
) -> ConsoleResult<ToggleOutcome> {
    if check(backend, def, key).await? {
        remove(backend, def, key).await?;
        info!("Removed favorite '{}'", key);
        Ok(ToggleOutcome::Removed)
    } else {
        add(backend, def, key).await?;
        info!("Added favorite '{}'", key);
        Ok(ToggleOutcome::Added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::error::ConsoleError;
    use crate::resource::registry::get_resource;
    use serde_json::json;

    fn favorites_of(key: &str) -> &'static FavoritesDef {
        get_resource(key).unwrap().favorites.as_ref().unwrap()
    }

    #[test]
    fn test_record_parsing() {
        let rec = FavoriteRecord::from_value(
            &json!({"id": 1, "log_group_name": "/aws/lambda/fn", "alias": "fn", "created_at": "2024-03-05 10:20:30"}),
            "log_group_name",
        )
        .unwrap();
        assert_eq!(rec.natural_key, "/aws/lambda/fn");
        assert_eq!(rec.alias.as_deref(), Some("fn"));
        assert_eq!(rec.added_label(), "2024-03-05 10:20");

        let iso = FavoriteRecord::from_value(
            &json!({"secret_name": "db", "created_at": "2024-03-05T10:20:30.123456"}),
            "secret_name",
        )
        .unwrap();
        assert!(iso.created_at.is_some());
        assert!(iso.alias.is_none());

        assert!(FavoriteRecord::from_value(&json!({"alias": "x"}), "secret_name").is_none());
    }

    #[tokio::test]
    async fn test_toggle_adds_with_body() {
        let mock = MockBackend::new();
        mock.on(
            Method::GET,
            "/secrets/favorites/check/db%2Fprod",
            json!({"success": true, "is_favorite": false}),
        );
        let def = favorites_of("secrets");

        let outcome = toggle(&mock, def, "db/prod").await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Added);

        let adds = mock.calls_to(Method::POST, "/secrets/favorites");
        assert_eq!(adds.len(), 1);
        assert_eq!(adds[0].body, Some(json!({"secret_name": "db/prod"})));
    }

    #[tokio::test]
    async fn test_toggle_removes_when_favorite() {
        let mock = MockBackend::new();
        mock.on(
            Method::GET,
            "/ecs/favorites/prod/check",
            json!({"success": true, "is_favorite": true}),
        );
        let def = favorites_of("ecs-clusters");

        assert_eq!(toggle(&mock, def, "prod").await.unwrap(), ToggleOutcome::Removed);
        assert_eq!(mock.calls_to(Method::DELETE, "/ecs/favorites/prod").len(), 1);
        assert!(mock.calls_to(Method::POST, "/ecs/favorites/prod").is_empty());
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let mock = MockBackend::new();
        let check = "/parameters/favorites/check/%2Fapp%2Fdb";
        mock.on(Method::GET, check, json!({"success": true, "is_favorite": false}));
        mock.on(Method::GET, check, json!({"success": true, "is_favorite": true}));
        let def = favorites_of("parameters");

        let first = toggle(&mock, def, "/app/db").await.unwrap();
        let second = toggle(&mock, def, "/app/db").await.unwrap();
        assert_eq!((first, second), (ToggleOutcome::Added, ToggleOutcome::Removed));
        assert_eq!(mock.calls_to(Method::POST, "/parameters/favorites").len(), 1);
        assert_eq!(
            mock.calls_to(Method::DELETE, "/parameters/favorites/%2Fapp%2Fdb").len(),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_check_issues_no_mutation() {
        let mock = MockBackend::new();
        mock.fail(
            Method::GET,
            "/rds/favorites/db-1/check",
            ConsoleError::Transport("connection refused".into()),
        );
        let def = favorites_of("rds-instances");

        assert!(toggle(&mock, def, "db-1").await.is_err());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_load_reads_favorites_array() {
        let mock = MockBackend::new();
        mock.on(
            Method::GET,
            "/cloudwatch/favorites",
            json!({"success": true, "favorites": [
                {"log_group_name": "/aws/a", "alias": null},
                {"log_group_name": "/aws/b", "alias": "bee"}
            ]}),
        );
        let records = load(&mock, favorites_of("log-groups")).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].alias.as_deref(), Some("bee"));
    }
}

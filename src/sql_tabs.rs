//! Multi-tab SQL runner sharing one connection

use reqwest::Method;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::backend::client::Backend;
use crate::backend::envelope::Reply;
use crate::error::{ConsoleError, ConsoleResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TabError {
    #[error("At least one query tab must stay open")]
    LastTab,
    #[error("No query tab with id {0}")]
    UnknownTab(usize),
}

/// Rows returned by `/db-query/execute-query`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
    pub execution_time: Option<f64>,
    pub affected_rows: Option<u64>,
}

impl QueryResult {
    pub fn from_reply(reply: &Reply) -> Self {
        let columns = reply
            .items("columns")
            .iter()
            .filter_map(|c| c.as_str().map(str::to_string))
            .collect();
        Self {
            columns,
            rows: reply.items("rows"),
            execution_time: reply.get("execution_time").and_then(Value::as_f64),
            affected_rows: reply.get("affected_rows").and_then(Value::as_u64),
        }
    }

    /// Cell text; rows are objects keyed by column or positional arrays
    pub fn cell(&self, row: usize, column: usize) -> String {
        let Some(row) = self.rows.get(row) else {
            return String::new();
        };
        let value = match row {
            Value::Array(cells) => cells.get(column),
            Value::Object(map) => self.columns.get(column).and_then(|c| map.get(c)),
            _ => None,
        };
        match value {
            None | Some(Value::Null) => "NULL".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    pub fn summary(&self) -> String {
        let secs = self
            .execution_time
            .map(|t| format!("{}s", t))
            .unwrap_or_else(|| "?s".to_string());
        if self.rows.is_empty() {
            format!(
                "Query executed in {}. {} row(s) affected.",
                secs,
                self.affected_rows.unwrap_or(0)
            )
        } else {
            format!("{} row(s) returned in {}", self.rows.len(), secs)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TabOutput {
    #[default]
    Empty,
    Running,
    Rows(QueryResult),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlTab {
    pub id: usize,
    pub name: String,
    pub sql: String,
    pub output: TabOutput,
}

/// Ordered tabs with one active. Never empty.
#[derive(Debug, Clone)]
pub struct SqlTabs {
    tabs: Vec<SqlTab>,
    active: usize,
    counter: usize,
}

impl Default for SqlTabs {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlTabs {
    pub fn new() -> Self {
        let mut tabs = Self {
            tabs: Vec::new(),
            active: 0,
            counter: 0,
        };
        tabs.create();
        tabs
    }

    /// Append `Query <n>` and make it active
    pub fn create(&mut self) -> usize {
        self.counter += 1;
        let id = self.counter;
        self.tabs.push(SqlTab {
            id,
            name: format!("Query {}", id),
            sql: String::new(),
            output: TabOutput::Empty,
        });
        self.active = self.tabs.len() - 1;
        id
    }

    pub fn switch(&mut self, id: usize) -> Result<(), TabError> {
        self.active = self.position(id)?;
        Ok(())
    }

    /// Close a tab; closing the active one activates the previous (or the new first)
    pub fn close(&mut self, id: usize) -> Result<(), TabError> {
        let index = self.position(id)?;
        if self.tabs.len() == 1 {
            return Err(TabError::LastTab);
        }
        self.tabs.remove(index);
        if index == self.active {
            self.active = index.saturating_sub(1);
        } else if index < self.active {
            self.active -= 1;
        }
        Ok(())
    }

    pub fn next(&mut self) {
        self.active = (self.active + 1) % self.tabs.len();
    }

    pub fn previous(&mut self) {
        self.active = (self.active + self.tabs.len() - 1) % self.tabs.len();
    }

    pub fn tabs(&self) -> &[SqlTab] {
        &self.tabs
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> &SqlTab {
        &self.tabs[self.active]
    }

    pub fn active_mut(&mut self) -> &mut SqlTab {
        &mut self.tabs[self.active]
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut SqlTab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    fn position(&self, id: usize) -> Result<usize, TabError> {
        self.tabs
            .iter()
            .position(|t| t.id == id)
            .ok_or(TabError::UnknownTab(id))
    }
}

/// Connection form shared by every tab
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionParams {
    pub engine: String,
    pub host: String,
    pub port: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Saved tunnel the connection goes through, for saved commands
    pub tunnel_id: Option<i64>,
}

pub const CONNECTION_FIELDS: &[&str] = &["Engine", "Host", "Port", "Database", "Username", "Password"];

pub const ENGINES: &[&str] = &["postgres", "mysql", "mariadb"];

impl ConnectionParams {
    pub fn new() -> Self {
        Self {
            engine: ENGINES[0].to_string(),
            host: "localhost".to_string(),
            port: "5432".to_string(),
            ..Default::default()
        }
    }

    pub fn field_mut(&mut self, index: usize) -> Option<&mut String> {
        match index {
            0 => Some(&mut self.engine),
            1 => Some(&mut self.host),
            2 => Some(&mut self.port),
            3 => Some(&mut self.database),
            4 => Some(&mut self.username),
            5 => Some(&mut self.password),
            _ => None,
        }
    }

    pub fn field(&self, index: usize) -> &str {
        match index {
            0 => &self.engine,
            1 => &self.host,
            2 => &self.port,
            3 => &self.database,
            4 => &self.username,
            5 => &self.password,
            _ => "",
        }
    }

    pub fn cycle_engine(&mut self) {
        let next = ENGINES
            .iter()
            .position(|e| *e == self.engine)
            .map_or(0, |i| (i + 1) % ENGINES.len());
        self.engine = ENGINES[next].to_string();
    }

    /// Point the connection at a local tunnel endpoint
    pub fn use_tunnel(&mut self, local_port: u64, tunnel_id: Option<i64>) {
        self.host = "localhost".to_string();
        self.port = local_port.to_string();
        if tunnel_id.is_some() {
            self.tunnel_id = tunnel_id;
        }
    }

    pub fn validate(&self) -> ConsoleResult<()> {
        let missing: Vec<&str> = [
            ("engine", &self.engine),
            ("database", &self.database),
            ("username", &self.username),
            ("password", &self.password),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();
        if !missing.is_empty() {
            return Err(ConsoleError::validation(format!(
                "Fill in the connection fields: {}",
                missing.join(", ")
            )));
        }
        if !self.port.trim().is_empty() && self.port.trim().parse::<u16>().is_err() {
            return Err(ConsoleError::validation("Port must be a number"));
        }
        Ok(())
    }

    pub fn to_body(&self) -> Value {
        let port = self.port.trim().parse::<u16>().ok();
        json!({
            "engine": self.engine,
            "host": self.host,
            "port": port,
            "database": self.database,
            "username": self.username,
            "password": self.password,
        })
    }
}

pub async fn execute_query(
    backend: &dyn Backend,
    conn: &ConnectionParams,
    sql: &str,
) -> ConsoleResult<QueryResult> {
    let sql = sql.trim();
    if sql.is_empty() {
        return Err(ConsoleError::validation("Enter a SQL query"));
    }
    conn.validate()?;

    let mut body = conn.to_body();
    body["query"] = Value::String(sql.to_string());
    debug!("Executing query on {}:{} ({} chars)", conn.host, conn.port, sql.len());

    let reply = backend
        .call(Method::POST, "/db-query/execute-query", Some(body))
        .await?;
    let result = QueryResult::from_reply(&reply);
    info!("Query returned {} rows", result.rows.len());
    Ok(result)
}

pub async fn test_connection(backend: &dyn Backend, conn: &ConnectionParams) -> ConsoleResult<Reply> {
    conn.validate()?;
    backend
        .call(Method::POST, "/db-query/test-connection", Some(conn.to_body()))
        .await
}

pub async fn get_tables(backend: &dyn Backend, conn: &ConnectionParams) -> ConsoleResult<Vec<String>> {
    conn.validate()?;
    let reply = backend
        .call(Method::POST, "/db-query/get-tables", Some(conn.to_body()))
        .await?;
    Ok(reply
        .items("tables")
        .iter()
        .filter_map(|t| t.as_str().map(str::to_string))
        .collect())
}

/// Store the SQL of a tab as a named command
pub async fn save_command(
    backend: &dyn Backend,
    conn: &ConnectionParams,
    name: &str,
    description: Option<&str>,
    sql: &str,
) -> ConsoleResult<Reply> {
    if name.trim().is_empty() {
        return Err(ConsoleError::validation("Command name is required"));
    }
    if sql.trim().is_empty() {
        return Err(ConsoleError::validation("Enter a SQL query"));
    }
    let body = json!({
        "tunnel_id": conn.tunnel_id,
        "name": name.trim(),
        "sql_command": sql.trim(),
        "description": description.map(str::trim).filter(|d| !d.is_empty()),
    });
    backend.call(Method::POST, "/db-query/sql-commands", Some(body)).await
}

pub fn select_template(table: &str) -> String {
    format!("SELECT * FROM {} LIMIT 100;", table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    fn conn() -> ConnectionParams {
        ConnectionParams {
            database: "orders".into(),
            username: "app".into(),
            password: "pw".into(),
            ..ConnectionParams::new()
        }
    }

    #[test]
    fn test_new_has_one_tab() {
        let tabs = SqlTabs::new();
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs.active().name, "Query 1");
    }

    #[test]
    fn test_closing_last_tab_is_rejected() {
        let mut tabs = SqlTabs::new();
        let only = tabs.active().id;
        assert_eq!(tabs.close(only), Err(TabError::LastTab));
        assert_eq!(tabs.len(), 1);
    }

    #[test]
    fn test_create_and_close_active_selects_previous() {
        let mut tabs = SqlTabs::new();
        let second = tabs.create();
        let third = tabs.create();
        assert_eq!(tabs.active().name, "Query 3");

        tabs.close(third).unwrap();
        assert_eq!(tabs.active().id, second);

        let first = tabs.tabs()[0].id;
        tabs.switch(first).unwrap();
        tabs.close(first).unwrap();
        assert_eq!(tabs.active().id, second);

        // numbering keeps counting after closes
        assert_eq!(tabs.tabs()[tabs.active_index()].name, "Query 2");
        tabs.create();
        assert_eq!(tabs.active().name, "Query 4");
    }

    #[test]
    fn test_close_inactive_keeps_active_tab() {
        let mut tabs = SqlTabs::new();
        let first = tabs.active().id;
        tabs.create();
        let third = tabs.create();
        tabs.active_mut().sql = "select 1".into();

        tabs.close(first).unwrap();
        assert_eq!(tabs.active().id, third);
        assert_eq!(tabs.active().sql, "select 1");
        assert_eq!(tabs.close(99), Err(TabError::UnknownTab(99)));
    }

    #[test]
    fn test_tab_cycling() {
        let mut tabs = SqlTabs::new();
        tabs.create();
        tabs.next();
        assert_eq!(tabs.active_index(), 0);
        tabs.previous();
        assert_eq!(tabs.active_index(), 1);
    }

    #[test]
    fn test_connection_validation() {
        let err = ConnectionParams::new().validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Fill in the connection fields: database, username, password"
        );
        assert!(conn().validate().is_ok());

        let mut bad_port = conn();
        bad_port.port = "abc".into();
        assert!(bad_port.validate().is_err());
    }

    #[test]
    fn test_query_result_rendering() {
        let result = QueryResult {
            columns: vec!["id".into(), "name".into()],
            rows: vec![json!({"id": 1, "name": null}), json!([2, "b"])],
            execution_time: Some(0.25),
            affected_rows: None,
        };
        assert_eq!(result.cell(0, 0), "1");
        assert_eq!(result.cell(0, 1), "NULL");
        assert_eq!(result.cell(1, 1), "b");
        assert_eq!(result.summary(), "2 row(s) returned in 0.25s");

        let write = QueryResult {
            columns: vec![],
            rows: vec![],
            execution_time: Some(0.1),
            affected_rows: Some(3),
        };
        assert_eq!(write.summary(), "Query executed in 0.1s. 3 row(s) affected.");
    }

    #[tokio::test]
    async fn test_execute_query_body() {
        let mock = MockBackend::new();
        mock.on(
            Method::POST,
            "/db-query/execute-query",
            json!({"success": true, "columns": ["n"], "rows": [{"n": 1}], "execution_time": 0.01}),
        );

        let result = execute_query(&mock, &conn(), " select 1 as n ").await.unwrap();
        assert_eq!(result.columns, vec!["n"]);

        let calls = mock.calls();
        assert_eq!(
            calls[0].body,
            Some(json!({
                "engine": "postgres",
                "host": "localhost",
                "port": 5432,
                "database": "orders",
                "username": "app",
                "password": "pw",
                "query": "select 1 as n"
            }))
        );
    }

    #[tokio::test]
    async fn test_invalid_connection_sends_nothing() {
        let mock = MockBackend::new();
        assert!(execute_query(&mock, &ConnectionParams::new(), "select 1").await.is_err());
        assert!(execute_query(&mock, &conn(), "   ").await.is_err());
        assert!(get_tables(&mock, &ConnectionParams::new()).await.is_err());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_get_tables_and_save_command() {
        let mock = MockBackend::new();
        mock.on(
            Method::POST,
            "/db-query/get-tables",
            json!({"success": true, "tables": ["orders", "users"], "count": 2}),
        );
        assert_eq!(get_tables(&mock, &conn()).await.unwrap(), vec!["orders", "users"]);

        let mut c = conn();
        c.use_tunnel(15432, Some(3));
        assert_eq!(c.port, "15432");
        save_command(&mock, &c, "recent orders", None, "select * from orders").await.unwrap();
        save_command(&mock, &c, "recent orders", Some(" last 24h "), "select 1").await.unwrap();
        let saved = mock.calls_to(Method::POST, "/db-query/sql-commands");
        assert_eq!(
            saved[0].body,
            Some(json!({
                "tunnel_id": 3,
                "name": "recent orders",
                "sql_command": "select * from orders",
                "description": null
            }))
        );
        assert_eq!(saved[1].body.as_ref().unwrap()["description"], json!("last 24h"));
    }

    #[test]
    fn test_select_template() {
        assert_eq!(select_template("users"), "SELECT * FROM users LIMIT 100;");
    }
}

//! Recording backend for protocol tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use super::client::Backend;
use crate::error::{ConsoleError, ConsoleResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Answers scripted responses per `(method, path)` and records every call.
/// Queued responses are consumed in order; the last one repeats. Unscripted
/// routes answer `{"success": true}`.
#[derive(Default)]
pub struct MockBackend {
    routes: Mutex<HashMap<(Method, String), VecDeque<ConsoleResult<Value>>>>,
    calls: Mutex<Vec<Call>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, path: &str, response: Value) -> &Self {
        self.push(method, path, Ok(response))
    }

    pub fn fail(&self, method: Method, path: &str, err: ConsoleError) -> &Self {
        self.push(method, path, Err(err))
    }

    fn push(&self, method: Method, path: &str, response: ConsoleResult<Value>) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method && c.path == path)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> ConsoleResult<Value> {
        self.calls.lock().unwrap().push(Call {
            method: method.clone(),
            path: path.to_string(),
            body,
        });

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&(method, path.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Ok(json!({"success": true}))),
            Some(queue) => queue.front().cloned().unwrap_or(Ok(json!({"success": true}))),
            None => Ok(json!({"success": true})),
        }
    }
}

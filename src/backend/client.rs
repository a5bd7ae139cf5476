use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, error, info, trace};
use url::Url;

use super::envelope::{Envelope, Reply};
use crate::error::{ConsoleError, ConsoleResult};

/// Seam between the console and the management backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Issue one request and return the decoded JSON body
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> ConsoleResult<Value>;

    /// Issue one request and unwrap the `{success, message, ...}` envelope
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> ConsoleResult<Reply> {
        let value = self.send(method, path, body).await?;
        Envelope::from_value(value).into_result()
    }
}

#[derive(Clone)]
pub struct BackendClient {
    pub http: Client,
    pub base_url: Url,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> ConsoleResult<Self> {
        info!("Initializing backend client");

        let base_url = Url::parse(base_url)?;
        let http = Client::builder().timeout(timeout).build()?;

        info!(
            "Backend client initialized: base_url={}, timeout={:?}",
            base_url, timeout
        );

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> ConsoleResult<Url> {
        let full = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&full)?)
    }
}

#[async_trait]
impl Backend for BackendClient {
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> ConsoleResult<Value> {
        let url = self.endpoint(path)?;
        debug!("Backend request: {} {}", method, url);

        let mut req = self
            .http
            .request(method.clone(), url.clone())
            .header("Accept", "application/json");
        if let Some(body) = &body {
            trace!("Request body keys: {:?}", body.as_object().map(|m| m.keys().collect::<Vec<_>>()));
            req = req.json(body);
        }

        let res = req.send().await.map_err(|e| {
            error!("Backend request failed: {} {} - {}", method, url, e);
            ConsoleError::from(e)
        })?;

        let status = res.status();
        debug!("Backend response: {} {} -> {}", method, url, status);

        // Error statuses still carry the envelope, so the body is decoded either way
        let text = res.text().await?;
        if text.trim().is_empty() {
            if status.is_success() {
                debug!("Empty response body, returning success");
                return Ok(serde_json::json!({"success": true}));
            }
            return Err(ConsoleError::Decode {
                status: status.as_u16(),
                body: String::new(),
            });
        }

        trace!("Response body length: {} bytes", text.len());
        serde_json::from_str(&text).map_err(|_| {
            error!("Non-JSON response from {} {}: HTTP {}", method, url, status);
            ConsoleError::Decode {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            }
        })
    }
}

/// Parse a registry method name
pub fn parse_method(method: &str) -> Method {
    match method.to_uppercase().as_str() {
        "POST" => Method::POST,
        "PUT" => Method::PUT,
        "PATCH" => Method::PATCH,
        "DELETE" => Method::DELETE,
        _ => Method::GET,
    }
}

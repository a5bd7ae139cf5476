//! Configuration management for awsdesk
//!
//! Stores user preferences in ~/.config/awsdesk/config.yaml (XDG compliant)
//! Falls back to ~/.awsdesk/config.yaml if XDG dirs not available

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
pub const BACKEND_URL_ENV: &str = "AWSDESK_BACKEND_URL";

/// User configuration stored on disk
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Base URL of the management backend
    #[serde(default)]
    pub backend_url: Option<String>,

    /// Last viewed panel resource
    #[serde(default)]
    pub last_panel: Option<String>,

    #[serde(default)]
    pub notification_ttl_secs: Option<u64>,

    /// Delay before the single re-fetch after a state transition
    #[serde(default)]
    pub transition_refresh_delay_ms: Option<u64>,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Self {
        let path = Self::config_path();

        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config: {}", e);
                }
            }
        }

        Self::default()
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_yaml::to_string(self)?;
        fs::write(&path, contents)?;

        tracing::debug!("Config saved to {:?}", path);
        Ok(())
    }

    /// Get the config file path
    /// Uses XDG config directory if available, otherwise ~/.awsdesk/
    pub fn config_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            return config_dir.join("awsdesk").join("config.yaml");
        }

        if let Some(home) = dirs::home_dir() {
            return home.join(".awsdesk").join("config.yaml");
        }

        PathBuf::from(".awsdesk").join("config.yaml")
    }

    /// Update last panel and save
    pub fn set_last_panel(&mut self, resource: &str) -> Result<()> {
        if self.last_panel.as_deref() == Some(resource) {
            return Ok(());
        }
        self.last_panel = Some(resource.to_string());
        self.save()
    }

    /// Backend URL: CLI flag -> env -> config -> default
    pub fn effective_backend_url(&self, cli: Option<&str>) -> String {
        Self::resolve_backend_url(
            cli,
            std::env::var(BACKEND_URL_ENV).ok().as_deref(),
            self.backend_url.as_deref(),
        )
    }

    fn resolve_backend_url(cli: Option<&str>, env: Option<&str>, file: Option<&str>) -> String {
        [cli, env, file]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or(DEFAULT_BACKEND_URL)
            .to_string()
    }

    pub fn notification_ttl(&self) -> Duration {
        self.notification_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(crate::notify::DEFAULT_TTL)
    }

    pub fn transition_delay(&self) -> Duration {
        Duration::from_millis(self.transition_refresh_delay_ms.unwrap_or(2000))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(30))
    }
}

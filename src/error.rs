//! Error taxonomy for everything that talks to the backend

use thiserror::Error;

use crate::notify::Level;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsoleError {
    /// Caught client-side, before any request is issued
    #[error("{0}")]
    Validation(String),

    /// Backend answered with `success: false`
    #[error("{message}")]
    Rejected { message: String, errors: Vec<String> },

    /// Request never produced a response (connection refused, timeout, ...)
    #[error("Request failed: {0}")]
    Transport(String),

    /// Response body was not the JSON envelope we expect
    #[error("Invalid response (HTTP {status}): {body}")]
    Decode { status: u16, body: String },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ConsoleError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Validation problems are warnings, everything else is a failure
    pub fn level(&self) -> Level {
        match self {
            Self::Validation(_) => Level::Warning,
            _ => Level::Danger,
        }
    }

    /// Text shown in the notification log, sub-errors rendered as bullets
    pub fn notification_text(&self) -> String {
        match self {
            Self::Rejected { message, errors } if !errors.is_empty() => {
                let mut text = message.clone();
                for err in errors {
                    text.push_str("\n• ");
                    text.push_str(err);
                }
                text
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

pub type ConsoleResult<T> = std::result::Result<T, ConsoleError>;

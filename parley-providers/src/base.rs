//! Base trait for remote chat endpoints

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for endpoint operations
#[derive(Error, Debug)]
pub enum EndpointError {
    /// The request never produced a response (connect failure, timeout, ...)
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered, but not with a usable reply
    #[error("Invalid response: {0}")]
    Protocol(String),
}

impl EndpointError {
    /// Whether the request failed before a usable answer could be read
    pub fn is_transport(&self) -> bool {
        matches!(self, EndpointError::Transport(_) | EndpointError::Status { .. })
    }
}

impl From<reqwest::Error> for EndpointError {
    fn from(e: reqwest::Error) -> Self {
        EndpointError::Transport(e.to_string())
    }
}

pub type EndpointResult<T> = Result<T, EndpointError>;

/// Request body sent to the remote service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
}

/// Response body expected from the remote service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

impl ChatResponse {
    /// The reply text, if the body carries a non-empty string `response`
    pub fn into_reply(self) -> EndpointResult<String> {
        match self.response {
            Some(serde_json::Value::String(text)) if !text.is_empty() => Ok(text),
            Some(serde_json::Value::String(_)) => {
                Err(EndpointError::Protocol("empty response field".to_string()))
            }
            Some(other) => Err(EndpointError::Protocol(format!(
                "response field is not a string: {}",
                other
            ))),
            None => Err(EndpointError::Protocol("missing response field".to_string())),
        }
    }
}

/// A remote service producing one reply per user message
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    /// Send a user message and wait for the reply text
    async fn send(&self, message: &str) -> EndpointResult<String>;
}

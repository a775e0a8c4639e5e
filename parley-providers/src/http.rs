//! HTTP chat endpoint

use async_trait::async_trait;
use parley_core::config::EndpointConfig;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::base::{ChatEndpoint, ChatRequest, ChatResponse, EndpointError, EndpointResult};

/// Sends `{"message": ...}` as a JSON POST and reads `{"response": ...}`
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: Client,
    url: String,
}

impl HttpEndpoint {
    /// Create an endpoint with a bounded wait per request
    pub fn new(url: impl Into<String>, timeout: Duration) -> EndpointResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Create an endpoint from configuration
    pub fn from_config(config: &EndpointConfig) -> EndpointResult<Self> {
        Self::new(
            config.url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Target URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatEndpoint for HttpEndpoint {
    async fn send(&self, message: &str) -> EndpointResult<String> {
        debug!("Sending chat request to {}", self.url);

        let request = ChatRequest {
            message: message.to_string(),
        };
        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Chat endpoint returned HTTP {}", status);
            return Err(EndpointError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| EndpointError::Protocol(format!("malformed body: {}", e)))?;
        parsed.into_reply()
    }
}

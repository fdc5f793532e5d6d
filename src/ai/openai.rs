//! OpenAI chat-completions client
//!
//! Speaks the `/chat/completions` wire format and hands the decoded body back
//! untouched; timing, timeouts and metadata belong to the invoker.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::InvokeError;

const PROBE_TIMEOUT_SECS: u64 = 10;

/// Message role on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Request body for `/chat/completions`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatBody {
    pub model: String,
    pub messages: Vec<Message>,
}

/// One outbound call: where to send it, how to authenticate, what to send
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub base_url: String,
    pub api_key: String,
    pub body: ChatBody,
}

impl ChatRequest {
    /// Single-turn request with `content` as the user message
    pub fn single_turn(base_url: &str, api_key: &str, model: &str, content: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            body: ChatBody {
                model: model.to_string(),
                messages: vec![Message {
                    role: Role::User,
                    content,
                }],
            },
        }
    }

    pub fn content(&self) -> &str {
        self.body
            .messages
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// Anything that can carry a chat request to a model and bring back the body
pub trait ChatTransport: Send + Sync + 'static {
    fn send(&self, request: ChatRequest)
        -> impl Future<Output = Result<Value, InvokeError>> + Send;
}

/// HTTP transport for OpenAI-compatible endpoints
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
}

impl OpenAiClient {
    /// Create a new client.
    ///
    /// No request timeout is set here; the invoker bounds each call.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("forge-assistant/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

impl ChatTransport for OpenAiClient {
    fn send(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<Value, InvokeError>> + Send {
        let client = self.client.clone();
        async move {
            let url = format!("{}/chat/completions", request.base_url);
            debug!(model = %request.body.model, "Sending completion request");

            let response = client
                .post(&url)
                .bearer_auth(&request.api_key)
                .header(header::CONTENT_TYPE, "application/json")
                .json(&request.body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), "Completion endpoint returned an error");
                return Err(InvokeError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| InvokeError::Parse(e.to_string()))
        }
    }
}

/// Check a credential with a lightweight GET against `/models`.
///
/// Runs in its own task and gives up after ten seconds; any failure reads as
/// an invalid key.
pub async fn probe_api_key(base_url: &str, api_key: &str) -> bool {
    let client = match OpenAiClient::new() {
        Ok(c) => c.client,
        Err(e) => {
            warn!("{:#}", e);
            return false;
        }
    };
    let url = format!("{}/models", base_url.trim_end_matches('/'));
    let api_key = api_key.to_string();

    let mut handle = tokio::spawn(async move {
        client
            .get(&url)
            .bearer_auth(api_key)
            .send()
            .await
            .map(|r| r.status() == StatusCode::OK)
    });

    match tokio::time::timeout(Duration::from_secs(PROBE_TIMEOUT_SECS), &mut handle).await {
        Ok(Ok(Ok(valid))) => valid,
        Ok(Ok(Err(e))) => {
            debug!("Credential probe failed: {}", e);
            false
        }
        Ok(Err(e)) => {
            warn!("Credential probe task failed: {}", e);
            false
        }
        Err(_) => {
            handle.abort();
            warn!("Credential probe timed out after {} seconds", PROBE_TIMEOUT_SECS);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest::single_turn(
            "https://api.openai.com/v1/",
            "sk-test",
            "gpt-4o-mini",
            "Hello".to_string(),
        );
        assert_eq!(request.base_url, "https://api.openai.com/v1");
        assert_eq!(request.content(), "Hello");

        let json = serde_json::to_value(&request.body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "user", "content": "Hello"}]
            })
        );
    }

    #[tokio::test]
    async fn test_probe_unreachable_endpoint_is_invalid() {
        // Port 9 (discard) on localhost refuses connections
        assert!(!probe_api_key("http://127.0.0.1:9", "sk-test").await);
    }
}

//! Chat completion client for the remote text-generation service.
//!
//! One (system, user) message pair in, one completion out. The engine
//! templates its prompts internally; nothing here is a generic chat
//! surface. The wire shape is the Ollama-style `/api/chat` endpoint
//! with streaming disabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use loam_core::{ChatService, LoamError, Result};

const SERVICE_NAME: &str = "chat";

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// HTTP chat provider with a fixed model and per-request timeout.
pub struct HttpChatProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpChatProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoamError::ServiceUnavailable {
                service: format!("{SERVICE_NAME}: {e}"),
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

fn map_transport_error(e: reqwest::Error) -> LoamError {
    if e.is_timeout() {
        LoamError::ServiceTimeout {
            service: SERVICE_NAME.to_string(),
        }
    } else {
        LoamError::ServiceUnavailable {
            service: format!("{SERVICE_NAME}: {e}"),
        }
    }
}

#[async_trait]
impl ChatService for HttpChatProvider {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(model = %self.model, "requesting chat completion");

        let response = self
            .http
            .post(&url)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user },
                ],
                "stream": false,
            }))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoamError::ServiceError {
                service: SERVICE_NAME.to_string(),
                code: i64::from(status.as_u16()),
                message: body.chars().take(200).collect(),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(map_transport_error)?;
        Ok(parsed.message.content.trim().to_string())
    }

    async fn is_available(&self) -> bool {
        match self.http.get(&self.base_url).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!("chat service unreachable: {e}");
                false
            }
        }
    }
}

//! Client library for the remote semantic-search service.
//!
//! The service speaks JSON-RPC 2.0 over HTTP POST; its operations are
//! exposed as `tools/call` named tools. Transport failures map to
//! `ServiceUnavailable`, timeouts to `ServiceTimeout`, non-2xx statuses
//! and JSON-RPC error objects to `ServiceError`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use loam_core::{
    ContextualHit, JournalEntry, LoamError, Result, SearchHit, SemanticService,
};

const SERVICE_NAME: &str = "semantic";

static COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("count regex"));

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// JSON-RPC client for the semantic service.
pub struct SemanticClient {
    http: reqwest::Client,
    base_url: String,
    next_id: AtomicU64,
}

impl SemanticClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoamError::ServiceUnavailable {
                service: format!("{SERVICE_NAME}: {e}"),
            })?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Issue one `tools/call` invocation and unwrap the JSON-RPC envelope.
    async fn call(&self, tool: &str, arguments: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": tool, "arguments": arguments },
        });
        debug!(tool, id, "calling semantic service");

        let response = self
            .http
            .post(&self.base_url)
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoamError::ServiceError {
                service: SERVICE_NAME.to_string(),
                code: i64::from(status.as_u16()),
                message: truncate(&body, 200),
            });
        }

        let envelope: RpcResponse = response.json().await.map_err(map_transport_error)?;
        if let Some(error) = envelope.error {
            return Err(LoamError::ServiceError {
                service: SERVICE_NAME.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        envelope.result.ok_or_else(|| LoamError::ServiceError {
            service: SERVICE_NAME.to_string(),
            code: -1,
            message: "response carried neither result nor error".to_string(),
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

fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        s.to_string()
    } else {
        let mut end = limit;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

/// Pull the first integer out of a free-text acknowledgment like
/// "Generated embeddings for 12 notes".
fn parse_count(message: &str) -> usize {
    COUNT_RE
        .find(message)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or_else(|| {
            warn!("no count found in acknowledgment: {message:?}");
            0
        })
}

/// The acknowledgment may arrive as a bare string or wrapped in a
/// `message` field.
fn ack_text(result: &Value) -> String {
    match result {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

#[async_trait]
impl SemanticService for SemanticClient {
    async fn semantic_search(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        let result = self
            .call(
                "semantic_search",
                json!({ "query": query, "limit": limit, "threshold": threshold }),
            )
            .await?;
        let notes = result.get("notes").cloned().unwrap_or_else(|| json!([]));
        Ok(serde_json::from_value(notes)?)
    }

    async fn contextual_search(&self, query: &str, limit: usize) -> Result<Vec<ContextualHit>> {
        let result = self
            .call(
                "contextual_search",
                json!({ "query": query, "limit": limit }),
            )
            .await?;
        let notes = result.get("notes").cloned().unwrap_or_else(|| json!([]));
        Ok(serde_json::from_value(notes)?)
    }

    async fn generate_embeddings(&self, force: bool) -> Result<usize> {
        let result = self
            .call("generate_embeddings", json!({ "force": force }))
            .await?;
        Ok(parse_count(&ack_text(&result)))
    }

    async fn add_daily_entry(&self, entry: &JournalEntry) -> Result<()> {
        self.call(
            "add_daily_entry",
            json!({
                "timestamp": entry.timestamp.to_rfc3339(),
                "title": entry.title,
                "points": entry.points,
                "next_steps": entry.next_steps,
                "tags": entry.tags,
            }),
        )
        .await?;
        Ok(())
    }

    async fn is_available(&self) -> bool {
        // Transport-level probe only: any HTTP answer means the service
        // is reachable, whatever it thinks of a bare GET.
        match self.http.get(&self.base_url).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!("semantic service unreachable: {e}");
                false
            }
        }
    }
}

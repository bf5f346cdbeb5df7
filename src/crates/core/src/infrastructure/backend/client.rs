//! Financial agent client
//!
//! One `POST {backend}/chat` per request, never retried. The reply is exposed as a
//! channel of `BackendItem`s fed either from a single JSON document or from the
//! backend's SSE stream.

use super::stream_handler::handle_backend_stream;
use super::types::{BackendItem, ChatRequestBody, ChatResponseBody, ClientContext};
use crate::service::config::NexusConfig;
use crate::util::errors::{NexusError, NexusResult};
use crate::util::types::Message;
use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Everything the backend needs for one turn.
#[derive(Debug, Clone)]
pub struct ChatCall {
    /// Latest human message
    pub message: String,
    pub messages: Vec<Message>,
    pub token: String,
    pub session_id: Option<String>,
    pub widget_context: Option<String>,
    pub client_context: ClientContext,
}

/// Ordered reply items. Dropping it releases the backend connection.
#[derive(Debug)]
pub struct BackendReply {
    rx: mpsc::UnboundedReceiver<NexusResult<BackendItem>>,
}

impl BackendReply {
    pub fn new(rx: mpsc::UnboundedReceiver<NexusResult<BackendItem>>) -> Self {
        Self { rx }
    }

    /// Reply made of already-known items, used by in-process backends.
    pub fn from_items(items: Vec<NexusResult<BackendItem>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for item in items {
            let _ = tx.send(item);
        }
        Self { rx }
    }

    /// `None` once the backend's turn is over.
    pub async fn next(&mut self) -> Option<NexusResult<BackendItem>> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, call: ChatCall) -> NexusResult<BackendReply>;
}

#[derive(Debug, Clone)]
pub struct BackendClientConfig {
    pub base_url: String,
    /// Bound on connecting and receiving the response head (and a JSON body)
    pub request_timeout: Duration,
    /// Longest gap between two streamed items
    pub idle_timeout: Duration,
    pub chunk_size: usize,
}

impl BackendClientConfig {
    pub fn from_config(config: &NexusConfig) -> Self {
        Self {
            base_url: config.financial_agent_url.clone(),
            request_timeout: config.backend_timeout(),
            idle_timeout: config.stream_idle_timeout(),
            chunk_size: config.chunk_size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    config: BackendClientConfig,
}

impl BackendClient {
    pub fn new(config: BackendClientConfig) -> NexusResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| NexusError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn from_config(config: &NexusConfig) -> NexusResult<Self> {
        Self::new(BackendClientConfig::from_config(config))
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.config.base_url.trim_end_matches('/'))
    }

    fn unavailable(&self, error: reqwest::Error) -> NexusError {
        if error.is_timeout() {
            NexusError::BackendUnavailable(format!(
                "request timed out after {}s",
                self.config.request_timeout.as_secs()
            ))
        } else {
            NexusError::BackendUnavailable(error.to_string())
        }
    }
}

#[async_trait]
impl ChatBackend for BackendClient {
    async fn chat(&self, call: ChatCall) -> NexusResult<BackendReply> {
        let url = self.chat_url();
        let mut query = vec![("token", call.token.as_str())];
        if let Some(session_id) = call.session_id.as_deref() {
            query.push(("session_id", session_id));
        }
        let body = ChatRequestBody {
            message: &call.message,
            messages: &call.messages,
            client_context: &call.client_context,
            widget_context: call.widget_context.as_deref(),
        };

        info!(
            "Calling financial agent: url={}, session_id={}, messages={}, widget_context={}",
            url,
            call.session_id.as_deref().unwrap_or("<new>"),
            call.messages.len(),
            call.widget_context.is_some()
        );

        let request = self
            .client
            .post(&url)
            .query(&query)
            .header(ACCEPT, "text/event-stream, application/json")
            .json(&body)
            .send();

        let response = match timeout(self.config.request_timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!("Financial agent request failed: {}", e);
                return Err(self.unavailable(e));
            }
            Err(_) => {
                error!(
                    "Financial agent did not answer within {}s",
                    self.config.request_timeout.as_secs()
                );
                return Err(NexusError::BackendUnavailable(format!(
                    "request timed out after {}s",
                    self.config.request_timeout.as_secs()
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = match timeout(self.config.request_timeout, response.text()).await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    debug!("Failed to read error body: {}", e);
                    String::new()
                }
                Err(_) => {
                    debug!("Error body not received within {}s", self.config.request_timeout.as_secs());
                    String::new()
                }
            };
            let message = extract_error_message(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            error!(
                "Financial agent returned an error: status={}, message={}",
                status.as_u16(),
                message
            );
            return Err(NexusError::BackendError {
                status: status.as_u16(),
                message,
            });
        }

        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/event-stream"));

        let (tx, rx) = mpsc::unbounded_channel();
        if is_stream {
            debug!("Financial agent replied with an event stream");
            tokio::spawn(handle_backend_stream(response, tx, self.config.idle_timeout));
            return Ok(BackendReply::new(rx));
        }

        let body = match timeout(self.config.request_timeout, response.json::<ChatResponseBody>())
            .await
        {
            Ok(Ok(body)) => body,
            Ok(Err(e)) if e.is_decode() => {
                error!("Financial agent sent an unreadable reply: {}", e);
                return Err(NexusError::BackendError {
                    status: status.as_u16(),
                    message: format!("invalid response body: {}", e),
                });
            }
            Ok(Err(e)) => return Err(self.unavailable(e)),
            Err(_) => {
                return Err(NexusError::BackendUnavailable(format!(
                    "response body not received within {}s",
                    self.config.request_timeout.as_secs()
                )))
            }
        };

        debug!(
            "Financial agent replied: chars={}, artifacts={}",
            body.response.chars().count(),
            body.artifacts.len()
        );
        for item in body.into_items(self.config.chunk_size) {
            let _ = tx.send(Ok(item));
        }
        Ok(BackendReply::new(rx))
    }
}

/// Best human-readable message in an error body: `detail`, `error` or `message`.
fn extract_error_message(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let from_json = serde_json::from_str::<Value>(text).ok().and_then(|value| {
        ["detail", "error", "message"].iter().find_map(|key| {
            match value.get(*key)? {
                Value::String(message) => Some(message.clone()),
                Value::Object(inner) => inner
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                Value::Null => None,
                other => Some(other.to_string()),
            }
        })
    });
    Some(from_json.unwrap_or_else(|| text.chars().take(500).collect()))
}

use crate::util::types::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool-category tag sent with every backend call. Decides which backend
/// capabilities are exposed to this class of client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContext {
    #[serde(rename = "type")]
    pub context_type: String,
    pub capabilities: Vec<String>,
}

impl ClientContext {
    pub fn new(context_type: impl Into<String>, capabilities: Vec<String>) -> Self {
        Self {
            context_type: context_type.into(),
            capabilities,
        }
    }

    pub fn openbb() -> Self {
        Self::new(
            "openbb",
            vec![
                "charts".to_string(),
                "tables".to_string(),
                "widgets".to_string(),
            ],
        )
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequestBody<'a> {
    pub message: &'a str,
    pub messages: &'a [Message],
    pub client_context: &'a ClientContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget_context: Option<&'a str>,
}

/// Single-document reply of `POST /chat`.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseBody {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<Value>,
}

impl ChatResponseBody {
    /// Session first, then text split into chunks, then artifacts.
    pub fn into_items(self, chunk_size: usize) -> Vec<BackendItem> {
        let mut items = Vec::new();
        if let Some(session_id) = self.session_id.filter(|id| !id.is_empty()) {
            items.push(BackendItem::Session(session_id));
        }
        items.extend(
            split_chunks(&self.response, chunk_size)
                .into_iter()
                .map(BackendItem::TextChunk),
        );
        items.extend(self.artifacts.into_iter().map(BackendItem::Artifact));
        items
    }
}

/// One element of the backend reply, in backend emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendItem {
    TextChunk(String),
    /// Raw artifact payload; validated by the artifact translator
    Artifact(Value),
    /// Conversation id assigned by the backend
    Session(String),
}

/// Splits on character boundaries into pieces of at most `size` characters.
pub fn split_chunks(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Human,
    Ai,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::Human => "human",
            MessageRole::Ai => "ai",
            MessageRole::Tool => "tool",
        }
    }
}

/// Message body: plain text for human/ai turns, arbitrary JSON otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Structured(Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    pub fn to_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Structured(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_format: Option<Value>,
}

/// Widget data returned by the client for one data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataContent {
    pub items: Vec<DataItem>,
    pub extra_citations: Vec<Value>,
}

/// Acknowledgement of a client command (add/update widget, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultItem {
    Data(DataContent),
    Command(CommandResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    #[serde(default)]
    pub content: MessageContent,
    /// Client function a tool message answers (e.g. `get_widget_data`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub input_arguments: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<ToolResultItem>,
    #[serde(default)]
    pub extra_state: Map<String, Value>,
    #[serde(default)]
    pub extra_citations: Vec<Value>,
}

impl Message {
    pub fn human(text: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Human, MessageContent::Text(text.into()))
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Ai, MessageContent::Text(text.into()))
    }

    pub fn tool(content: Value) -> Self {
        Self::with_role(MessageRole::Tool, MessageContent::Structured(content))
    }

    fn with_role(role: MessageRole, content: MessageContent) -> Self {
        Self {
            role,
            content,
            function: None,
            input_arguments: Map::new(),
            data: Vec::new(),
            extra_state: Map::new(),
            extra_citations: Vec::new(),
        }
    }

    pub fn is_human(&self) -> bool {
        self.role == MessageRole::Human
    }

    pub fn is_tool(&self) -> bool {
        self.role == MessageRole::Tool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_results_resolve_to_data_or_command() {
        let message: Message = serde_json::from_value(json!({
            "role": "tool",
            "function": "get_widget_data",
            "data": [
                {"items": [{"content": "price: 150.25"}], "extra_citations": []},
                {"status": "success", "message": "widget updated"}
            ],
            "extra_state": {}
        }))
        .unwrap();

        assert!(message.is_tool());
        assert!(matches!(message.data[0], ToolResultItem::Data(_)));
        assert!(matches!(message.data[1], ToolResultItem::Command(_)));
    }

    #[test]
    fn null_extra_state_is_a_schema_error() {
        let result = serde_json::from_value::<Message>(json!({
            "role": "human",
            "content": "hi",
            "extra_state": null
        }));
        assert!(result.is_err());
    }
}

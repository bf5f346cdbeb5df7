use super::message::{Message, MessageRole};
use super::widget::{WidgetDescriptor, Widgets};
use serde::{Deserialize, Serialize};

/// Inbound unit of work from the dashboard client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgets: Option<Widgets>,
}

impl QueryRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            token: None,
            session_id: None,
            widgets: None,
        }
    }

    pub fn with_widgets(mut self, primary: Vec<WidgetDescriptor>) -> Self {
        self.widgets = Some(Widgets {
            primary,
            secondary: Vec::new(),
        });
        self
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_role(&self) -> Option<MessageRole> {
        self.last_message().map(|message| message.role)
    }

    /// Text of the most recent human turn.
    pub fn latest_human_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.is_human())
            .map(|message| message.content.to_text())
    }

    pub fn primary_widgets(&self) -> &[WidgetDescriptor] {
        self.widgets
            .as_ref()
            .map(|widgets| widgets.primary.as_slice())
            .unwrap_or_default()
    }

    pub fn secondary_widgets(&self) -> &[WidgetDescriptor] {
        self.widgets
            .as_ref()
            .map(|widgets| widgets.secondary.as_slice())
            .unwrap_or_default()
    }

    pub fn find_widget(&self, uuid: &str) -> Option<&WidgetDescriptor> {
        self.widgets.as_ref().and_then(|widgets| widgets.find(uuid))
    }
}

//! Chat commands answered locally, without a backend call.

use crate::service::catalog::WidgetCatalog;
use crate::util::types::QueryRequest;

pub const NO_MESSAGE_REPLY: &str = "No message provided.";

const LIST_WIDGETS: [&str; 4] = ["list widgets", "widgets", "show widgets", "available widgets"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// The request has no human message at all
    NoMessage,
    ListWidgets,
}

impl ChatCommand {
    /// `ListWidgets` only applies when no widget round trip is pending.
    pub fn detect(request: &QueryRequest) -> Option<Self> {
        let Some(text) = request.latest_human_text() else {
            return Some(ChatCommand::NoMessage);
        };
        let is_list = LIST_WIDGETS.contains(&text.trim().to_lowercase().as_str());
        let last_is_human = request.last_message().is_some_and(|m| m.is_human());
        (is_list && last_is_human && request.primary_widgets().is_empty())
            .then_some(ChatCommand::ListWidgets)
    }

    pub fn reply(&self, catalog: &WidgetCatalog) -> String {
        match self {
            ChatCommand::NoMessage => NO_MESSAGE_REPLY.to_string(),
            ChatCommand::ListWidgets => catalog.format_list(),
        }
    }
}

//! Phase-2 reply parsing
//!
//! The client answers `get_widget_data` with a tool-role message. Per-widget data
//! arrives either as OpenBB `DataContent` blocks in `data` (positionally matching
//! `input_arguments.data_sources`) or as a structured `content` list of
//! `{uuid|widget_uuid, status?, payload|data|...}` entries.

use crate::util::types::{Message, MessageContent, QueryRequest, ToolResultItem};
use log::{debug, warn};
use nexus_agent_transport::{Citation, CitationSource, WidgetDataSource};
use serde_json::{Map, Value};

/// Data one widget contributed to the answer.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetResult {
    pub widget_uuid: Option<String>,
    pub origin: Option<String>,
    pub widget_id: Option<String>,
    pub name: Option<String>,
    /// One entry per data item, rendered as text
    pub items: Vec<String>,
}

impl WidgetResult {
    fn new(request: &QueryRequest, widget_uuid: Option<String>, items: Vec<String>) -> Self {
        let widget = widget_uuid.as_deref().and_then(|uuid| request.find_widget(uuid));
        Self {
            origin: widget.map(|w| w.origin.clone()),
            widget_id: widget.map(|w| w.widget_id.clone()),
            name: widget.map(|w| w.display_name().to_string()),
            widget_uuid,
            items,
        }
    }
}

/// Widget reference from a reply's `input_arguments.data_sources`.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub widget_uuid: Option<String>,
    pub input_args: Map<String, Value>,
}

impl From<&WidgetDataSource> for SourceRef {
    fn from(source: &WidgetDataSource) -> Self {
        Self {
            widget_uuid: source.widget_uuid.clone(),
            input_args: source.input_args.clone(),
        }
    }
}

/// Data sources echoed back in the reply; `requested` fills in when the reply has none.
pub fn source_refs(reply: &Message, requested: &[WidgetDataSource]) -> Vec<SourceRef> {
    let echoed: Vec<SourceRef> = reply
        .input_arguments
        .get("data_sources")
        .and_then(Value::as_array)
        .map(|sources| {
            sources
                .iter()
                .filter_map(Value::as_object)
                .map(|source| SourceRef {
                    widget_uuid: source
                        .get("widget_uuid")
                        .or_else(|| source.get("uuid"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    input_args: source
                        .get("input_args")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    if echoed.is_empty() {
        requested.iter().map(SourceRef::from).collect()
    } else {
        echoed
    }
}

/// All widget data carried by `reply`. Empty for command callbacks.
pub fn extract_widget_results(
    reply: &Message,
    request: &QueryRequest,
    refs: &[SourceRef],
) -> Vec<WidgetResult> {
    let mut results = Vec::new();

    for (index, result) in reply.data.iter().enumerate() {
        let ToolResultItem::Data(content) = result else {
            continue;
        };
        let items: Vec<String> = content
            .items
            .iter()
            .map(|item| value_text(&item.content))
            .collect();
        if items.is_empty() {
            continue;
        }
        let uuid = refs.get(index).and_then(|r| r.widget_uuid.clone());
        results.push(WidgetResult::new(request, uuid, items));
    }

    if results.is_empty() {
        results = structured_results(&reply.content, request, refs);
    }

    debug!(
        "Phase-2 reply parsed: widgets={}, items={}",
        results.len(),
        results.iter().map(|r| r.items.len()).sum::<usize>()
    );
    results
}

fn structured_results(
    content: &MessageContent,
    request: &QueryRequest,
    refs: &[SourceRef],
) -> Vec<WidgetResult> {
    let value = match content {
        MessageContent::Structured(value) => value.clone(),
        MessageContent::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) if value.is_array() || value.is_object() => value,
            _ => return Vec::new(),
        },
    };
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(_) => vec![value],
        _ => return Vec::new(),
    };

    let mut results = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            continue;
        };

        // DataContent-shaped entry inside `content`
        if let Some(items) = obj.get("items").and_then(Value::as_array) {
            let items: Vec<String> = items
                .iter()
                .filter_map(|item| item.get("content"))
                .map(value_text)
                .collect();
            if !items.is_empty() {
                let uuid = refs.get(index).and_then(|r| r.widget_uuid.clone());
                results.push(WidgetResult::new(request, uuid, items));
            }
            continue;
        }

        let Some(uuid) = obj
            .get("uuid")
            .or_else(|| obj.get("widget_uuid"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        if obj.get("status").and_then(Value::as_str) == Some("error") {
            warn!("Widget {} reported an error; its data is skipped", uuid);
            continue;
        }

        let payload = ["payload", "data", "content"]
            .iter()
            .find_map(|key| obj.get(*key).filter(|value| !value.is_null()))
            .cloned()
            .unwrap_or_else(|| {
                let rest: Map<String, Value> = obj
                    .iter()
                    .filter(|(key, _)| {
                        !matches!(
                            key.as_str(),
                            "uuid" | "widget_uuid" | "status" | "origin" | "widget_id" | "id"
                        )
                    })
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                Value::Object(rest)
            });
        if payload.as_object().is_some_and(Map::is_empty) {
            continue;
        }
        results.push(WidgetResult::new(
            request,
            Some(uuid.to_string()),
            vec![value_text(&payload)],
        ));
    }
    results
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// One citation per data source that names a widget on the dashboard.
pub fn build_citations(request: &QueryRequest, refs: &[SourceRef]) -> Vec<Citation> {
    refs.iter()
        .filter_map(|source| {
            let uuid = source.widget_uuid.as_deref()?;
            let widget = request.find_widget(uuid)?;
            let mut metadata = Map::new();
            metadata.insert(
                "input_args".to_string(),
                Value::Object(source.input_args.clone()),
            );
            let details = if source.input_args.is_empty() {
                Vec::new()
            } else {
                vec![Value::Object(source.input_args.clone())]
            };
            Some(Citation {
                id: uuid::Uuid::new_v4().to_string(),
                source_info: CitationSource {
                    source_type: "widget".to_string(),
                    uuid: widget.uuid.clone(),
                    origin: widget.origin.clone(),
                    widget_id: widget.widget_id.clone(),
                    name: widget.display_name().to_string(),
                    description: widget.description.clone(),
                    metadata,
                },
                details,
            })
        })
        .collect()
}

//! Client-facing events
//!
//! `StreamEvent` is what the pipeline hands to the emitter. `OutboundEvent` is the
//! OpenBB copilot wire vocabulary; only the emitter turns one into the other.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const EVENT_MESSAGE_CHUNK: &str = "copilotMessageChunk";
const EVENT_MESSAGE_ARTIFACT: &str = "copilotMessageArtifact";
const EVENT_FUNCTION_CALL: &str = "copilotFunctionCall";
const EVENT_CITATION_COLLECTION: &str = "copilotCitationCollection";
const EVENT_STATUS_UPDATE: &str = "copilotStatusUpdate";

/// One widget reference inside a `copilotFunctionCall` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetDataSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_uuid: Option<String>,
    pub origin: String,
    /// Widget id from the backend's widgets.json
    pub id: String,
    #[serde(default)]
    pub input_args: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPayload {
    pub uuid: String,
    pub chart_type: String,
    pub name: String,
    pub description: String,
    pub rows: Vec<Value>,
    pub x_key: String,
    pub y_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TablePayload {
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub rows: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub uuid: String,
    pub origin: String,
    pub widget_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub source_info: CitationSource,
    #[serde(default)]
    pub details: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusLevel {
    Error,
}

/// Ordered unit of work handed to the emitter by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Phase 1 of the widget round trip
    WidgetDataRequest(Vec<WidgetDataSource>),
    TextChunk(String),
    Chart(ChartPayload),
    Table(TablePayload),
    UpdateWidget(WidgetDataSource),
    AddWidget(WidgetDataSource),
    Citations(Vec<Citation>),
}

/// Wire-level event. Has no terminal variant: a stream ends by closing the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    MessageChunk { delta: String },
    Chart(ChartPayload),
    Table(TablePayload),
    UpdateWidgetInDashboard(WidgetDataSource),
    AddWidgetToDashboard(WidgetDataSource),
    Citations(Vec<Citation>),
    GetWidgetData(Vec<WidgetDataSource>),
    StatusUpdate { level: StatusLevel, message: String },
}

impl OutboundEvent {
    /// Short kind name used in logs and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundEvent::MessageChunk { .. } => "message_chunk",
            OutboundEvent::Chart(_) => "chart",
            OutboundEvent::Table(_) => "table",
            OutboundEvent::UpdateWidgetInDashboard(_) => "update_widget_in_dashboard",
            OutboundEvent::AddWidgetToDashboard(_) => "add_widget_to_dashboard",
            OutboundEvent::Citations(_) => "citations",
            OutboundEvent::GetWidgetData(_) => "get_widget_data",
            OutboundEvent::StatusUpdate { .. } => "status_update",
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            OutboundEvent::MessageChunk { .. } => EVENT_MESSAGE_CHUNK,
            OutboundEvent::Chart(_) | OutboundEvent::Table(_) => EVENT_MESSAGE_ARTIFACT,
            OutboundEvent::UpdateWidgetInDashboard(_)
            | OutboundEvent::AddWidgetToDashboard(_)
            | OutboundEvent::GetWidgetData(_) => EVENT_FUNCTION_CALL,
            OutboundEvent::Citations(_) => EVENT_CITATION_COLLECTION,
            OutboundEvent::StatusUpdate { .. } => EVENT_STATUS_UPDATE,
        }
    }

    fn data(&self) -> Value {
        match self {
            OutboundEvent::MessageChunk { delta } => json!({ "delta": delta }),
            OutboundEvent::Chart(chart) => json!({
                "type": "chart",
                "uuid": chart.uuid,
                "name": chart.name,
                "description": chart.description,
                "content": chart.rows,
                "chart_params": {
                    "chartType": chart.chart_type,
                    "xKey": chart.x_key,
                    "yKey": chart.y_keys,
                },
            }),
            OutboundEvent::Table(table) => json!({
                "type": "table",
                "uuid": table.uuid,
                "name": table.name,
                "description": table.description,
                "content": table.rows,
            }),
            OutboundEvent::UpdateWidgetInDashboard(source) => {
                function_call("update_widget_in_dashboard", std::slice::from_ref(source))
            }
            OutboundEvent::AddWidgetToDashboard(source) => {
                function_call("add_widget_to_dashboard", std::slice::from_ref(source))
            }
            OutboundEvent::GetWidgetData(sources) => function_call("get_widget_data", sources),
            OutboundEvent::Citations(citations) => json!({ "citations": citations }),
            OutboundEvent::StatusUpdate { level, message } => json!({
                "eventType": level,
                "message": message,
                "hidden": false,
            }),
        }
    }

    /// Encodes the event as one SSE frame.
    pub fn to_frame(&self) -> SseFrame {
        SseFrame {
            kind: self.kind(),
            event: self.event_name(),
            data: self.data().to_string(),
        }
    }
}

fn function_call(function: &str, sources: &[WidgetDataSource]) -> Value {
    json!({
        "function": function,
        "input_arguments": { "data_sources": sources },
    })
}

/// Serialized SSE frame (`event:` name + single-line JSON `data:`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub kind: &'static str,
    pub event: &'static str,
    pub data: String,
}

impl SseFrame {
    pub fn to_wire(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }

    pub fn data_json(&self) -> Option<Value> {
        serde_json::from_str(&self.data).ok()
    }
}

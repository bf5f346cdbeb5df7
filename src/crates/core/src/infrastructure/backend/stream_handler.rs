use super::types::BackendItem;
use crate::util::errors::{NexusError, NexusResult};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use log::{debug, error, trace, warn};
use reqwest::Response;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Classification of one backend SSE `data:` payload.
#[derive(Debug, PartialEq)]
pub(crate) enum StreamItem {
    Text(String),
    Artifact(Value),
    Session(String),
    Error(String),
    End,
    Skip,
}

pub(crate) fn parse_stream_item(event_name: &str, data: &str) -> Result<StreamItem, String> {
    let raw = data.trim();
    if raw.is_empty() {
        return Ok(StreamItem::Skip);
    }
    if raw == "[DONE]" {
        return Ok(StreamItem::End);
    }

    let event_json: Value =
        serde_json::from_str(raw).map_err(|e| format!("SSE parsing error: {}, data: {}", e, raw))?;

    // The item type comes from the payload, falling back to the SSE event name.
    let item_type = event_json
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            (!event_name.is_empty() && event_name != "message").then(|| event_name.to_string())
        });

    let item = match item_type.as_deref() {
        Some("text_chunk") | Some("message_chunk") | Some("text") => {
            let text = ["content", "delta", "text"]
                .iter()
                .find_map(|key| event_json.get(*key).and_then(Value::as_str))
                .ok_or_else(|| format!("text item without content: {}", raw))?;
            StreamItem::Text(text.to_string())
        }
        Some("artifact") => match event_json.get("artifact") {
            Some(artifact) => StreamItem::Artifact(artifact.clone()),
            None => {
                let mut inline = event_json.clone();
                if let Some(obj) = inline.as_object_mut() {
                    obj.remove("type");
                }
                StreamItem::Artifact(inline)
            }
        },
        Some("session") => match event_json.get("session_id").and_then(Value::as_str) {
            Some(session_id) => StreamItem::Session(session_id.to_string()),
            None => StreamItem::Skip,
        },
        Some("error") => StreamItem::Error(
            event_json
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("An error occurred during streaming")
                .to_string(),
        ),
        Some("done") | Some("end") => StreamItem::End,
        other => {
            warn!(
                "Skipping unknown backend stream item: type={}",
                other.unwrap_or("<missing>")
            );
            StreamItem::Skip
        }
    };
    Ok(item)
}

/// Forwards a backend SSE reply into `tx_event`.
///
/// Text is forwarded as it arrives; artifacts are held until the backend's turn
/// ends so they always follow the text they belong to. Returns as soon as the
/// receiver is dropped, releasing the backend connection.
pub async fn handle_backend_stream(
    response: Response,
    tx_event: mpsc::UnboundedSender<NexusResult<BackendItem>>,
    idle_timeout: Duration,
) {
    let status = response.status().as_u16();
    let mut stream = response.bytes_stream().eventsource();
    let mut held_artifacts: Vec<Value> = Vec::new();

    loop {
        let sse_event = tokio::select! {
            _ = tx_event.closed() => {
                debug!("Backend stream consumer dropped; releasing connection");
                return;
            }
            next = timeout(idle_timeout, stream.next()) => next,
        };

        let sse = match sse_event {
            Ok(Some(Ok(sse))) => sse,
            Ok(None) => {
                flush_artifacts(&tx_event, &mut held_artifacts);
                return;
            }
            Ok(Some(Err(e))) => {
                let error_msg = format!("SSE stream error: {}", e);
                error!("{}", error_msg);
                let _ = tx_event.send(Err(NexusError::BackendUnavailable(error_msg)));
                return;
            }
            Err(_) => {
                let error_msg = format!("SSE stream idle for {}s", idle_timeout.as_secs());
                error!("{}", error_msg);
                let _ = tx_event.send(Err(NexusError::BackendUnavailable(error_msg)));
                return;
            }
        };

        trace!("Backend SSE: event={}, data={}", sse.event, sse.data);

        let item = match parse_stream_item(&sse.event, &sse.data) {
            Ok(item) => item,
            Err(error_msg) => {
                error!("{}", error_msg);
                let _ = tx_event.send(Err(NexusError::BackendError {
                    status,
                    message: error_msg,
                }));
                return;
            }
        };

        match item {
            StreamItem::Text(text) => {
                let _ = tx_event.send(Ok(BackendItem::TextChunk(text)));
            }
            StreamItem::Artifact(artifact) => held_artifacts.push(artifact),
            StreamItem::Session(session_id) => {
                let _ = tx_event.send(Ok(BackendItem::Session(session_id)));
            }
            StreamItem::Error(message) => {
                error!("Backend reported a stream error: {}", message);
                let _ = tx_event.send(Err(NexusError::BackendError { status, message }));
                return;
            }
            StreamItem::End => {
                flush_artifacts(&tx_event, &mut held_artifacts);
                return;
            }
            StreamItem::Skip => {}
        }
    }
}

fn flush_artifacts(
    tx_event: &mpsc::UnboundedSender<NexusResult<BackendItem>>,
    held_artifacts: &mut Vec<Value>,
) {
    for artifact in held_artifacts.drain(..) {
        let _ = tx_event.send(Ok(BackendItem::Artifact(artifact)));
    }
}

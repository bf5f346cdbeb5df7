//! Request normalizer
//!
//! OpenBB Workspace sends a few shapes that do not match its own query schema:
//! `extra_state: null`, command results wrapped in an extra `items` layer, data
//! blocks without `extra_citations`, and (older clients) a bare widget list.
//! These are repaired on the raw JSON before typed validation. Every rule is
//! idempotent.

use crate::util::errors::{NexusError, NexusResult};
use crate::util::types::QueryRequest;
use log::{debug, error};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Repairs known structural defects. Input that is not an object is returned as is.
pub fn normalize(mut data: Value) -> Value {
    let Some(root) = data.as_object_mut() else {
        return data;
    };

    if let Some(widgets) = root.get_mut("widgets") {
        if let Value::Array(list) = widgets {
            let mut wrapped = Map::new();
            wrapped.insert("primary".to_string(), Value::Array(std::mem::take(list)));
            *widgets = Value::Object(wrapped);
        }
    }

    if let Some(Value::Array(messages)) = root.get_mut("messages") {
        for message in messages.iter_mut() {
            normalize_message(message);
        }
    }

    data
}

fn normalize_message(message: &mut Value) {
    let Some(obj) = message.as_object_mut() else {
        return;
    };

    if obj.get("extra_state").map_or(true, Value::is_null) {
        obj.insert("extra_state".to_string(), Value::Object(Map::new()));
    }
    if obj.get("extra_citations").map_or(false, Value::is_null) {
        obj.insert("extra_citations".to_string(), Value::Array(Vec::new()));
    }

    if obj.get("role").and_then(Value::as_str) != Some("tool") {
        return;
    }

    for key in ["data", "content"] {
        if let Some(Value::Array(results)) = obj.get_mut(key) {
            for result in results.iter_mut() {
                normalize_tool_result(result);
            }
        }
    }
}

fn normalize_tool_result(result: &mut Value) {
    if let Some(unwrapped) = unwrap_command_result(result) {
        *result = unwrapped;
    }

    let Some(obj) = result.as_object_mut() else {
        return;
    };
    if obj.contains_key("items") && obj.get("extra_citations").map_or(true, Value::is_null) {
        obj.insert("extra_citations".to_string(), Value::Array(Vec::new()));
    }
}

/// `{"items": [{"status": ...}, ...]}` -> `{"status": ...}`
fn unwrap_command_result(result: &Value) -> Option<Value> {
    let obj = result.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    let first = obj.get("items")?.as_array()?.first()?;
    first
        .as_object()
        .filter(|inner| inner.contains_key("status"))
        .map(|_| first.clone())
}

/// Normalizes and validates an already-decoded body.
pub fn validate(data: Value) -> NexusResult<QueryRequest> {
    let normalized = normalize(data);
    let request: QueryRequest = serde_json::from_value(normalized).map_err(|e| {
        error!("Query request failed validation after repair: {}", e);
        NexusError::malformed(e.to_string())
    })?;

    if request.messages.is_empty() {
        return Err(NexusError::malformed(
            "messages: must contain at least one message",
        ));
    }

    let mut seen = HashSet::new();
    for widget in request
        .primary_widgets()
        .iter()
        .chain(request.secondary_widgets())
    {
        if !seen.insert(widget.uuid.as_str()) {
            return Err(NexusError::malformed(format!(
                "widgets: duplicate widget uuid '{}'",
                widget.uuid
            )));
        }
    }

    debug!(
        "Query request accepted: messages={}, primary_widgets={}",
        request.messages.len(),
        request.primary_widgets().len()
    );
    Ok(request)
}

/// Decodes, repairs and validates a raw request body.
pub fn parse_query_request(body: &[u8]) -> NexusResult<QueryRequest> {
    let data: Value = serde_json::from_slice(body)
        .map_err(|e| NexusError::malformed(format!("Invalid JSON in request body: {}", e)))?;
    validate(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::types::{MessageRole, ToolResultItem};
    use serde_json::json;

    fn openbb_phase2_body() -> Value {
        json!({
            "messages": [
                {"role": "human", "content": "What's the current price?", "extra_state": null},
                {
                    "role": "tool",
                    "function": "get_widget_data",
                    "input_arguments": {"data_sources": [{"widget_uuid": "abc", "input_args": {"symbol": "AAPL"}}]},
                    "data": [
                        {"items": [{"content": "{\"price\": 150.25}"}]},
                        {"items": [{"status": "success", "message": "ok"}]}
                    ],
                    "extra_state": null
                }
            ],
            "widgets": [
                {"uuid": "abc", "origin": "viaNexus Widgets", "widget_id": "stock_stats"}
            ]
        })
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = vec![
            openbb_phase2_body(),
            json!({"messages": [{"role": "human", "content": "hi"}], "widgets": []}),
            json!({"messages": [{"role": "tool", "content": [{"items": [{"status": "error"}]}]}]}),
            json!({"messages": [{
                "role": "tool",
                "data": [{"items": [{"status": "success", "items": [{"content": "x"}]}]}]
            }]}),
            json!({"messages": "not a list"}),
            json!([1, 2, 3]),
            json!(null),
        ];

        for input in inputs {
            let once = normalize(input);
            let twice = normalize(once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn null_extra_state_becomes_empty_object() {
        let normalized = normalize(openbb_phase2_body());
        for message in normalized["messages"].as_array().unwrap() {
            assert_eq!(message["extra_state"], json!({}));
        }
    }

    #[test]
    fn wrapped_command_result_is_unwrapped_one_level() {
        let normalized = normalize(openbb_phase2_body());
        let data = &normalized["messages"][1]["data"];

        assert_eq!(data[1], json!({"status": "success", "message": "ok"}));
        assert_eq!(data[0]["extra_citations"], json!([]));
        assert_eq!(data[0]["items"][0]["content"], "{\"price\": 150.25}");
    }

    #[test]
    fn unwrapped_result_with_items_gets_citations() {
        let normalized = normalize(json!({
            "messages": [{
                "role": "tool",
                "data": [{"items": [{"status": "success", "items": [{"content": "x"}]}]}]
            }]
        }));
        assert_eq!(
            normalized["messages"][0]["data"][0],
            json!({"status": "success", "items": [{"content": "x"}], "extra_citations": []})
        );
    }

    #[test]
    fn multi_key_containers_are_left_alone() {
        let normalized = normalize(json!({
            "messages": [{
                "role": "tool",
                "data": [{"items": [{"status": "success"}], "extra_citations": ["c"]}]
            }]
        }));
        assert_eq!(
            normalized["messages"][0]["data"][0],
            json!({"items": [{"status": "success"}], "extra_citations": ["c"]})
        );
    }

    #[test]
    fn bare_widget_list_becomes_primary() {
        let normalized = normalize(json!({"messages": [], "widgets": [{"uuid": "abc"}]}));
        assert_eq!(normalized["widgets"], json!({"primary": [{"uuid": "abc"}]}));
    }

    #[test]
    fn repaired_body_validates() {
        let request = validate(openbb_phase2_body()).unwrap();
        assert_eq!(request.messages[1].role, MessageRole::Tool);
        assert!(matches!(request.messages[1].data[0], ToolResultItem::Data(_)));
        assert!(matches!(
            request.messages[1].data[1],
            ToolResultItem::Command(_)
        ));
        assert_eq!(request.primary_widgets()[0].uuid, "abc");
    }

    #[test]
    fn unrepairable_shape_keeps_validation_detail() {
        let error = validate(json!({"messages": [{"role": "robot", "content": "hi"}]})).unwrap_err();
        match error {
            NexusError::MalformedRequest(detail) => assert!(detail.contains("robot"), "{}", detail),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn empty_history_and_duplicate_widgets_are_rejected() {
        assert!(matches!(
            validate(json!({"messages": []})),
            Err(NexusError::MalformedRequest(_))
        ));

        let duplicate = json!({
            "messages": [{"role": "human", "content": "hi"}],
            "widgets": {"primary": [
                {"uuid": "abc", "origin": "o", "widget_id": "w"},
                {"uuid": "abc", "origin": "o", "widget_id": "w2"}
            ]}
        });
        assert!(matches!(
            validate(duplicate),
            Err(NexusError::MalformedRequest(_))
        ));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let error = parse_query_request(b"{not json").unwrap_err();
        assert!(error.to_string().contains("Invalid JSON"));
    }
}

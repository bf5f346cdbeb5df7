//! HTTP handlers

use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use nexus_agent_core::{parse_query_request, NexusError, QueryRequest};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::{debug, info, warn};

const MISSING_TOKEN: &str =
    "Authentication token is required. Please configure a token when adding the agent.";

#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    pub token: Option<String>,
    pub session_id: Option<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn agents(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "vianexus-financial-agent": {
            "name": state.config.agent_name,
            "description": state.config.agent_description,
            "endpoints": { "query": "/query" },
            "features": {
                "streaming": true,
                "widget-dashboard-select": true,
                "widget-dashboard-search": true,
            },
        }
    }))
}

pub async fn widgets(State(state): State<AppState>) -> Json<Value> {
    Json(state.pipeline.context().catalog.to_document())
}

pub async fn apps(State(state): State<AppState>) -> Json<Value> {
    Json(state.apps.as_ref().clone())
}

/// Streams the copilot reply for one turn as `text/event-stream`.
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut request = match parse_query_request(&body) {
        Ok(request) => request,
        Err(error) => {
            let detail = match error {
                NexusError::MalformedRequest(detail) => detail,
                other => other.to_string(),
            };
            warn!("Rejecting query request: {}", detail);
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": detail })),
            )
                .into_response();
        }
    };

    let Some(token) = resolve_token(&params, &headers, &request) else {
        warn!("Rejecting query request: no token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": MISSING_TOKEN })),
        )
            .into_response();
    };
    if let Some(session_id) = params.session_id.filter(|id| !id.is_empty()) {
        request.session_id = Some(session_id);
    }

    info!(
        "Query received: messages={}, last_role={}, token=...{}",
        request.messages.len(),
        request.last_role().map(|role| role.as_str()).unwrap_or("-"),
        token_suffix(&token)
    );

    let run = state.pipeline.spawn(request, token, None);
    tokio::spawn(async move {
        match run.handle.await {
            Ok(report) => debug!(
                "Query finished: state={}, events={}, warnings={}, cancelled={}",
                report.final_state.as_str(),
                report.events_emitted,
                report.warnings.len(),
                report.cancelled
            ),
            Err(e) => warn!("Query task aborted: {}", e),
        }
    });

    let events = run.events.map(|frame| {
        Ok::<_, Infallible>(Event::default().event(frame.event).data(frame.data))
    });
    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Query parameter, then the `token` / `x-token` headers, then the body.
fn resolve_token(params: &QueryParams, headers: &HeaderMap, request: &QueryRequest) -> Option<String> {
    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    params
        .token
        .clone()
        .or_else(|| from_header("token"))
        .or_else(|| from_header("x-token"))
        .or_else(|| request.token.clone())
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn token_suffix(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    chars[chars.len().saturating_sub(4)..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_agent_core::Message;

    #[test]
    fn token_precedence_is_query_then_headers_then_body() {
        let mut request = QueryRequest::new(vec![Message::human("hi")]);
        request.token = Some("body".to_string());
        let mut headers = HeaderMap::new();
        headers.insert("x-token", "header".parse().unwrap());

        let params = QueryParams {
            token: Some("query".to_string()),
            session_id: None,
        };
        assert_eq!(resolve_token(&params, &headers, &request).as_deref(), Some("query"));
        assert_eq!(
            resolve_token(&QueryParams::default(), &headers, &request).as_deref(),
            Some("header")
        );
        assert_eq!(
            resolve_token(&QueryParams::default(), &HeaderMap::new(), &request).as_deref(),
            Some("body")
        );

        request.token = Some("  ".to_string());
        assert_eq!(
            resolve_token(&QueryParams::default(), &HeaderMap::new(), &request),
            None
        );
    }

    #[test]
    fn token_suffix_keeps_last_four_chars() {
        assert_eq!(token_suffix("abcdefgh"), "efgh");
        assert_eq!(token_suffix("ab"), "ab");
    }
}

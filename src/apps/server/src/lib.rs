//! nexus-agent server
//!
//! OpenBB Workspace copilot endpoint (`POST /query`, SSE) plus the discovery
//! documents the workspace reads when the agent is added.

pub mod logging;
pub mod routes;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use nexus_agent_core::service::catalog;
use nexus_agent_core::{
    AdapterContext, BackendClient, NexusConfig, QueryPipeline, SessionStore,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<NexusConfig>,
    pub pipeline: QueryPipeline,
    /// `apps.json` document served verbatim
    pub apps: Arc<Value>,
}

impl AppState {
    pub fn from_config(config: NexusConfig) -> Result<Self> {
        let catalog = catalog::load_optional(config.widgets_path.as_deref())
            .context("Failed to load widgets document")?;
        let apps = load_apps(config.apps_path.as_deref())?;
        let backend = BackendClient::from_config(&config)?;

        let ctx = AdapterContext::from_config(&config, catalog);
        let pipeline = QueryPipeline::new(
            Arc::new(ctx),
            Arc::new(backend),
            Arc::new(SessionStore::new()),
        );

        Ok(Self {
            config: Arc::new(config),
            pipeline,
            apps: Arc::new(apps),
        })
    }
}

fn load_apps(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Array(Vec::new()));
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read apps file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid apps file {}", path.display()))
}

/// Development mode mirrors any origin; otherwise only the configured ones.
fn cors_layer(config: &NexusConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);
    if config.is_development() {
        return base.allow_origin(AllowOrigin::mirror_request());
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    base.allow_origin(origins)
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/health", get(routes::health))
        .route("/agents.json", get(routes::agents))
        .route("/widgets.json", get(routes::widgets))
        .route("/apps.json", get(routes::apps))
        .route("/query", post(routes::query))
        .layer(cors)
        .with_state(state)
}

pub async fn run(config: NexusConfig) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::from_config(config)?;
    info!(
        "Widget catalog: {} widgets; backend: {}",
        state.pipeline.context().catalog.len(),
        state.config.financial_agent_url
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("nexus-agent listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("nexus-agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

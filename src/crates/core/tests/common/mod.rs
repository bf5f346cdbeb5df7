#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use nexus_agent_core::infrastructure::backend::{BackendClient, BackendClientConfig};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// One `POST /chat` as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub query: HashMap<String, String>,
    pub body: Value,
}

#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl Recorder {
    pub async fn record(&self, query: HashMap<String, String>, body: Value) {
        self.calls.lock().await.push(RecordedCall { query, body });
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }
}

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn client(base_url: &str, request_timeout: Duration) -> BackendClient {
    BackendClient::new(BackendClientConfig {
        base_url: base_url.to_string(),
        request_timeout,
        idle_timeout: Duration::from_secs(5),
        chunk_size: 100,
    })
    .expect("client should build")
}

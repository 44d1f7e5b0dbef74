#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use toolset::{InvokeConfig, MCPError, SessionClient};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Echoes the request it received back as JSON.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Response {
    if uri.path() == "/plain" {
        return (StatusCode::OK, "pong").into_response();
    }
    let status = if uri.path().starts_with("/missing") {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    let payload = json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "requestId": header("x-request-id"),
        "apiKey": header("x-api-key"),
        "body": serde_json::from_str::<Value>(&body).ok(),
    });
    (status, Json(payload)).into_response()
}

/// Start an echo server on an ephemeral port and return its base URL.
pub async fn spawn_echo_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind echo server");
    let addr = listener.local_addr().expect("echo server addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, Router::new().fallback(echo)).await;
    });
    format!("http://{addr}")
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub name: String,
    pub args: Map<String, Value>,
    pub config: InvokeConfig,
}

/// Session client that records calls instead of talking to a server.
#[derive(Clone, Default)]
pub struct MockSession {
    pub tools: Vec<Value>,
    pub calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockSession {
    pub fn with_tools(tools: Vec<Value>) -> Self {
        Self {
            tools,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionClient for MockSession {
    async fn list_tools(&self, _config: &InvokeConfig) -> Result<Vec<Value>, MCPError> {
        Ok(self.tools.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
        config: &InvokeConfig,
    ) -> Result<Value, MCPError> {
        self.calls.lock().unwrap().push(RecordedCall {
            name: name.to_string(),
            args,
            config: config.clone(),
        });
        if name == "fail" {
            return Err(MCPError::Mcp("session dropped".to_string()));
        }
        Ok(json!({
            "content": [{"type": "text", "text": format!("called {name}")}],
            "isError": false
        }))
    }
}

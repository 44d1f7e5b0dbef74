//! Session-protocol (MCP) tools: descriptor normalization and call plumbing.

use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParam, Tool};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{ClientHandler, ServiceExt};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::http::build_http_client_with_headers;
use crate::options::InvokeConfig;
use crate::resolve::resolve_refs;
use crate::schema::Schema;
use crate::tools::{ToolDescriptor, ToolError};

#[derive(Debug, Error)]
pub enum MCPError {
    #[error("MCP error: {0}")]
    Mcp(String),
    #[error("Failed to connect to MCP server at {url}: {message}")]
    Connect { url: String, message: String },
    #[error("Invalid MCP tool descriptor: {0}")]
    InvalidTool(String),
}

/// Convert a raw session tool descriptor into a [`ToolDescriptor`].
///
/// The input schema is read from `inputSchema` or `input_schema`, first
/// present wins; without one the parameters default to an empty object schema.
pub fn normalize_session_tool(raw: &Value) -> Result<ToolDescriptor, MCPError> {
    let object = match raw {
        Value::Null => {
            return Err(MCPError::InvalidTool("tool descriptor is null".into()));
        }
        Value::Object(object) => object,
        other => {
            return Err(MCPError::InvalidTool(format!(
                "tool descriptor must be an object, got {}",
                json_kind(other)
            )));
        }
    };

    let name = match object.get("name") {
        None | Some(Value::Null) => {
            return Err(MCPError::InvalidTool("tool descriptor is missing `name`".into()));
        }
        Some(Value::String(name)) if name.is_empty() => {
            return Err(MCPError::InvalidTool("tool descriptor has an empty `name`".into()));
        }
        Some(Value::String(name)) => name.clone(),
        Some(other) => {
            return Err(MCPError::InvalidTool(format!(
                "tool `name` must be a string, got {}",
                json_kind(other)
            )));
        }
    };

    let description = object
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);

    let parameters = ["inputSchema", "input_schema"]
        .iter()
        .find_map(|key| object.get(*key).filter(|schema| !schema.is_null()))
        .map(|schema| Schema::from_value(&resolve_refs(schema)))
        .unwrap_or_else(Schema::empty_object);

    Ok(ToolDescriptor::new(name, description, parameters))
}

/// Normalize a tool as listed by an `rmcp` client.
pub fn normalize_mcp_tool(tool: &Tool) -> Result<ToolDescriptor, MCPError> {
    let raw = serde_json::to_value(tool).map_err(|e| MCPError::InvalidTool(e.to_string()))?;
    normalize_session_tool(&raw)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A connected (or connectable) MCP session able to list and call tools.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// List raw tool descriptors.
    async fn list_tools(&self, config: &InvokeConfig) -> Result<Vec<Value>, MCPError>;

    /// Call one tool, returning the raw call result document.
    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
        config: &InvokeConfig,
    ) -> Result<Value, MCPError>;
}

#[async_trait]
impl<S: ClientHandler + Send + Sync> SessionClient for RunningService<RoleClient, S> {
    async fn list_tools(&self, _config: &InvokeConfig) -> Result<Vec<Value>, MCPError> {
        let result = self
            .deref()
            .list_tools(None)
            .await
            .map_err(|e| MCPError::Mcp(e.to_string()))?;
        result
            .tools
            .iter()
            .map(|tool| serde_json::to_value(tool).map_err(|e| MCPError::Mcp(e.to_string())))
            .collect()
    }

    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
        _config: &InvokeConfig,
    ) -> Result<Value, MCPError> {
        let params = CallToolRequestParam {
            name: name.to_string().into(),
            arguments: Some(args),
        };

        let result = self
            .deref()
            .call_tool(params)
            .await
            .map_err(|e| MCPError::Mcp(e.to_string()))?;

        serde_json::to_value(result).map_err(|e| MCPError::Mcp(e.to_string()))
    }
}

/// Streamable-HTTP MCP client that opens one session per operation.
///
/// Each call connects, performs the request, and closes the session; no
/// connection outlives the operation.
#[derive(Debug, Clone)]
pub struct McpSessionClient {
    url: String,
}

impl McpSessionClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self, config: &InvokeConfig) -> Result<RunningService<RoleClient, ()>, MCPError> {
        let http_client = build_http_client_with_headers(config).map_err(|e| MCPError::Connect {
            url: self.url.clone(),
            message: e.to_string(),
        })?;
        let transport = StreamableHttpClientTransport::with_client(
            http_client,
            StreamableHttpClientTransportConfig::with_uri(self.url.clone()),
        );
        debug!("Opening MCP session to {}", self.url);
        ().serve(transport).await.map_err(|e| MCPError::Connect {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }

    async fn close(&self, session: RunningService<RoleClient, ()>) {
        match session.cancel().await {
            Ok(reason) => debug!("Closed MCP session to {}: {:?}", self.url, reason),
            Err(e) => warn!("Closing MCP session to {} failed: {}", self.url, e),
        }
    }
}

#[async_trait]
impl SessionClient for McpSessionClient {
    async fn list_tools(&self, config: &InvokeConfig) -> Result<Vec<Value>, MCPError> {
        let session = self.connect(config).await?;
        let result = SessionClient::list_tools(&session, config).await;
        self.close(session).await;
        result
    }

    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
        config: &InvokeConfig,
    ) -> Result<Value, MCPError> {
        let session = self.connect(config).await?;
        let result = SessionClient::call_tool(&session, name, args, config).await;
        self.close(session).await;
        result
    }
}

/// Forwards tool calls to a [`SessionClient`].
#[derive(Clone)]
pub struct SessionInvoker {
    client: Arc<dyn SessionClient>,
    config: InvokeConfig,
}

impl SessionInvoker {
    pub fn new(client: Arc<dyn SessionClient>, config: InvokeConfig) -> Self {
        Self { client, config }
    }

    pub async fn invoke(
        &self,
        name: &str,
        args: Map<String, Value>,
        overrides: Option<&InvokeConfig>,
    ) -> Result<Value, ToolError> {
        let config = self.config.merge(overrides);
        debug!("Calling MCP tool {}", name);
        Ok(self.client.call_tool(name, args, &config).await?)
    }
}

impl std::fmt::Debug for SessionInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInvoker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

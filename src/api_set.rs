//! Unified dispatcher over OpenAPI- and MCP-backed tools.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use itertools::Itertools;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::invoker::{HttpInvoker, InvocationResult};
use crate::mcp::{normalize_session_tool, SessionClient, SessionInvoker};
use crate::native::to_native;
use crate::openapi::OpenApiCatalog;
use crate::options::InvokeConfig;
use crate::tools::{Tool, ToolDescriptor, ToolError, ToolService};

/// The single backend an [`ApiSet`] delegates to.
#[derive(Debug, Clone)]
pub enum Backend {
    Http(HttpInvoker),
    Session(SessionInvoker),
}

impl Backend {
    async fn invoke(
        &self,
        name: &str,
        args: Map<String, Value>,
        config: &InvokeConfig,
    ) -> Result<ToolResult, ToolError> {
        match self {
            Backend::Http(invoker) => invoker
                .invoke(name, &args, Some(config))
                .await
                .map(ToolResult::Http),
            Backend::Session(invoker) => invoker
                .invoke(name, args, Some(config))
                .await
                .map(ToolResult::Session),
        }
    }
}

/// What a backend returned for one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolResult {
    Http(InvocationResult),
    /// Raw session-protocol call result.
    Session(Value),
}

impl ToolResult {
    pub fn as_http(&self) -> Option<&InvocationResult> {
        match self {
            ToolResult::Http(result) => Some(result),
            ToolResult::Session(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ToolResult::Http(result) => serde_json::to_value(result).unwrap_or(Value::Null),
            ToolResult::Session(value) => value.clone(),
        }
    }
}

/// A catalog of tools bound to one backend, invoked by name.
///
/// The catalog is read-only after construction, so concurrent `invoke`
/// calls on a shared `ApiSet` are independent.
#[derive(Debug, Clone)]
pub struct ApiSet {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
    aliases: HashMap<String, String>,
    backend: Backend,
    config: InvokeConfig,
}

impl ApiSet {
    /// Create an API set. Tools are deduplicated by name, first occurrence kept.
    pub fn new(tools: Vec<ToolDescriptor>, backend: Backend, config: InvokeConfig) -> Self {
        let tools: Vec<ToolDescriptor> = tools
            .into_iter()
            .unique_by(|tool| tool.name.clone())
            .collect();
        let index = tools
            .iter()
            .enumerate()
            .map(|(position, tool)| (tool.name.clone(), position))
            .collect();
        Self {
            tools,
            index,
            aliases: HashMap::new(),
            backend,
            config,
        }
    }

    /// Wrap an OpenAPI catalog with an HTTP backend.
    pub fn from_openapi(catalog: OpenApiCatalog, config: InvokeConfig) -> Self {
        let tools = catalog.descriptors();
        info!("Loaded {} OpenAPI tools", tools.len());
        Self::new(
            tools,
            Backend::Http(HttpInvoker::new(catalog, InvokeConfig::default())),
            config,
        )
    }

    /// Normalize raw session tools and wrap them with a session backend.
    ///
    /// `tools` may be a single descriptor or an array of them. A descriptor
    /// that fails normalization is logged and skipped.
    pub fn from_session_tools(
        tools: &Value,
        client: Arc<dyn SessionClient>,
        config: InvokeConfig,
    ) -> Self {
        let raw: Vec<&Value> = match tools {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };

        let descriptors: Vec<ToolDescriptor> = raw
            .into_iter()
            .filter_map(|tool| match normalize_session_tool(tool) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    warn!("Skipping MCP tool: {}", e);
                    None
                }
            })
            .collect();
        info!("Loaded {} MCP tools", descriptors.len());

        Self::new(
            descriptors,
            Backend::Session(SessionInvoker::new(client, InvokeConfig::default())),
            config,
        )
    }

    /// Register `alias` (e.g. a tool id) as another name for `canonical`.
    pub fn with_alias(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), canonical.into());
        self
    }

    /// Map an alias to its canonical tool name; other names pass through.
    pub fn resolve_canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn get_tool(&self, name: &str) -> Option<&ToolDescriptor> {
        let name = self.resolve_canonical_name(name);
        self.index.get(name).map(|&position| &self.tools[position])
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Present the catalog as MCP tools.
    pub fn to_mcp_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(ToolDescriptor::to_mcp_tool).collect()
    }

    /// Invoke `name` with `args`.
    ///
    /// Unknown names fail before any argument conversion or network work.
    /// `args` is reduced to plain JSON first and must come out as an object
    /// (or null, treated as no arguments). `config` overrides this set's
    /// base configuration field by field.
    pub async fn invoke<A: Serialize + ?Sized>(
        &self,
        name: &str,
        args: &A,
        config: Option<&InvokeConfig>,
    ) -> Result<ToolResult, ToolError> {
        let name = self.resolve_canonical_name(name);
        if !self.index.contains_key(name) {
            return Err(ToolError::NotFound(name.to_string()));
        }

        let args = match to_native(args) {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ToolError::InvalidArguments {
                    tool: name.to_string(),
                    message: format!("expected an object, got {other}"),
                });
            }
        };

        let config = self.config.merge(config);
        debug!("Invoking tool {}", name);
        self.backend.invoke(name, args, &config).await
    }

    /// Blocking variant of [`ApiSet::invoke`].
    ///
    /// Fails immediately with [`ToolError::BlockingInRuntime`] when called
    /// from inside a tokio runtime; otherwise drives the call on a private
    /// current-thread runtime.
    pub fn invoke_blocking<A: Serialize + ?Sized>(
        &self,
        name: &str,
        args: &A,
        config: Option<&InvokeConfig>,
    ) -> Result<ToolResult, ToolError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ToolError::BlockingInRuntime);
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.invoke(name, args, config))
    }
}

#[async_trait]
impl ToolService for ApiSet {
    async fn list_tools(&self) -> Result<Vec<Tool>, ToolError> {
        Ok(self.to_mcp_tools())
    }

    async fn call_tool(&self, name: String, args: Value) -> Result<Value, ToolError> {
        self.invoke(&name, &args, None).await.map(|r| r.to_value())
    }
}

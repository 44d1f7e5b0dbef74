//! Protocol-agnostic tool descriptors and the tool service seam.

use std::sync::Arc;

use async_trait::async_trait;
pub use rmcp::model::Tool;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::mcp::MCPError;
use crate::openapi::DocumentError;
use crate::schema::Schema;

/// Error type for tool catalog and invocation failures.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error(transparent)]
    Mcp(#[from] MCPError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Blocking invocation is not supported inside an async runtime; await `invoke` instead")]
    BlockingInRuntime,

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

/// A named, schema-described callable operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Argument shape, conventionally an object schema.
    pub parameters: Schema,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: Option<String>, parameters: Schema) -> Self {
        Self {
            name: name.into(),
            description,
            parameters,
        }
    }

    /// The argument schema as a plain JSON-Schema document.
    pub fn to_json_schema(&self) -> Value {
        self.parameters.to_json_schema()
    }

    /// Present this descriptor as an MCP tool.
    pub fn to_mcp_tool(&self) -> Tool {
        let schema = match self.to_json_schema() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut tool = Tool::new(self.name.clone(), String::new(), Arc::new(schema));
        tool.description = self.description.clone().map(Into::into);
        tool
    }

    /// Present this descriptor as an OpenAI-style function declaration.
    pub fn to_function_declaration(&self) -> Value {
        let mut function = Map::new();
        function.insert("name".into(), Value::String(self.name.clone()));
        if let Some(description) = &self.description {
            function.insert("description".into(), Value::String(description.clone()));
        }
        function.insert("parameters".into(), self.to_json_schema());
        json!({ "type": "function", "function": function })
    }
}

/// Trait for tool catalogs that can be listed and called by an agent loop.
#[async_trait]
pub trait ToolService: Send + Sync {
    /// List available tools.
    async fn list_tools(&self) -> Result<Vec<Tool>, ToolError>;

    /// Execute a tool.
    async fn call_tool(&self, name: String, args: Value) -> Result<Value, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            "getUser",
            Some("Fetch a user".into()),
            Schema::from_value(&json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"]
            })),
        )
    }

    #[test]
    fn test_mcp_tool_presentation() {
        let tool = descriptor().to_mcp_tool();
        assert_eq!(tool.name, "getUser");
        assert_eq!(tool.description.as_deref(), Some("Fetch a user"));
        assert_eq!(tool.input_schema.get("type"), Some(&json!("object")));
    }

    #[test]
    fn test_function_declaration() {
        let declaration = descriptor().to_function_declaration();
        assert_eq!(declaration["type"], json!("function"));
        assert_eq!(declaration["function"]["name"], json!("getUser"));
        assert_eq!(declaration["function"]["parameters"]["required"], json!(["id"]));
    }

    #[test]
    fn test_descriptor_serializes_schema_as_document() {
        let value = serde_json::to_value(descriptor()).unwrap();
        assert_eq!(value["parameters"]["properties"]["id"], json!({"type": "string"}));
    }
}

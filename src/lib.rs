//! # toolset - Unified tool invocation for agent runtimes
//!
//! Exposes externally callable "tools" behind one `invoke(name, args)` surface,
//! whether a tool is an HTTP endpoint described by an OpenAPI document or a
//! tool served over an MCP session.
//!
//! ## Architecture
//!
//! 1. **Schemas** (`schema`, `resolve`) model JSON-Schema shapes and inline
//!    local `$ref`s with cycle protection.
//! 2. **Catalogs** turn an OpenAPI document (`openapi`) or raw MCP tool
//!    descriptors (`mcp`) into [`ToolDescriptor`]s.
//! 3. **Invokers** execute calls: [`HttpInvoker`] builds and sends HTTP
//!    requests, [`SessionInvoker`] forwards to an MCP session.
//! 4. **[`ApiSet`]** binds a catalog to one invoker, converts arguments to
//!    plain JSON, merges configuration, and dispatches by name.
//!
//! ## Example
//! ```no_run
//! use serde_json::json;
//! use toolset::{ApiSet, InvokeConfig, OpenApiCatalog};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let document = json!({
//!         "servers": [{"url": "https://api.example.com"}],
//!         "paths": {"/users/{id}": {"get": {"operationId": "getUser"}}}
//!     });
//!     let catalog = OpenApiCatalog::from_document(&document, None);
//!     let api = ApiSet::from_openapi(catalog, InvokeConfig::new());
//!
//!     let result = api.invoke("getUser", &json!({"id": "42"}), None).await?;
//!     println!("{:?}", result);
//!     Ok(())
//! }
//! ```

pub mod api_set;
pub mod http;
pub mod invoker;
pub mod mcp;
pub mod native;
pub mod openapi;
pub mod options;
pub mod resolve;
pub mod schema;
pub mod tools;
pub mod toolset;

pub use api_set::{ApiSet, Backend, ToolResult};
pub use invoker::{HttpInvoker, InvocationResult};
pub use mcp::{normalize_session_tool, McpSessionClient, MCPError, SessionClient, SessionInvoker};
pub use native::to_native;
pub use openapi::{OpenApiCatalog, OpenApiSource};
pub use options::{AuthConfig, InvokeConfig};
pub use resolve::resolve_refs;
pub use schema::Schema;
pub use tools::{ToolDescriptor, ToolError, ToolService};
pub use toolset::{SessionProvider, StreamableHttpSessions, ToolSetSpec};

// Re-export rmcp for convenience
pub use rmcp;

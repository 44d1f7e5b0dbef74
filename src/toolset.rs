//! Building an [`ApiSet`] from a toolset resource record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::api_set::ApiSet;
use crate::mcp::{McpSessionClient, SessionClient};
use crate::openapi::{OpenApiCatalog, OpenApiSource};
use crate::options::{AuthConfig, InvokeConfig};
use crate::tools::ToolError;

/// How a toolset's tools are described and reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolSetSchema {
    #[serde(rename = "OpenAPI")]
    OpenApi {
        content: OpenApiSource,
        #[serde(default, rename = "baseUrl", skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    #[serde(rename = "MCP")]
    Mcp {
        url: String,
        /// Raw tool descriptors; fetched from the server when empty.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tools: Vec<Value>,
    },
}

/// A toolset resource record as handed over by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub schema: ToolSetSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub config: InvokeConfig,
}

/// Supplies session clients for MCP toolsets.
pub trait SessionProvider: Send + Sync {
    fn session(&self, url: &str) -> Arc<dyn SessionClient>;
}

/// Default provider: streamable-HTTP sessions opened per operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamableHttpSessions;

impl SessionProvider for StreamableHttpSessions {
    fn session(&self, url: &str) -> Arc<dyn SessionClient> {
        Arc::new(McpSessionClient::new(url))
    }
}

impl ToolSetSpec {
    /// The record's configuration with its auth folded in.
    pub fn effective_config(&self) -> InvokeConfig {
        match &self.auth {
            Some(auth) => auth.apply(self.config.clone()),
            None => self.config.clone(),
        }
    }

    /// Build the [`ApiSet`] matching this record's schema type.
    pub async fn into_api_set(self, sessions: &dyn SessionProvider) -> Result<ApiSet, ToolError> {
        let config = self.effective_config();
        let label = self.name.as_deref().unwrap_or("<unnamed>").to_string();

        match self.schema {
            ToolSetSchema::OpenApi { content, base_url } => {
                let catalog = OpenApiCatalog::from_source(&content, base_url.as_deref())?;
                info!("Toolset {}: OpenAPI catalog with {} tools", label, catalog.len());
                Ok(ApiSet::from_openapi(catalog, config))
            }
            ToolSetSchema::Mcp { url, tools } => {
                let client = sessions.session(&url);
                let tools = if tools.is_empty() {
                    debug!("Toolset {}: listing tools from {}", label, url);
                    client.list_tools(&config).await?
                } else {
                    tools
                };
                info!("Toolset {}: {} MCP tool descriptors", label, tools.len());
                Ok(ApiSet::from_session_tools(
                    &Value::Array(tools),
                    client,
                    config,
                ))
            }
        }
    }
}

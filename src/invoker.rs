//! Execution of OpenAPI-backed tool calls.
//!
//! Arguments are routed per key, in order: the literal `body` key becomes the
//! JSON body, keys matching a `{placeholder}` fill the path as one encoded
//! segment, header-shaped keys become headers, and everything else is sent as
//! a query parameter.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use tracing::{debug, warn};

use crate::http::{add_extra_headers, build_http_client, header_map, RequestBuilderExt, ResponseExt};
use crate::openapi::{Operation, OpenApiCatalog, ParameterLocation, BODY_KEY};
use crate::options::InvokeConfig;
use crate::tools::ToolError;

/// Uniform outcome of one HTTP tool call.
///
/// `status_code == 0` marks a transport-level failure described by `error`.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub status_code: u16,
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Value,
    pub error: Option<String>,
}

impl InvocationResult {
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            status_code: 0,
            headers: None,
            body: Value::Null,
            error: Some(message.into()),
        }
    }

    /// True for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// A fully routed request, before it touches the network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParts {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

/// Route `args` onto `operation`, layered over the defaults in `config`.
///
/// Header names compare case-insensitively, so an argument replaces a default
/// header of the same name. Fails only when a path value cannot form a
/// segment of its own.
pub fn route_arguments(
    operation: &Operation,
    args: &Map<String, Value>,
    config: &InvokeConfig,
) -> Result<RequestParts, String> {
    let mut path = operation.path.clone();
    let mut headers = header_map(&config.headers);
    let mut query = config.query.clone();
    let mut body = None;

    for (key, value) in args {
        if value.is_null() {
            continue;
        }
        if key == BODY_KEY {
            body = Some(value.clone());
            continue;
        }

        let placeholder = format!("{{{key}}}");
        if operation.path.contains(&placeholder) {
            path = path.replace(&placeholder, &path_segment(key, &coerce(value))?);
            continue;
        }

        let declared = operation.parameter(key).map(|p| p.location);
        let header_shaped = value.is_string() && key.to_ascii_lowercase().starts_with("x-");
        if declared == Some(ParameterLocation::Header)
            || (header_shaped && declared != Some(ParameterLocation::Query))
        {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(&coerce(value)),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Skipping invalid header argument {}", key),
            }
            continue;
        }

        query.insert(key.clone(), value.clone());
    }

    if !operation.method.carries_body() && body.is_some() {
        debug!(
            "Dropping body for {} {}",
            operation.method.key().to_uppercase(),
            operation.path
        );
        body = None;
    }

    Ok(RequestParts {
        path,
        query: expand_query(&query),
        headers,
        body,
    })
}

fn path_segment(key: &str, value: &str) -> Result<String, String> {
    if matches!(value, "" | "." | "..") {
        return Err(format!("path parameter {key} cannot be {value:?}"));
    }
    Ok(urlencoding::encode(value).into_owned())
}

fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn expand_query(query: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in query {
        match value {
            Value::Null => {}
            Value::Array(items) => pairs.extend(
                items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(|item| (key.clone(), coerce(item))),
            ),
            other => pairs.push((key.clone(), coerce(other))),
        }
    }
    pairs
}

fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Executes cataloged OpenAPI operations over HTTP.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    catalog: OpenApiCatalog,
    config: InvokeConfig,
}

impl HttpInvoker {
    /// Create an invoker; `config` holds default headers, query, and transport settings.
    pub fn new(catalog: OpenApiCatalog, config: InvokeConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &OpenApiCatalog {
        &self.catalog
    }

    /// Call `name` with `args`.
    ///
    /// Only an unknown tool name is an `Err`; network failures and arguments
    /// that cannot be placed come back as an [`InvocationResult`] with status 0.
    pub async fn invoke(
        &self,
        name: &str,
        args: &Map<String, Value>,
        overrides: Option<&InvokeConfig>,
    ) -> Result<InvocationResult, ToolError> {
        let tool = self
            .catalog
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let config = self.config.merge(overrides);
        match route_arguments(&tool.operation, args, &config) {
            Ok(parts) => Ok(self.execute(&tool.operation, parts, &config).await),
            Err(message) => {
                warn!("Not dispatching {}: {}", name, message);
                Ok(InvocationResult::transport_failure(message))
            }
        }
    }

    async fn execute(
        &self,
        operation: &Operation,
        parts: RequestParts,
        config: &InvokeConfig,
    ) -> InvocationResult {
        let http_client = match build_http_client(config) {
            Ok(client) => client,
            Err(e) => return InvocationResult::transport_failure(e.to_string()),
        };

        let url = join_url(self.catalog.base_url(), &parts.path);
        debug!("{} {}", operation.method.key().to_uppercase(), url);

        let mut request = http_client
            .request(operation.method.as_reqwest(), &url)
            .query(&parts.query);
        request = add_extra_headers(request, &parts.headers);
        if let Some(body) = &parts.body {
            request = request.json_logged(body);
        }

        match request.send().await {
            Ok(response) => response.normalized().await,
            Err(e) => {
                warn!("Request to {} failed: {}", url, e);
                InvocationResult::transport_failure(e.to_string())
            }
        }
    }
}

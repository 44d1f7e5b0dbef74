//! HTTP client utilities shared by the OpenAPI invoker and MCP sessions.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use crate::invoker::InvocationResult;
use crate::options::InvokeConfig;

/// Build a configured HTTP client from invocation options.
pub fn build_http_client(config: &InvokeConfig) -> Result<Client, reqwest::Error> {
    client_builder(config).build()
}

/// Build a client that sends the config's headers on every request.
pub fn build_http_client_with_headers(config: &InvokeConfig) -> Result<Client, reqwest::Error> {
    client_builder(config)
        .default_headers(header_map(&config.headers))
        .build()
}

fn client_builder(config: &InvokeConfig) -> reqwest::ClientBuilder {
    let mut builder = Client::builder();
    if let Some(t) = config.timeout {
        builder = builder.timeout(t);
    }
    if let Some(proxy_url) = &config.proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(p) => builder = builder.proxy(p),
            Err(e) => warn!("Ignoring invalid proxy {}: {}", proxy_url, e),
        }
    }
    builder
}

/// Convert string headers into a `HeaderMap`, skipping invalid entries.
pub(crate) fn header_map(headers: &HashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!("Skipping invalid header {}", key),
        }
    }
    map
}

/// Add extra headers to a request, replacing any with the same name.
pub fn add_extra_headers(request: RequestBuilder, headers: &HeaderMap) -> RequestBuilder {
    request.headers(headers.clone())
}

/// Extension trait for RequestBuilder that logs request body.
pub trait RequestBuilderExt {
    /// Set JSON request body and log it. Returns the RequestBuilder for chaining.
    fn json_logged<T: serde::Serialize + ?Sized>(self, json: &T) -> Self;
}

impl RequestBuilderExt for RequestBuilder {
    fn json_logged<T: serde::Serialize + ?Sized>(self, json: &T) -> Self {
        if let Ok(req_body) = serde_json::to_string_pretty(json) {
            debug!("API request body ({} bytes):\n{}", req_body.len(), req_body);
        }

        self.json(json)
    }
}

/// Extension trait for Response that normalizes it into an [`InvocationResult`].
#[async_trait::async_trait]
pub trait ResponseExt {
    /// Capture status, headers, and body. Consumes the response.
    ///
    /// The body is decoded as JSON when possible, else kept as text. A failure
    /// while reading the body is reported as a transport failure.
    async fn normalized(self) -> InvocationResult;
}

#[async_trait::async_trait]
impl ResponseExt for reqwest::Response {
    async fn normalized(self) -> InvocationResult {
        let status_code = self.status().as_u16();
        let headers: HashMap<String, String> = self
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let bytes = match self.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read response body: {}", e);
                return InvocationResult::transport_failure(e.to_string());
            }
        };

        let body = match serde_json::from_slice::<Value>(&bytes) {
            Ok(json) => json,
            Err(_) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        };
        debug!("API response {} ({} bytes)", status_code, bytes.len());

        InvocationResult {
            status_code,
            headers: Some(headers),
            body,
            error: None,
        }
    }
}

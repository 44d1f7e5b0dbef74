//! Invocation configuration and auth defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::{serde_as, DurationMilliSeconds};
use std::collections::HashMap;
use std::time::Duration;

/// Per-toolset and per-call invocation settings.
///
/// Defaults are combined with a per-call override through [`InvokeConfig::merge`].
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeConfig {
    /// Request timeout. If None, the transport default is used.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "timeoutMs", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// HTTP proxy URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Headers sent with every request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Query parameters sent with every request. Nulls are dropped on the wire.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub query: Map<String, Value>,
}

impl InvokeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set the proxy.
    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy = Some(proxy_url.into());
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a default query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Overlay `overrides` on top of `self`.
    ///
    /// Scalars set in the override replace the base; header and query maps
    /// are merged key by key with the override winning. Header names match
    /// case-insensitively.
    pub fn merge(&self, overrides: Option<&InvokeConfig>) -> InvokeConfig {
        let mut merged = self.clone();
        let Some(overrides) = overrides else {
            return merged;
        };

        if overrides.timeout.is_some() {
            merged.timeout = overrides.timeout;
        }
        if overrides.proxy.is_some() {
            merged.proxy = overrides.proxy.clone();
        }
        for (key, value) in &overrides.headers {
            merged.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(key));
            merged.headers.insert(key.clone(), value.clone());
        }
        for (key, value) in &overrides.query {
            merged.query.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// Where an API key is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
}

/// Auth declared on a toolset, folded into the default [`InvokeConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuthConfig {
    #[serde(rename = "APIKey", alias = "ApiKey")]
    ApiKey {
        key: String,
        value: String,
        #[serde(default)]
        location: ApiKeyLocation,
    },
    Bearer { token: String },
}

impl AuthConfig {
    /// Add this auth's header or query entry to `config`.
    pub fn apply(&self, config: InvokeConfig) -> InvokeConfig {
        match self {
            AuthConfig::ApiKey {
                key,
                value,
                location: ApiKeyLocation::Header,
            } => config.with_header(key.clone(), value.clone()),
            AuthConfig::ApiKey {
                key,
                value,
                location: ApiKeyLocation::Query,
            } => config.with_query(key.clone(), value.clone()),
            AuthConfig::Bearer { token } => {
                config.with_header("Authorization", format!("Bearer {token}"))
            }
        }
    }
}

//! Tool catalog extraction from OpenAPI documents.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::resolve::resolve_refs;
use crate::schema::{ObjectSchema, Schema};
use crate::tools::ToolDescriptor;

/// Argument key that carries the JSON request body.
pub const BODY_KEY: &str = "body";

/// Errors raised while reading an OpenAPI document from text.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("OpenAPI document is neither JSON nor YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("OpenAPI document root must be a mapping")]
    NotAMapping,
}

/// An OpenAPI document as text (JSON or YAML) or already parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenApiSource {
    Text(String),
    Document(Value),
}

impl OpenApiSource {
    pub fn to_document(&self) -> Result<Value, DocumentError> {
        match self {
            OpenApiSource::Text(text) => parse_document(text),
            OpenApiSource::Document(Value::Object(map)) => Ok(Value::Object(map.clone())),
            OpenApiSource::Document(_) => Err(DocumentError::NotAMapping),
        }
    }
}

/// Parse OpenAPI text, trying JSON first and then YAML.
pub fn parse_document(text: &str) -> Result<Value, DocumentError> {
    let document = match serde_json::from_str::<Value>(text) {
        Ok(document) => document,
        Err(_) => serde_yaml::from_str::<Value>(text)?,
    };
    if document.is_object() {
        Ok(document)
    } else {
        Err(DocumentError::NotAMapping)
    }
}

/// Standard HTTP verbs an OpenAPI path item may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Head,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
    ];

    /// The lowercase key used in a path item.
    pub fn key(self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
        }
    }

    /// Whether requests with this method carry a JSON body.
    pub fn carries_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }
}

/// Declared location of an operation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterLocation {
    Path,
    #[default]
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("path") => ParameterLocation::Path,
            Some("header") => ParameterLocation::Header,
            Some("cookie") => ParameterLocation::Cookie,
            _ => ParameterLocation::Query,
        }
    }
}

/// A parameter declaration kept for call-time routing.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
}

/// HTTP metadata needed to execute a cataloged tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub method: HttpMethod,
    /// Path template, possibly containing `{param}` placeholders.
    pub path: String,
    pub parameters: Vec<ParameterSpec>,
    /// Whether a JSON request body was declared.
    pub has_body: bool,
}

impl Operation {
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// A catalog entry: the public descriptor plus its operation metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenApiTool {
    pub descriptor: ToolDescriptor,
    pub operation: Operation,
}

/// Tools extracted from one OpenAPI document, keyed by `operationId`.
#[derive(Debug, Clone, Default)]
pub struct OpenApiCatalog {
    base_url: String,
    tools: Vec<OpenApiTool>,
    index: HashMap<String, usize>,
}

impl OpenApiCatalog {
    /// Parse, resolve, and catalog a document from any source.
    pub fn from_source(source: &OpenApiSource, base_url: Option<&str>) -> Result<Self, DocumentError> {
        let document = source.to_document()?;
        Ok(Self::from_document(&document, base_url))
    }

    /// Resolve `$ref`s in `document`, then catalog it.
    pub fn from_document(document: &Value, base_url: Option<&str>) -> Self {
        Self::build(&resolve_refs(document), base_url)
    }

    /// Catalog an already-resolved document.
    ///
    /// `base_url` wins over the document's first `servers[].url`.
    pub fn build(resolved: &Value, base_url: Option<&str>) -> Self {
        let base_url = base_url
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .or_else(|| {
                resolved
                    .pointer("/servers/0/url")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_default();

        let mut catalog = Self {
            base_url,
            ..Self::default()
        };

        let Some(paths) = resolved.get("paths").and_then(Value::as_object) else {
            debug!("OpenAPI document has no paths");
            return catalog;
        };

        for (path, item) in paths {
            let Some(item) = item.as_object() else {
                continue;
            };
            let shared = item
                .get("parameters")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for method in HttpMethod::ALL {
                let Some(operation) = item.get(method.key()).and_then(Value::as_object) else {
                    continue;
                };
                match build_tool(method, path, shared, operation) {
                    Some(tool) => catalog.insert(tool),
                    None => warn!(
                        "Skipping {} {}: operation has no operationId",
                        method.key().to_uppercase(),
                        path
                    ),
                }
            }
        }

        debug!("Cataloged {} OpenAPI tools", catalog.tools.len());
        catalog
    }

    /// Later entries with the same name replace earlier ones in place.
    fn insert(&mut self, tool: OpenApiTool) {
        match self.index.get(&tool.descriptor.name) {
            Some(&position) => self.tools[position] = tool,
            None => {
                self.index
                    .insert(tool.descriptor.name.clone(), self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn get(&self, name: &str) -> Option<&OpenApiTool> {
        self.index.get(name).map(|&position| &self.tools[position])
    }

    pub fn tools(&self) -> impl Iterator<Item = &OpenApiTool> {
        self.tools.iter()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn build_tool(
    method: HttpMethod,
    path: &str,
    shared: &[Value],
    operation: &Map<String, Value>,
) -> Option<OpenApiTool> {
    let name = operation.get("operationId").and_then(Value::as_str)?;

    let description = ["summary", "description"]
        .iter()
        .find_map(|key| operation.get(*key).and_then(Value::as_str))
        .map(str::to_string);

    let own = operation
        .get("parameters")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut object = ObjectSchema::default();
    let mut parameters: Vec<ParameterSpec> = Vec::new();

    for declaration in shared.iter().chain(own) {
        let Some((spec, schema)) = parse_parameter(declaration) else {
            continue;
        };
        // operation-level declarations override path-level ones with the same (name, in)
        let inherited = parameters.len();
        parameters.retain(|p| !(p.name == spec.name && p.location == spec.location));
        if parameters.len() != inherited {
            object.required.retain(|name| *name != spec.name);
        }
        object.set_property(spec.name.clone(), schema);
        if spec.required {
            object.require(spec.name.clone());
        }
        parameters.push(spec);
    }

    let mut has_body = false;
    if let Some(body) = operation.get("requestBody").and_then(Value::as_object) {
        if let Some(schema) = json_body_schema(body) {
            has_body = true;
            object.set_property(BODY_KEY, Schema::from_value(schema));
            if body.get("required").and_then(Value::as_bool) == Some(true) {
                object.require(BODY_KEY);
            }
        }
    }

    Some(OpenApiTool {
        descriptor: ToolDescriptor::new(name, description, Schema::object(object)),
        operation: Operation {
            method,
            path: path.to_string(),
            parameters,
            has_body,
        },
    })
}

fn parse_parameter(declaration: &Value) -> Option<(ParameterSpec, Schema)> {
    let declaration = declaration.as_object()?;
    let Some(name) = declaration.get("name").and_then(Value::as_str) else {
        debug!("Skipping parameter without a name");
        return None;
    };

    let mut schema = declaration
        .get("schema")
        .map(Schema::from_value)
        .unwrap_or_else(Schema::string);
    if let Some(description) = declaration.get("description").and_then(Value::as_str) {
        schema.description = Some(description.to_string());
    }

    let spec = ParameterSpec {
        name: name.to_string(),
        location: ParameterLocation::parse(declaration.get("in").and_then(Value::as_str)),
        required: declaration.get("required").and_then(Value::as_bool) == Some(true),
    };
    Some((spec, schema))
}

fn json_body_schema(body: &Map<String, Value>) -> Option<&Value> {
    let content = body.get("content")?.as_object()?;
    let entry = content.get("application/json").or_else(|| {
        content
            .iter()
            .find(|(media, _)| media.starts_with("application/json"))
            .map(|(_, entry)| entry)
    })?;
    entry.get("schema")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_parameter_becomes_required_property() {
        let doc = json!({
            "paths": {"/users/{id}": {"get": {
                "operationId": "getUser",
                "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "string"}}]
            }}}
        });
        let catalog = OpenApiCatalog::from_document(&doc, None);
        assert_eq!(catalog.len(), 1);

        let tool = catalog.get("getUser").expect("getUser");
        let params = tool.descriptor.parameters.as_object().expect("object");
        assert_eq!(params.property("id").and_then(Schema::type_name), Some("string"));
        assert!(params.is_required("id"));
        assert_eq!(tool.operation.method, HttpMethod::Get);
        assert_eq!(tool.operation.path, "/users/{id}");
        assert_eq!(tool.operation.parameters[0].location, ParameterLocation::Path);
    }

    #[test]
    fn test_operation_without_id_is_skipped() {
        let doc = json!({
            "paths": {"/health": {"get": {"summary": "health"}}}
        });
        assert!(OpenApiCatalog::from_document(&doc, None).is_empty());
    }

    #[test]
    fn test_request_body_maps_to_body_property() {
        let body_schema = json!({"type": "object", "properties": {"name": {"type": "string"}}});
        let doc = json!({
            "paths": {"/items": {"post": {
                "operationId": "createItem",
                "requestBody": {"required": true, "content": {"application/json": {"schema": body_schema}}}
            }}}
        });
        let catalog = OpenApiCatalog::from_document(&doc, None);
        let tool = catalog.get("createItem").unwrap();
        let params = tool.descriptor.parameters.as_object().unwrap();
        assert_eq!(params.property("body").map(Schema::to_value), Some(body_schema));
        assert!(params.is_required("body"));
        assert!(tool.operation.has_body);
    }

    #[test]
    fn test_refs_are_resolved_before_cataloging() {
        let doc = json!({
            "components": {
                "schemas": {"Item": {"type": "object", "properties": {"sku": {"type": "string"}}}},
                "parameters": {"Limit": {"name": "limit", "in": "query", "schema": {"type": "integer"}}}
            },
            "paths": {"/items": {
                "get": {
                    "operationId": "listItems",
                    "parameters": [{"$ref": "#/components/parameters/Limit"}]
                },
                "put": {
                    "operationId": "putItem",
                    "requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Item"}}}}
                }
            }}
        });
        let catalog = OpenApiCatalog::from_document(&doc, None);
        let list = catalog.get("listItems").unwrap();
        assert_eq!(
            list.descriptor.parameters.as_object().unwrap().property("limit").and_then(Schema::type_name),
            Some("integer")
        );
        let put = catalog.get("putItem").unwrap();
        let body = put.descriptor.parameters.as_object().unwrap().property("body").unwrap();
        assert!(body.as_object().unwrap().property("sku").is_some());
        assert!(!put.descriptor.parameters.as_object().unwrap().is_required("body"));
    }

    #[test]
    fn test_description_precedence_and_defaults() {
        let doc = json!({
            "paths": {"/a": {
                "get": {"operationId": "a", "summary": "S", "description": "D",
                        "parameters": [{"name": "q", "in": "query", "description": "search text"}]},
                "post": {"operationId": "b", "description": "D"},
                "delete": {"operationId": "c"}
            }}
        });
        let catalog = OpenApiCatalog::from_document(&doc, None);
        let a = catalog.get("a").unwrap();
        assert_eq!(a.descriptor.description.as_deref(), Some("S"));
        let q = a.descriptor.parameters.as_object().unwrap().property("q").unwrap();
        assert_eq!(q.to_value(), json!({"type": "string", "description": "search text"}));
        assert_eq!(catalog.get("b").unwrap().descriptor.description.as_deref(), Some("D"));
        assert!(catalog.get("c").unwrap().descriptor.description.is_none());
    }

    #[test]
    fn test_duplicate_operation_id_last_wins() {
        let doc = json!({
            "paths": {
                "/first": {"get": {"operationId": "dup", "summary": "first"}},
                "/second": {"get": {"operationId": "dup", "summary": "second"}}
            }
        });
        let catalog = OpenApiCatalog::from_document(&doc, None);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("dup").unwrap().operation.path, "/second");
    }

    #[test]
    fn test_path_level_parameters_are_inherited() {
        let doc = json!({
            "paths": {"/orgs/{org}/repos": {
                "parameters": [
                    {"name": "org", "in": "path", "required": true},
                    {"name": "trace", "in": "query", "required": true}
                ],
                "get": {"operationId": "listRepos",
                        "parameters": [
                            {"name": "org", "in": "path", "required": true, "schema": {"type": "integer"}},
                            {"name": "trace", "in": "query", "required": false}
                        ]}
            }}
        });
        let catalog = OpenApiCatalog::from_document(&doc, None);
        let tool = catalog.get("listRepos").unwrap();
        assert_eq!(tool.operation.parameters.len(), 2);
        let object = tool.descriptor.parameters.as_object().unwrap();
        assert_eq!(object.property("org").unwrap().type_name(), Some("integer"));
        assert!(object.property("trace").is_some());
        assert_eq!(object.required, vec!["org".to_string()]);
        assert!(!tool.operation.parameter("trace").unwrap().required);
    }

    #[test]
    fn test_base_url_precedence() {
        let doc = json!({"servers": [{"url": "https://api.example.com/v1"}], "paths": {}});
        assert_eq!(OpenApiCatalog::from_document(&doc, None).base_url(), "https://api.example.com/v1");
        assert_eq!(
            OpenApiCatalog::from_document(&doc, Some("http://localhost:8080")).base_url(),
            "http://localhost:8080"
        );
        assert_eq!(OpenApiCatalog::from_document(&json!({"paths": {}}), None).base_url(), "");
    }

    #[test]
    fn test_yaml_document() {
        let text = r#"
openapi: 3.0.0
servers:
  - url: https://yaml.example.com
paths:
  /ping:
    get:
      operationId: ping
      summary: Ping the service
"#;
        let catalog =
            OpenApiCatalog::from_source(&OpenApiSource::Text(text.to_string()), None).unwrap();
        assert_eq!(catalog.base_url(), "https://yaml.example.com");
        assert_eq!(
            catalog.get("ping").unwrap().descriptor.description.as_deref(),
            Some("Ping the service")
        );
    }

    #[test]
    fn test_scalar_document_is_rejected() {
        assert!(matches!(parse_document("42"), Err(DocumentError::NotAMapping)));
    }
}

mod common;

use common::{init_tracing, spawn_echo_server};
use serde_json::{json, Value};
use toolset::{ApiSet, AuthConfig, InvokeConfig, OpenApiCatalog};

fn document(base_url: &str) -> Value {
    json!({
        "openapi": "3.0.0",
        "servers": [{"url": base_url}],
        "components": {"schemas": {"Item": {"type": "object", "properties": {"name": {"type": "string"}}}}},
        "paths": {
            "/items/{id}": {
                "get": {
                    "operationId": "getItem",
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string"}},
                        {"name": "verbose", "in": "query", "schema": {"type": "boolean"}}
                    ]
                },
                "put": {
                    "operationId": "replaceItem",
                    "parameters": [{"name": "id", "in": "path", "required": true}],
                    "requestBody": {"required": true, "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Item"}}}}
                }
            },
            "/items": {
                "get": {"operationId": "listItems"}
            },
            "/plain": {"get": {"operationId": "plain"}},
            "/missing": {"get": {"operationId": "missing"}}
        }
    })
}

async fn api_set(config: InvokeConfig) -> ApiSet {
    init_tracing();
    let base_url = spawn_echo_server().await;
    ApiSet::from_openapi(OpenApiCatalog::from_document(&document(&base_url), None), config)
}

#[tokio::test]
async fn test_path_and_query_routing() {
    let api = api_set(InvokeConfig::new()).await;
    let result = api
        .invoke("getItem", &json!({"id": "42", "verbose": true}), None)
        .await
        .unwrap();

    let http = result.as_http().expect("http result");
    assert_eq!(http.status_code, 200);
    assert!(http.error.is_none());
    assert_eq!(http.body["method"], json!("GET"));
    assert_eq!(http.body["path"], json!("/items/42"));
    assert_eq!(http.body["query"], json!("verbose=true"));
    assert!(http.headers.as_ref().unwrap().contains_key("content-type"));
}

#[tokio::test]
async fn test_body_and_auth_header() {
    let auth = AuthConfig::ApiKey {
        key: "X-Api-Key".into(),
        value: "s3cret".into(),
        location: Default::default(),
    };
    let api = api_set(auth.apply(InvokeConfig::new())).await;
    let result = api
        .invoke(
            "replaceItem",
            &json!({"id": 7, "body": {"name": "widget"}, "X-Request-Id": "req-1"}),
            None,
        )
        .await
        .unwrap();

    let body = &result.as_http().unwrap().body;
    assert_eq!(body["method"], json!("PUT"));
    assert_eq!(body["path"], json!("/items/7"));
    assert_eq!(body["body"], json!({"name": "widget"}));
    assert_eq!(body["apiKey"], json!("s3cret"));
    assert_eq!(body["requestId"], json!("req-1"));
    assert_eq!(body["query"], Value::Null);
}

#[tokio::test]
async fn test_path_values_stay_inside_their_segment() {
    let api = api_set(InvokeConfig::new()).await;

    let result = api.invoke("getItem", &json!({"id": "../admin"}), None).await.unwrap();
    assert_eq!(result.as_http().unwrap().body["path"], json!("/items/..%2Fadmin"));

    let result = api
        .invoke("getItem", &json!({"id": "a?role=admin"}), None)
        .await
        .unwrap();
    let body = &result.as_http().unwrap().body;
    assert_eq!(body["path"], json!("/items/a%3Frole%3Dadmin"));
    assert_eq!(body["query"], Value::Null);
}

#[tokio::test]
async fn test_header_argument_replaces_default_header() {
    let api = api_set(InvokeConfig::new().with_header("X-Api-Key", "default")).await;
    let result = api
        .invoke("listItems", &json!({"x-api-key": "per-call"}), None)
        .await
        .unwrap();
    assert_eq!(result.as_http().unwrap().body["apiKey"], json!("per-call"));
}

#[tokio::test]
async fn test_body_is_not_sent_with_get() {
    let api = api_set(InvokeConfig::new()).await;
    let result = api
        .invoke("listItems", &json!({"body": {"ignored": true}}), None)
        .await
        .unwrap();
    assert_eq!(result.as_http().unwrap().body["body"], Value::Null);
}

#[tokio::test]
async fn test_default_query_merged_with_call_arguments() {
    let api = api_set(InvokeConfig::new().with_query("page", 1).with_query("size", 10)).await;
    let overrides = InvokeConfig::new().with_query("size", 50);
    let result = api
        .invoke("listItems", &json!({"sort": "name"}), Some(&overrides))
        .await
        .unwrap();
    assert_eq!(
        result.as_http().unwrap().body["query"],
        json!("page=1&size=50&sort=name")
    );
}

#[tokio::test]
async fn test_text_and_error_status_are_data() {
    let api = api_set(InvokeConfig::new()).await;

    let plain = api.invoke("plain", &json!({}), None).await.unwrap();
    assert_eq!(plain.as_http().unwrap().body, json!("pong"));

    let missing = api.invoke("missing", &json!({}), None).await.unwrap();
    let http = missing.as_http().unwrap();
    assert_eq!(http.status_code, 404);
    assert!(!http.is_success());
    assert!(http.error.is_none());
}

#[tokio::test]
async fn test_transport_failure_is_data() {
    init_tracing();
    let catalog = OpenApiCatalog::from_document(&document("http://127.0.0.1:1"), None);
    let api = ApiSet::from_openapi(catalog, InvokeConfig::new());

    let result = api.invoke("listItems", &json!({}), None).await.unwrap();
    let http = result.as_http().unwrap();
    assert_eq!(http.status_code, 0);
    assert!(!http.error.as_deref().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_base_url_override() {
    init_tracing();
    let base_url = spawn_echo_server().await;
    let catalog = OpenApiCatalog::from_document(&document("http://127.0.0.1:1"), Some(&base_url));
    let api = ApiSet::from_openapi(catalog, InvokeConfig::new());

    let result = api.invoke("getItem", &json!({"id": "a"}), None).await.unwrap();
    assert_eq!(result.as_http().unwrap().status_code, 200);
}

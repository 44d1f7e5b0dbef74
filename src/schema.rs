//! JSON-Schema-compatible description model.
//!
//! A [`Schema`] is one shape description: common metadata (title, description,
//! enum, default) plus a [`SchemaKind`] keyed by the document's `type` tag.
//! Keys the model does not understand are kept verbatim in [`Schema::extra`],
//! so converting back with [`Schema::to_value`] never drops information.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::resolve::resolve_refs;

/// One JSON-Schema-like shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct Schema {
    /// Shape selected by the `type` tag (or composition keywords).
    pub kind: SchemaKind,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Allowed literal values, in declaration order.
    pub enum_values: Option<Vec<Value>>,
    pub default: Option<Value>,
    /// Keywords outside the typed model, preserved for lossless conversion.
    pub extra: Map<String, Value>,
}

/// Shape of a [`Schema`], keyed by its `type` tag.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SchemaKind {
    /// No `type` tag and no composition.
    #[default]
    Any,
    Object(ObjectSchema),
    Array(ArraySchema),
    String(StringSchema),
    Number(NumberSchema),
    Integer(NumberSchema),
    Boolean,
    Null,
    /// `anyOf` / `oneOf` / `allOf` without a `type` tag.
    Composite(Composition),
    /// A `type` tag this model has no dedicated shape for (e.g. `file`).
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    /// Properties in declaration order.
    pub properties: Vec<(String, Schema)>,
    pub required: Vec<String>,
    pub additional_properties: Option<bool>,
    /// The source had no `properties` map, so an empty list is not written back.
    pub omit_empty_properties: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArraySchema {
    pub items: Option<Box<Schema>>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringSchema {
    pub pattern: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumberSchema {
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
    /// Number (JSON Schema) or boolean (OpenAPI 3.0).
    pub exclusive_minimum: Option<Value>,
    pub exclusive_maximum: Option<Value>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Composition {
    pub any_of: Option<Vec<Schema>>,
    pub one_of: Option<Vec<Schema>>,
    pub all_of: Option<Vec<Schema>>,
}

impl ObjectSchema {
    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&Schema> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, schema)| schema)
    }

    /// Insert or replace a property, keeping the original position on replace.
    pub fn set_property(&mut self, name: impl Into<String>, schema: Schema) {
        let name = name.into();
        match self.properties.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = schema,
            None => self.properties.push((name, schema)),
        }
    }

    /// Mark a property as required. Duplicates are ignored.
    pub fn require(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name);
        }
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

impl Schema {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// `{"type": "object", "properties": {}}`.
    pub fn empty_object() -> Self {
        Self::new(SchemaKind::Object(ObjectSchema::default()))
    }

    pub fn object(object: ObjectSchema) -> Self {
        Self::new(SchemaKind::Object(object))
    }

    pub fn string() -> Self {
        Self::new(SchemaKind::String(StringSchema::default()))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The `type` tag this schema serializes with, if any.
    pub fn type_name(&self) -> Option<&str> {
        match &self.kind {
            SchemaKind::Any | SchemaKind::Composite(_) => None,
            SchemaKind::Object(_) => Some("object"),
            SchemaKind::Array(_) => Some("array"),
            SchemaKind::String(_) => Some("string"),
            SchemaKind::Number(_) => Some("number"),
            SchemaKind::Integer(_) => Some("integer"),
            SchemaKind::Boolean => Some("boolean"),
            SchemaKind::Null => Some("null"),
            SchemaKind::Other(name) => Some(name),
        }
    }

    pub fn as_object(&self) -> Option<&ObjectSchema> {
        match &self.kind {
            SchemaKind::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ObjectSchema> {
        match &mut self.kind {
            SchemaKind::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Build a schema from a JSON-Schema-like document. Never fails; anything
    /// outside the typed model lands in [`Schema::extra`].
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };
        let mut rest = map.clone();

        let title = take_string(&mut rest, "title");
        let description = take_string(&mut rest, "description");
        let enum_values = match rest.get("enum") {
            Some(Value::Array(_)) => match rest.shift_remove("enum") {
                Some(Value::Array(values)) => Some(values),
                _ => None,
            },
            _ => None,
        };
        let default = rest.shift_remove("default");

        let kind = match rest.get("type") {
            Some(Value::String(tag)) => {
                let tag = tag.clone();
                rest.shift_remove("type");
                parse_kind(&tag, &mut rest)
            }
            Some(_) => SchemaKind::Any,
            None => parse_composition(&mut rest)
                .map(SchemaKind::Composite)
                .unwrap_or(SchemaKind::Any),
        };

        Self {
            kind,
            title,
            description,
            enum_values,
            default,
            extra: rest,
        }
    }

    /// Convert back to a plain JSON-Schema document.
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        if let Some(tag) = self.type_name() {
            out.insert("type".into(), Value::String(tag.to_string()));
        }
        if let Some(title) = &self.title {
            out.insert("title".into(), Value::String(title.clone()));
        }
        if let Some(description) = &self.description {
            out.insert("description".into(), Value::String(description.clone()));
        }

        match &self.kind {
            SchemaKind::Object(object) => {
                if !(object.omit_empty_properties && object.properties.is_empty()) {
                    let properties = object
                        .properties
                        .iter()
                        .map(|(name, schema)| (name.clone(), schema.to_value()))
                        .collect();
                    out.insert("properties".into(), Value::Object(properties));
                }
                if !object.required.is_empty() {
                    out.insert(
                        "required".into(),
                        Value::Array(object.required.iter().cloned().map(Value::String).collect()),
                    );
                }
                if let Some(additional) = object.additional_properties {
                    out.insert("additionalProperties".into(), Value::Bool(additional));
                }
            }
            SchemaKind::Array(array) => {
                if let Some(items) = &array.items {
                    out.insert("items".into(), items.to_value());
                }
                put_u64(&mut out, "minItems", array.min_items);
                put_u64(&mut out, "maxItems", array.max_items);
            }
            SchemaKind::String(string) => {
                if let Some(pattern) = &string.pattern {
                    out.insert("pattern".into(), Value::String(pattern.clone()));
                }
                put_u64(&mut out, "minLength", string.min_length);
                put_u64(&mut out, "maxLength", string.max_length);
                if let Some(format) = &string.format {
                    out.insert("format".into(), Value::String(format.clone()));
                }
            }
            SchemaKind::Number(number) | SchemaKind::Integer(number) => {
                if let Some(minimum) = &number.minimum {
                    out.insert("minimum".into(), Value::Number(minimum.clone()));
                }
                if let Some(maximum) = &number.maximum {
                    out.insert("maximum".into(), Value::Number(maximum.clone()));
                }
                if let Some(exclusive) = &number.exclusive_minimum {
                    out.insert("exclusiveMinimum".into(), exclusive.clone());
                }
                if let Some(exclusive) = &number.exclusive_maximum {
                    out.insert("exclusiveMaximum".into(), exclusive.clone());
                }
                if let Some(format) = &number.format {
                    out.insert("format".into(), Value::String(format.clone()));
                }
            }
            SchemaKind::Composite(composition) => {
                put_schemas(&mut out, "anyOf", composition.any_of.as_deref());
                put_schemas(&mut out, "oneOf", composition.one_of.as_deref());
                put_schemas(&mut out, "allOf", composition.all_of.as_deref());
            }
            SchemaKind::Any | SchemaKind::Boolean | SchemaKind::Null | SchemaKind::Other(_) => {}
        }

        if let Some(values) = &self.enum_values {
            out.insert("enum".into(), Value::Array(values.clone()));
        }
        if let Some(default) = &self.default {
            out.insert("default".into(), default.clone());
        }
        for (key, value) in &self.extra {
            out.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(out)
    }

    /// Plain JSON-Schema document for presentation to a tool-calling model.
    pub fn to_json_schema(&self) -> Value {
        self.to_value()
    }

    /// Derive a schema from a Rust type via `schemars`, inlining its definitions.
    pub fn for_type<T: schemars::JsonSchema>() -> Self {
        let root = schemars::schema_for!(T);
        let document = serde_json::to_value(&root).unwrap_or_default();
        let mut resolved = resolve_refs(&document);
        if let Value::Object(map) = &mut resolved {
            map.shift_remove("$schema");
            map.shift_remove("definitions");
        }
        Self::from_value(&resolved)
    }
}

impl From<Value> for Schema {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

impl From<Schema> for Value {
    fn from(schema: Schema) -> Self {
        schema.to_value()
    }
}

fn parse_kind(tag: &str, rest: &mut Map<String, Value>) -> SchemaKind {
    match tag {
        "object" => {
            let omit_empty_properties = !matches!(rest.get("properties"), Some(Value::Object(_)));
            let properties = match rest.get("properties") {
                Some(Value::Object(_)) => match rest.shift_remove("properties") {
                    Some(Value::Object(props)) => props
                        .iter()
                        .map(|(name, schema)| (name.clone(), Schema::from_value(schema)))
                        .collect(),
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            };
            let required = match rest.get("required") {
                Some(Value::Array(names)) if names.iter().all(Value::is_string) => {
                    let names = names
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect();
                    rest.shift_remove("required");
                    names
                }
                _ => Vec::new(),
            };
            let additional_properties = match rest.get("additionalProperties") {
                Some(Value::Bool(flag)) => {
                    let flag = *flag;
                    rest.shift_remove("additionalProperties");
                    Some(flag)
                }
                _ => None,
            };
            SchemaKind::Object(ObjectSchema {
                properties,
                required,
                additional_properties,
                omit_empty_properties,
            })
        }
        "array" => {
            let items = match rest.get("items") {
                Some(Value::Object(_)) => rest
                    .shift_remove("items")
                    .map(|items| Box::new(Schema::from_value(&items))),
                _ => None,
            };
            SchemaKind::Array(ArraySchema {
                items,
                min_items: take_u64(rest, "minItems"),
                max_items: take_u64(rest, "maxItems"),
            })
        }
        "string" => SchemaKind::String(StringSchema {
            pattern: take_string(rest, "pattern"),
            min_length: take_u64(rest, "minLength"),
            max_length: take_u64(rest, "maxLength"),
            format: take_string(rest, "format"),
        }),
        "number" => SchemaKind::Number(parse_number(rest)),
        "integer" => SchemaKind::Integer(parse_number(rest)),
        "boolean" => SchemaKind::Boolean,
        "null" => SchemaKind::Null,
        other => SchemaKind::Other(other.to_string()),
    }
}

fn parse_number(rest: &mut Map<String, Value>) -> NumberSchema {
    NumberSchema {
        minimum: take_number(rest, "minimum"),
        maximum: take_number(rest, "maximum"),
        exclusive_minimum: take_bound(rest, "exclusiveMinimum"),
        exclusive_maximum: take_bound(rest, "exclusiveMaximum"),
        format: take_string(rest, "format"),
    }
}

fn parse_composition(rest: &mut Map<String, Value>) -> Option<Composition> {
    let composition = Composition {
        any_of: take_schemas(rest, "anyOf"),
        one_of: take_schemas(rest, "oneOf"),
        all_of: take_schemas(rest, "allOf"),
    };
    if composition.any_of.is_none() && composition.one_of.is_none() && composition.all_of.is_none()
    {
        None
    } else {
        Some(composition)
    }
}

fn take_string(rest: &mut Map<String, Value>, key: &str) -> Option<String> {
    match rest.get(key) {
        Some(Value::String(_)) => match rest.shift_remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

fn take_u64(rest: &mut Map<String, Value>, key: &str) -> Option<u64> {
    let n = rest.get(key).and_then(Value::as_u64)?;
    rest.shift_remove(key);
    Some(n)
}

fn take_number(rest: &mut Map<String, Value>, key: &str) -> Option<Number> {
    match rest.get(key) {
        Some(Value::Number(n)) => {
            let n = n.clone();
            rest.shift_remove(key);
            Some(n)
        }
        _ => None,
    }
}

fn take_bound(rest: &mut Map<String, Value>, key: &str) -> Option<Value> {
    match rest.get(key) {
        Some(Value::Number(_)) | Some(Value::Bool(_)) => rest.shift_remove(key),
        _ => None,
    }
}

fn take_schemas(rest: &mut Map<String, Value>, key: &str) -> Option<Vec<Schema>> {
    match rest.get(key) {
        Some(Value::Array(_)) => match rest.shift_remove(key) {
            Some(Value::Array(items)) => Some(items.iter().map(Schema::from_value).collect()),
            _ => None,
        },
        _ => None,
    }
}

fn put_u64(out: &mut Map<String, Value>, key: &str, value: Option<u64>) {
    if let Some(n) = value {
        out.insert(key.to_string(), Value::from(n));
    }
}

fn put_schemas(out: &mut Map<String, Value>, key: &str, schemas: Option<&[Schema]>) {
    if let Some(schemas) = schemas {
        out.insert(
            key.to_string(),
            Value::Array(schemas.iter().map(Schema::to_value).collect()),
        );
    }
}

//! Local `$ref` resolution for JSON-like documents.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::warn;

/// Nesting depth past which a branch is replaced by an empty object.
const MAX_DEPTH: usize = 512;

/// Total nodes one resolution may produce. Fan-out through shared
/// definitions grows the output exponentially, so past this budget every
/// remaining branch is replaced by an empty object.
const MAX_NODES: usize = 1 << 20;

/// Replace every local `$ref` in `document` with the resolved target.
///
/// A node `{"$ref": "#/a/b", ...siblings}` becomes the resolved value at
/// `/a/b` of the original root, with the (resolved) siblings overlaid on top.
/// Non-local, missing, and cyclic references degrade to `{}` with a warning,
/// as does everything past the depth or node budget.
/// The input is never mutated; the result is a fresh copy.
pub fn resolve_refs(document: &Value) -> Value {
    let mut resolver = Resolver {
        root: document,
        in_progress: HashSet::new(),
        expanded: 0,
        exhausted: false,
    };
    resolver.resolve(document, 0)
}

struct Resolver<'a> {
    root: &'a Value,
    /// References currently being expanded on the active path.
    in_progress: HashSet<String>,
    expanded: usize,
    exhausted: bool,
}

impl Resolver<'_> {
    fn resolve(&mut self, node: &Value, depth: usize) -> Value {
        if depth > MAX_DEPTH {
            warn!("Reference resolution exceeded depth {}, truncating", MAX_DEPTH);
            return empty();
        }
        if self.expanded >= MAX_NODES {
            if !self.exhausted {
                warn!("Reference resolution exceeded {} nodes, truncating", MAX_NODES);
                self.exhausted = true;
            }
            return empty();
        }
        self.expanded += 1;

        match node {
            Value::Object(map) => match map.get("$ref") {
                Some(reference) => self.resolve_reference(reference, map, depth),
                None => Value::Object(
                    map.iter()
                        .map(|(key, value)| (key.clone(), self.resolve(value, depth + 1)))
                        .collect(),
                ),
            },
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve(item, depth + 1))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn resolve_reference(
        &mut self,
        reference: &Value,
        node: &Map<String, Value>,
        depth: usize,
    ) -> Value {
        let target = match reference.as_str() {
            Some(reference) => self.lookup(reference, depth),
            None => {
                warn!("Ignoring non-string $ref: {}", reference);
                empty()
            }
        };

        let siblings: Map<String, Value> = node
            .iter()
            .filter(|(key, _)| key.as_str() != "$ref")
            .map(|(key, value)| (key.clone(), self.resolve(value, depth + 1)))
            .collect();

        match target {
            Value::Object(mut merged) => {
                for (key, value) in siblings {
                    merged.insert(key, value);
                }
                Value::Object(merged)
            }
            other if siblings.is_empty() => other,
            _ => Value::Object(siblings),
        }
    }

    fn lookup(&mut self, reference: &str, depth: usize) -> Value {
        let Some(pointer) = reference.strip_prefix('#').filter(|p| p.starts_with('/')) else {
            warn!("Unsupported non-local $ref {}, leaving unresolved", reference);
            return empty();
        };

        if !self.in_progress.insert(reference.to_string()) {
            warn!("Cyclic $ref {} detected, leaving unresolved", reference);
            return empty();
        }

        let resolved = match self.root.pointer(pointer) {
            Some(target) => self.resolve(target, depth + 1),
            None => {
                warn!("Unresolvable $ref {}", reference);
                empty()
            }
        };

        self.in_progress.remove(reference);
        resolved
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sibling_keys_overlay_target() {
        let doc = json!({
            "x": {"type": "object", "description": "original"},
            "use": {"$ref": "#/x", "description": "d"}
        });
        let resolved = resolve_refs(&doc);
        assert_eq!(resolved["use"], json!({"type": "object", "description": "d"}));
    }

    #[test]
    fn test_document_without_refs_is_copied() {
        let doc = json!({"a": [1, {"b": "c"}], "d": null});
        assert_eq!(resolve_refs(&doc), doc);
    }

    #[test]
    fn test_nested_targets_are_resolved_first() {
        let doc = json!({
            "components": {"schemas": {
                "Id": {"type": "string"},
                "User": {"type": "object", "properties": {"id": {"$ref": "#/components/schemas/Id"}}}
            }},
            "list": [{"$ref": "#/components/schemas/User"}]
        });
        let resolved = resolve_refs(&doc);
        assert_eq!(resolved["list"][0]["properties"]["id"], json!({"type": "string"}));
    }

    #[test]
    fn test_mutual_cycle_terminates() {
        let doc = json!({
            "A": {"$ref": "#/B"},
            "B": {"$ref": "#/A"}
        });
        let resolved = resolve_refs(&doc);
        assert_eq!(resolved["A"], json!({}));
        assert_eq!(resolved["B"], json!({}));
    }

    #[test]
    fn test_self_referential_schema_is_cut() {
        let doc = json!({
            "Node": {
                "type": "object",
                "properties": {"children": {"type": "array", "items": {"$ref": "#/Node"}}}
            },
            "root": {"$ref": "#/Node"}
        });
        let resolved = resolve_refs(&doc);
        assert_eq!(resolved["root"]["type"], json!("object"));
        assert_eq!(resolved["root"]["properties"]["children"]["items"], json!({}));

        let items = &resolved["Node"]["properties"]["children"]["items"];
        assert_eq!(items["type"], json!("object"));
        assert_eq!(items["properties"]["children"]["items"], json!({}));
    }

    #[test]
    fn test_non_local_and_missing_refs_degrade() {
        let doc = json!({
            "remote": {"$ref": "https://example.com/schema.json"},
            "missing": {"$ref": "#/nope/nothing"},
            "bad": {"$ref": 42}
        });
        let resolved = resolve_refs(&doc);
        assert_eq!(resolved["remote"], json!({}));
        assert_eq!(resolved["missing"], json!({}));
        assert_eq!(resolved["bad"], json!({}));
    }

    #[test]
    fn test_escaped_pointer_segments() {
        let doc = json!({
            "paths": {"/users/{id}": {"summary": "user"}},
            "alias": {"$ref": "#/paths/~1users~1{id}"}
        });
        assert_eq!(resolve_refs(&doc)["alias"], json!({"summary": "user"}));
    }

    fn node_count(value: &Value) -> usize {
        1 + match value {
            Value::Object(map) => map.values().map(node_count).sum(),
            Value::Array(items) => items.iter().map(node_count).sum(),
            _ => 0,
        }
    }

    #[test]
    fn test_fan_out_expansion_is_bounded() {
        let mut defs = Map::new();
        defs.insert("D0".to_string(), json!({"type": "string"}));
        for level in 1..=30 {
            let prev = format!("#/defs/D{}", level - 1);
            defs.insert(
                format!("D{level}"),
                json!({"type": "object", "properties": {"a": {"$ref": prev}, "b": {"$ref": prev}}}),
            );
        }
        let doc = json!({"defs": defs, "root": {"$ref": "#/defs/D30"}});

        let resolved = resolve_refs(&doc);
        assert_eq!(
            resolved["defs"]["D1"]["properties"]["a"],
            json!({"type": "string"})
        );
        assert!(node_count(&resolved) < 4 * MAX_NODES);
        assert_eq!(resolved["root"], json!({}));
    }

    #[test]
    fn test_nesting_past_max_depth_is_cut() {
        let mut doc = json!({"leaf": true});
        for _ in 0..MAX_DEPTH + 50 {
            doc = json!({"a": doc});
        }

        let resolved = resolve_refs(&doc);
        let mut node = &resolved;
        for _ in 0..MAX_DEPTH {
            node = &node["a"];
        }
        assert_eq!(node, &json!({"a": {}}));
        assert_eq!(node["a"], json!({}));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let doc = json!({
            "defs": {"a": {"type": "integer"}},
            "p": [{"$ref": "#/defs/a", "minimum": 1}]
        });
        assert_eq!(resolve_refs(&doc), resolve_refs(&doc));
    }
}

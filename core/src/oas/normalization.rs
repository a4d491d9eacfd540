#![deny(missing_docs)]

//! # Schema Normalization
//!
//! Rewrites applied to the raw document before `$ref` inlining and parsing, so
//! the schema parser only has to understand one spelling of each concept:
//!
//! - `nullable: true` / `x-nullable: true` become a `type` list containing `"null"`
//!   (or an `anyOf` with a null branch when the schema has no `type`).
//! - `const` becomes a single-literal `enum`.
//! - Boolean schemas under `properties` and `items` become object schemas.

use serde_json::{json, Map, Value};

/// Keys whose values are data, not schemas.
const LITERAL_KEYS: &[&str] = &["example", "examples", "default", "enum", "x-openstack"];

/// Applies every rewrite to the whole document in place.
pub fn normalize_document(value: &mut Value) {
    normalize_nullable(value);
    normalize_const(value);
    normalize_boolean_schemas(value);
}

/// Rewrites OpenAPI 3.0 nullability flags into JSON Schema null unions.
pub fn normalize_nullable(value: &mut Value) {
    if let Value::Object(map) = value {
        if let Some(replacement) = apply_nullable_flag(map) {
            *value = replacement;
        }
    }

    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if LITERAL_KEYS.contains(&key.as_str()) {
                    continue;
                }
                normalize_nullable(v);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_nullable),
        _ => {}
    }
}

/// Rewrites `const: X` into `enum: [X]`, inferring `type` when missing.
pub fn normalize_const(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(literal) = map.remove("const") {
                if !map.contains_key("type") {
                    if let Some(type_name) = literal_type(&literal) {
                        map.insert("type".into(), Value::String(type_name.into()));
                    }
                }
                map.entry("enum")
                    .or_insert_with(|| Value::Array(vec![literal]));
            }
            for (key, v) in map.iter_mut() {
                if LITERAL_KEYS.contains(&key.as_str()) {
                    continue;
                }
                normalize_const(v);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_const),
        _ => {}
    }
}

/// Replaces `true`/`false` schemas found under `properties` or `items`.
///
/// `additionalProperties: <bool>` keeps its boolean meaning and is left alone.
pub fn normalize_boolean_schemas(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(props) = map.get_mut("properties").and_then(Value::as_object_mut) {
                for prop in props.values_mut() {
                    if let Value::Bool(flag) = prop {
                        *prop = bool_schema(*flag);
                    }
                }
            }
            if let Some(items) = map.get_mut("items") {
                if let Value::Bool(flag) = items {
                    *items = bool_schema(*flag);
                }
            }
            for (key, v) in map.iter_mut() {
                if LITERAL_KEYS.contains(&key.as_str()) {
                    continue;
                }
                normalize_boolean_schemas(v);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_boolean_schemas),
        _ => {}
    }
}

fn bool_schema(flag: bool) -> Value {
    if flag {
        Value::Object(Map::new())
    } else {
        json!({"type": "object", "additionalProperties": false, "properties": {}})
    }
}

fn literal_type(value: &Value) -> Option<&'static str> {
    match value {
        Value::String(_) => Some("string"),
        Value::Bool(_) => Some("boolean"),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some("integer"),
        Value::Number(_) => Some("number"),
        Value::Null => Some("null"),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn apply_nullable_flag(map: &mut Map<String, Value>) -> Option<Value> {
    let flagged = |key: &str| map.get(key).and_then(Value::as_bool).unwrap_or(false);
    let nullable = flagged("nullable") || flagged("x-nullable");
    if map.contains_key("nullable") || map.contains_key("x-nullable") {
        map.remove("nullable");
        map.remove("x-nullable");
    }
    if !nullable {
        return None;
    }

    match map.get("type").cloned() {
        Some(Value::String(s)) => {
            if s != "null" {
                map.insert("type".into(), json!([s, "null"]));
            }
            None
        }
        Some(Value::Array(mut types)) => {
            if !types.iter().any(|t| t.as_str() == Some("null")) {
                types.push(Value::String("null".into()));
            }
            map.insert("type".into(), Value::Array(types));
            None
        }
        _ => {
            let original = Value::Object(std::mem::take(map));
            Some(json!({"anyOf": [original, {"type": "null"}]}))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_with_type() {
        let mut v = json!({"type": "string", "nullable": true, "maxLength": 255});
        normalize_nullable(&mut v);
        assert_eq!(v, json!({"type": ["string", "null"], "maxLength": 255}));
    }

    #[test]
    fn test_nullable_type_list_not_duplicated() {
        let mut v = json!({"type": ["integer", "null"], "x-nullable": true});
        normalize_nullable(&mut v);
        assert_eq!(v, json!({"type": ["integer", "null"]}));
    }

    #[test]
    fn test_nullable_without_type_wraps() {
        let mut v = json!({"properties": {"a": {"nullable": true, "$ref": "#/x"}}});
        normalize_nullable(&mut v);
        assert_eq!(
            v["properties"]["a"],
            json!({"anyOf": [{"$ref": "#/x"}, {"type": "null"}]})
        );
    }

    #[test]
    fn test_nullable_false_is_dropped() {
        let mut v = json!({"type": "string", "nullable": false});
        normalize_nullable(&mut v);
        assert_eq!(v, json!({"type": "string"}));
    }

    #[test]
    fn test_const_becomes_enum() {
        let mut v = json!({"properties": {"kind": {"const": "server"}}});
        normalize_const(&mut v);
        assert_eq!(
            v["properties"]["kind"],
            json!({"type": "string", "enum": ["server"]})
        );
    }

    #[test]
    fn test_const_inside_example_untouched() {
        let mut v = json!({"type": "object", "example": {"const": 1}});
        normalize_const(&mut v);
        assert_eq!(v["example"], json!({"const": 1}));
    }

    #[test]
    fn test_boolean_property_schema() {
        let mut v = json!({
            "type": "object",
            "properties": {"anything": true},
            "additionalProperties": false
        });
        normalize_boolean_schemas(&mut v);
        assert_eq!(v["properties"]["anything"], json!({}));
        assert_eq!(v["additionalProperties"], json!(false));
    }
}

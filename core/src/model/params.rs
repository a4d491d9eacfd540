//! # Parameter Parsing
//!
//! Converts OpenAPI parameter objects into [`RequestParameter`]s.
//!
//! Parameters only carry primitives and lists of primitives, so they never add
//! entries to a model list.

use crate::error::{AppError, AppResult};
use crate::model::adt::{
    DataType, ListType, ParameterLocation, Primitive, PrimitiveNumber, PrimitiveString,
    RequestParameter,
};
use crate::model::parser::versions;
use serde_json::{Map, Value};

/// Parses one (already inlined) parameter object.
pub fn parse_parameter(param: &Value) -> AppResult<RequestParameter> {
    let name = param
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::InvalidDocument(format!("Parameter without name: {}", param)))?;
    let location_raw = param
        .get("in")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::InvalidDocument(format!("Parameter `{}` without `in`", name)))?;
    let location = ParameterLocation::parse(location_raw).ok_or_else(|| {
        AppError::UnsupportedParameterShape(format!(
            "Parameter `{}` has unknown location `{}`",
            name, location_raw
        ))
    })?;

    let ext = match param.get("x-openstack") {
        None => None,
        Some(Value::Object(ext)) => Some(ext),
        Some(other) => {
            return Err(AppError::InvalidDocument(format!(
                "x-openstack of parameter `{}` must be a mapping, got {}",
                name, other
            )))
        }
    };
    let is_flag = ext
        .and_then(|e| e.get("is-flag"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let empty = Map::new();
    let schema = param.get("schema").and_then(Value::as_object);
    let data_type = match schema {
        Some(schema) => parameter_type(name, location, param, schema)?,
        None => None,
    };
    let data_type = data_type.unwrap_or_else(|| {
        tracing::warn!(parameter = name, "parameter type not detected, using string");
        DataType::string()
    });

    let (min_ver, max_ver) = versions(param);
    let description = param
        .get("description")
        .or_else(|| schema.unwrap_or(&empty).get("description"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(RequestParameter {
        name: name.to_string(),
        location,
        data_type,
        description,
        is_required: location == ParameterLocation::Path
            || param.get("required").and_then(Value::as_bool) == Some(true),
        is_flag,
        min_ver,
        max_ver,
    })
}

/// `None` means the schema gave no usable type information.
fn parameter_type(
    name: &str,
    location: ParameterLocation,
    param: &Value,
    schema: &Map<String, Value>,
) -> AppResult<Option<DataType>> {
    let mut types: Vec<&str> = match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(list)) => list.iter().filter_map(Value::as_str).collect(),
        _ => return Ok(None),
    };
    types.retain(|t| *t != "null");
    types.sort_unstable();
    types.dedup();

    let data_type = match types.as_slice() {
        [] => DataType::Primitive(Primitive::Null),
        [single] => match *single {
            "array" => list_type(name, location, param, schema)?,
            other => match primitive(other, schema) {
                Some(p) => DataType::Primitive(p),
                None => {
                    return Err(AppError::UnsupportedParameterShape(format!(
                        "Parameter `{}` has unsupported type `{}`",
                        name, other
                    )))
                }
            },
        },
        combination if location == ParameterLocation::Query => {
            if name == "limit" {
                DataType::Primitive(Primitive::Integer(PrimitiveNumber {
                    minimum: Some(0.0),
                    ..Default::default()
                }))
            } else {
                match combination {
                    ["boolean", "string"] => DataType::Primitive(Primitive::Boolean),
                    ["integer", "string"] => DataType::Primitive(Primitive::Integer(number(schema))),
                    ["number", "string"] => DataType::Primitive(Primitive::Number(number(schema))),
                    _ => {
                        return Err(AppError::UnsupportedParameterShape(format!(
                            "Parameter `{}` mixes types {:?}",
                            name, combination
                        )))
                    }
                }
            }
        }
        combination => {
            return Err(AppError::UnsupportedParameterShape(format!(
                "Parameter `{}` mixes types {:?}",
                name, combination
            )))
        }
    };
    Ok(Some(data_type))
}

fn list_type(
    name: &str,
    location: ParameterLocation,
    param: &Value,
    schema: &Map<String, Value>,
) -> AppResult<DataType> {
    let items = schema
        .get("items")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let item_kind = items.get("type").and_then(Value::as_str).unwrap_or("string");
    let item_type = match item_kind {
        "string" | "integer" | "number" | "boolean" => {
            primitive(item_kind, &items).map(DataType::Primitive)
        }
        _ => None,
    }
    .ok_or_else(|| {
        AppError::UnsupportedParameterShape(format!(
            "Parameter `{}` is a list of non primitive items",
            name
        ))
    })?;

    let default_style = match location {
        ParameterLocation::Query | ParameterLocation::Cookie => "form",
        ParameterLocation::Path | ParameterLocation::Header => "simple",
    };
    let style = param
        .get("style")
        .and_then(Value::as_str)
        .unwrap_or(default_style);
    let explode = param
        .get("explode")
        .and_then(Value::as_bool)
        .unwrap_or(style == "form");
    let unique = schema.get("uniqueItems").and_then(Value::as_bool) == Some(true);

    let list = ListType {
        reference: None,
        description: None,
        item_type: Box::new(item_type),
    };
    match (style, explode) {
        ("form", false) | ("simple", _) => Ok(DataType::CommaSeparatedList(list)),
        ("form", true) if unique => Ok(DataType::Set(list)),
        ("form", true) => Ok(DataType::Array(list)),
        (other, _) => Err(AppError::UnsupportedParameterShape(format!(
            "Parameter `{}` uses unsupported style `{}`",
            name, other
        ))),
    }
}

fn primitive(type_name: &str, schema: &Map<String, Value>) -> Option<Primitive> {
    match type_name {
        "string" => Some(Primitive::String(PrimitiveString {
            format: schema.get("format").and_then(Value::as_str).map(str::to_string),
            min_length: schema.get("minLength").and_then(Value::as_u64),
            max_length: schema.get("maxLength").and_then(Value::as_u64),
            pattern: schema.get("pattern").and_then(Value::as_str).map(str::to_string),
        })),
        "integer" => Some(Primitive::Integer(number(schema))),
        "number" => Some(Primitive::Number(number(schema))),
        "boolean" => Some(Primitive::Boolean),
        "null" => Some(Primitive::Null),
        _ => None,
    }
}

fn number(schema: &Map<String, Value>) -> PrimitiveNumber {
    PrimitiveNumber {
        format: schema.get("format").and_then(Value::as_str).map(str::to_string),
        minimum: schema.get("minimum").and_then(Value::as_f64),
        maximum: schema.get("maximum").and_then(Value::as_f64),
        multiple_of: schema.get("multipleOf").and_then(Value::as_f64),
    }
}

/// Merges path-level and operation-level parameters.
///
/// Operation-level entries replace path-level ones with the same `(name, in)`.
pub fn merge_parameters(path_level: &[Value], operation_level: &[Value]) -> Vec<Value> {
    let key = |p: &Value| {
        (
            p.get("name").and_then(Value::as_str).map(str::to_string),
            p.get("in").and_then(Value::as_str).map(str::to_string),
        )
    };
    let mut merged: Vec<Value> = path_level.to_vec();
    for param in operation_level {
        match merged.iter_mut().find(|p| key(p) == key(param)) {
            Some(slot) => *slot = param.clone(),
            None => merged.push(param.clone()),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::adt::ModelKind;
    use serde_json::json;

    #[test]
    fn test_path_parameter_is_required() {
        let p = parse_parameter(&json!({
            "name": "server_id", "in": "path", "schema": {"type": "string", "format": "uuid"}
        }))
        .unwrap();
        assert!(p.is_required);
        assert_eq!(p.location, ParameterLocation::Path);
        assert_eq!(p.data_type.kind(), ModelKind::String);
    }

    #[test]
    fn test_missing_schema_defaults_to_string() {
        let p = parse_parameter(&json!({"name": "x", "in": "header"})).unwrap();
        assert_eq!(p.data_type, DataType::string());
        assert!(!p.is_required);
    }

    #[test]
    fn test_unknown_location_fails() {
        let err = parse_parameter(&json!({"name": "x", "in": "body"})).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedParameterShape(_)));
    }

    #[test]
    fn test_flag_parameter() {
        let p = parse_parameter(&json!({
            "name": "all_tenants", "in": "query",
            "schema": {"type": "boolean"},
            "x-openstack": {"is-flag": true}
        }))
        .unwrap();
        assert!(p.is_flag);
        assert_eq!(p.data_type, DataType::Primitive(Primitive::Boolean));
    }

    #[test]
    fn test_query_array_styles() {
        let csv = parse_parameter(&json!({
            "name": "fields", "in": "query", "style": "form", "explode": false,
            "schema": {"type": "array", "items": {"type": "string"}}
        }))
        .unwrap();
        assert_eq!(csv.data_type.kind(), ModelKind::CommaSeparatedList);

        let set = parse_parameter(&json!({
            "name": "tags", "in": "query",
            "schema": {"type": "array", "items": {"type": "string"}, "uniqueItems": true}
        }))
        .unwrap();
        assert_eq!(set.data_type.kind(), ModelKind::Set);

        let list = parse_parameter(&json!({
            "name": "ids", "in": "query",
            "schema": {"type": "array", "items": {"type": "string"}}
        }))
        .unwrap();
        assert_eq!(list.data_type.kind(), ModelKind::Array);
    }

    #[test]
    fn test_query_type_combinations() {
        let limit = parse_parameter(&json!({
            "name": "limit", "in": "query", "schema": {"type": ["string", "integer"]}
        }))
        .unwrap();
        assert_eq!(limit.data_type.kind(), ModelKind::Integer);

        let flag = parse_parameter(&json!({
            "name": "deleted", "in": "query", "schema": {"type": ["string", "boolean", "null"]}
        }))
        .unwrap();
        assert_eq!(flag.data_type, DataType::Primitive(Primitive::Boolean));

        let err = parse_parameter(&json!({
            "name": "x", "in": "query", "schema": {"type": ["object", "string"]}
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedParameterShape(_)));
    }

    #[test]
    fn test_array_of_objects_rejected() {
        let err = parse_parameter(&json!({
            "name": "x", "in": "query",
            "schema": {"type": "array", "items": {"type": "object"}}
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedParameterShape(_)));
    }

    #[test]
    fn test_merge_parameters_operation_wins() {
        let path = vec![
            json!({"name": "id", "in": "path", "description": "path level"}),
            json!({"name": "limit", "in": "query"}),
        ];
        let op = vec![
            json!({"name": "id", "in": "path", "description": "op level"}),
            json!({"name": "id", "in": "query"}),
        ];
        let merged = merge_parameters(&path, &op);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0]["description"], json!("op level"));
        assert_eq!(merged[2]["in"], json!("query"));
    }
}

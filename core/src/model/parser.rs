//! # Schema Parser
//!
//! Turns a JSON-Schema fragment into the ADT of [`crate::model`].
//!
//! Parsing is depth-first. Every named composite (struct, dictionary, enum,
//! one-of) is appended to the model list once and embedded in its parent as a
//! [`DataType::Reference`]. A name/kind pair seen twice with the same content
//! hash is reused; with different content it is prefixed by the parent name,
//! and a second collision is an error.

use crate::error::{AppError, AppResult};
use crate::model::adt::{
    DataType, Dictionary, Enum, EnumBase, ListType, ModelKind, OneOfType, ParsedSchema, Primitive,
    PrimitiveNumber, PrimitiveString, Reference, Struct, StructField,
};
use crate::model::hash::content_hash;
use crate::model::merge::{deep_merge, merged};
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Keywords that only constrain an object and never describe a distinct shape.
const CONSTRAINT_KEYWORDS: &[&str] = &[
    "required",
    "not",
    "minProperties",
    "maxProperties",
    "description",
    "title",
];

/// Keywords that make a schema describe an object.
const OBJECT_KEYWORDS: &[&str] = &["properties", "additionalProperties", "patternProperties"];

/// Naming and versioning scope of the node being parsed.
#[derive(Debug, Clone, Default)]
struct Scope {
    name: Option<String>,
    parent: Option<String>,
    min_ver: Option<String>,
    max_ver: Option<String>,
}

impl Scope {
    /// Scope for a property of the current node.
    fn child(&self, name: &str) -> Scope {
        Scope {
            name: Some(name.to_string()),
            parent: self.name.clone(),
            min_ver: self.min_ver.clone(),
            max_ver: self.max_ver.clone(),
        }
    }

    /// Scope for values of the current node that share its name.
    fn value(&self) -> Scope {
        Scope {
            name: self.name.clone(),
            parent: self.name.clone(),
            ..self.clone()
        }
    }

    fn reference(&self, kind: ModelKind, schema: &Value) -> Option<Reference> {
        self.name
            .as_ref()
            .map(|name| Reference::new(name.clone(), kind, content_hash(schema)))
    }
}

/// JSON-Schema to ADT parser.
#[derive(Debug, Clone, Default)]
pub struct SchemaParser {
    ignore_read_only: bool,
}

impl SchemaParser {
    /// Creates a parser keeping every property.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip `readOnly` properties (used for request bodies).
    pub fn ignore_read_only(mut self, flag: bool) -> Self {
        self.ignore_read_only = flag;
        self
    }

    /// Parses an unnamed schema.
    pub fn parse(&self, schema: &Value) -> AppResult<ParsedSchema> {
        self.parse_named(schema, None)
    }

    /// Parses a schema whose root node carries `name`.
    pub fn parse_named(&self, schema: &Value, name: Option<&str>) -> AppResult<ParsedSchema> {
        let mut models = Vec::new();
        let (min_ver, max_ver) = versions(schema);
        let scope = Scope {
            name: name.map(str::to_string),
            parent: None,
            min_ver,
            max_ver,
        };
        let root = self.parse_node(schema, &scope, &mut models)?;
        tracing::debug!(models = models.len(), "schema parsed");
        Ok(ParsedSchema { root, models })
    }

    /// Parses a fragment inside an ongoing parse, returning the embedded form.
    pub(crate) fn parse_embedded(
        &self,
        schema: &Value,
        name: Option<&str>,
        parent: Option<&str>,
        models: &mut Vec<DataType>,
    ) -> AppResult<DataType> {
        let (min_ver, max_ver) = versions(schema);
        let scope = Scope {
            name: name.map(str::to_string),
            parent: parent.map(str::to_string),
            min_ver,
            max_ver,
        };
        let node = self.parse_node(schema, &scope, models)?;
        register(node, scope.parent.as_deref(), models)
    }

    fn parse_child(
        &self,
        schema: &Value,
        scope: &Scope,
        models: &mut Vec<DataType>,
    ) -> AppResult<DataType> {
        let node = self.parse_node(schema, scope, models)?;
        register(node, scope.parent.as_deref(), models)
    }

    fn parse_node(
        &self,
        schema: &Value,
        scope: &Scope,
        models: &mut Vec<DataType>,
    ) -> AppResult<DataType> {
        let map = match schema {
            Value::Object(map) => map,
            Value::Bool(true) => return Ok(DataType::any()),
            other => {
                return Err(AppError::InvalidDocument(format!(
                    "Schema must be a mapping, got `{}`",
                    other
                )))
            }
        };

        let mut scope = scope.clone();
        let (min_ver, max_ver) = versions(schema);
        if min_ver.is_some() {
            scope.min_ver = min_ver;
        }
        if max_ver.is_some() {
            scope.max_ver = max_ver;
        }
        if let Some(sdk_name) = schema
            .pointer("/x-openstack/sdk-name")
            .and_then(Value::as_str)
        {
            scope.name = Some(sdk_name.to_string());
        }

        if map.contains_key("enum") {
            return self.parse_enum(schema, &scope, models);
        }
        for keyword in ["oneOf", "anyOf"] {
            if let Some(kinds) = map.get(keyword).and_then(Value::as_array) {
                if kinds.iter().all(is_constraint_only) {
                    let mut stripped = map.clone();
                    stripped.remove(keyword);
                    return self.parse_node(&Value::Object(stripped), &scope, models);
                }
                return self.parse_one_of(map, keyword, kinds, &scope, models);
            }
        }
        if let Some(parts) = map.get("allOf").and_then(Value::as_array) {
            let mut base = map.clone();
            base.remove("allOf");
            let mut combined = Value::Object(base);
            for part in parts {
                deep_merge(&mut combined, part);
            }
            return self.parse_node(&combined, &scope, models);
        }

        match map.get("type") {
            Some(Value::Array(types)) => self.parse_type_list(map, types, &scope, models),
            Some(Value::String(type_name)) => self.parse_typed(type_name, schema, &scope, models),
            Some(other) => Err(AppError::UnknownSchemaType(other.to_string())),
            None => {
                if OBJECT_KEYWORDS.iter().any(|k| map.contains_key(*k)) {
                    self.parse_object(map, schema, &scope, models)
                } else if map.contains_key("items") {
                    self.parse_array(map, &scope, models)
                } else {
                    Ok(DataType::any())
                }
            }
        }
    }

    fn parse_typed(
        &self,
        type_name: &str,
        schema: &Value,
        scope: &Scope,
        models: &mut Vec<DataType>,
    ) -> AppResult<DataType> {
        let map = schema.as_object().cloned().unwrap_or_default();
        match type_name {
            "object" => self.parse_object(&map, schema, scope, models),
            "array" => self.parse_array(&map, scope, models),
            "string" => Ok(DataType::Primitive(Primitive::String(PrimitiveString {
                format: str_key(&map, "format"),
                min_length: map.get("minLength").and_then(Value::as_u64),
                max_length: map.get("maxLength").and_then(Value::as_u64),
                pattern: str_key(&map, "pattern"),
            }))),
            "integer" => Ok(DataType::Primitive(Primitive::Integer(number(&map)))),
            "number" => Ok(DataType::Primitive(Primitive::Number(number(&map)))),
            "boolean" => Ok(DataType::Primitive(Primitive::Boolean)),
            "null" => Ok(DataType::Primitive(Primitive::Null)),
            other => Err(AppError::UnknownSchemaType(format!(
                "`{}` in {}",
                other, schema
            ))),
        }
    }

    fn parse_type_list(
        &self,
        map: &Map<String, Value>,
        types: &[Value],
        scope: &Scope,
        models: &mut Vec<DataType>,
    ) -> AppResult<DataType> {
        let mut names = Vec::new();
        for t in types {
            let t = t
                .as_str()
                .ok_or_else(|| AppError::UnknownSchemaType(Value::Array(types.to_vec()).to_string()))?;
            if !names.contains(&t) {
                names.push(t);
            }
        }
        let nullable = names.contains(&"null");
        let others: Vec<&str> = names.iter().copied().filter(|t| *t != "null").collect();

        let mut kinds = Vec::new();
        for t in &others {
            let mut single = map.clone();
            single.insert("type".into(), Value::String((*t).to_string()));
            let kind = self.parse_child(&Value::Object(single), scope, models)?;
            kinds.push(kind);
        }
        if others.len() == 1 && !nullable {
            return Ok(kinds.remove(0));
        }
        if others.is_empty() {
            return Ok(DataType::Primitive(Primitive::Null));
        }
        if nullable {
            kinds.push(DataType::Primitive(Primitive::Null));
        }
        let reference = if others.len() > 1 {
            scope.reference(ModelKind::OneOf, &Value::Object(map.clone()))
        } else {
            None
        };
        Ok(DataType::OneOf(OneOfType {
            reference,
            description: str_key(map, "description"),
            kinds,
            min_ver: scope.min_ver.clone(),
            max_ver: scope.max_ver.clone(),
        }))
    }

    fn parse_one_of(
        &self,
        map: &Map<String, Value>,
        keyword: &str,
        variants: &[Value],
        scope: &Scope,
        models: &mut Vec<DataType>,
    ) -> AppResult<DataType> {
        let mut base = map.clone();
        base.remove(keyword);
        if let Some(Value::Object(ext)) = base.get_mut("x-openstack") {
            ext.remove("discriminator");
        }
        let base = Value::Object(base);

        let mut kinds: Vec<DataType> = Vec::new();
        for variant in variants {
            let kind_schema = merged(&base, variant);
            let kind = self.parse_child(&kind_schema, scope, models)?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.len() == 1 {
            return Ok(kinds.remove(0));
        }
        Ok(DataType::OneOf(OneOfType {
            reference: scope.reference(ModelKind::OneOf, &Value::Object(map.clone())),
            description: str_key(map, "description"),
            kinds,
            min_ver: scope.min_ver.clone(),
            max_ver: scope.max_ver.clone(),
        }))
    }

    fn parse_enum(
        &self,
        schema: &Value,
        scope: &Scope,
        models: &mut Vec<DataType>,
    ) -> AppResult<DataType> {
        let raw = schema
            .get("enum")
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::InvalidDocument(format!("`enum` must be a list: {}", schema)))?;

        let mut nullable = schema
            .get("type")
            .and_then(Value::as_array)
            .is_some_and(|t| t.iter().any(|v| v.as_str() == Some("null")));
        let mut literals: Vec<Value> = Vec::new();
        let mut base_types = std::collections::BTreeSet::new();
        for literal in raw {
            let base = match literal {
                Value::Null => {
                    nullable = true;
                    continue;
                }
                Value::String(_) => EnumBase::String,
                Value::Bool(_) => EnumBase::Boolean,
                Value::Number(n) if n.is_i64() || n.is_u64() => EnumBase::Integer,
                Value::Number(_) => EnumBase::Number,
                other => {
                    return Err(AppError::UnsupportedSchema(format!(
                        "Enum literal `{}` is not a primitive",
                        other
                    )))
                }
            };
            if !literals.contains(literal) {
                literals.push(literal.clone());
                base_types.insert(base);
            }
        }
        if literals.is_empty() {
            return Ok(DataType::Primitive(Primitive::Null));
        }

        let node = DataType::Enum(Enum {
            reference: scope.reference(ModelKind::Enum, schema),
            description: schema
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            literals,
            base_types,
        });
        if !nullable {
            return Ok(node);
        }
        let embedded = register(node, scope.parent.as_deref(), models)?;
        Ok(DataType::OneOf(OneOfType {
            reference: None,
            description: None,
            kinds: vec![embedded, DataType::Primitive(Primitive::Null)],
            min_ver: scope.min_ver.clone(),
            max_ver: scope.max_ver.clone(),
        }))
    }

    fn parse_array(
        &self,
        map: &Map<String, Value>,
        scope: &Scope,
        models: &mut Vec<DataType>,
    ) -> AppResult<DataType> {
        let item_type = match map.get("items") {
            Some(items) => self.parse_child(items, scope, models)?,
            None => DataType::any(),
        };
        let list = ListType {
            reference: None,
            description: str_key(map, "description"),
            item_type: Box::new(item_type),
        };
        if map.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
            Ok(DataType::Set(list))
        } else {
            Ok(DataType::Array(list))
        }
    }

    fn parse_object(
        &self,
        map: &Map<String, Value>,
        schema: &Value,
        scope: &Scope,
        models: &mut Vec<DataType>,
    ) -> AppResult<DataType> {
        let description = str_key(map, "description");
        let properties = map.get("properties").and_then(Value::as_object);
        let patterns = map.get("patternProperties").and_then(Value::as_object);
        let additional = map.get("additionalProperties");

        let has_properties = properties.is_some_and(|p| !p.is_empty());
        let has_patterns = patterns.is_some_and(|p| !p.is_empty());

        if !has_properties && !has_patterns {
            return match additional {
                Some(Value::Bool(false)) => Ok(DataType::Struct(Struct {
                    reference: scope.reference(ModelKind::Struct, schema),
                    description,
                    min_ver: scope.min_ver.clone(),
                    max_ver: scope.max_ver.clone(),
                    ..Default::default()
                })),
                Some(value @ Value::Object(_)) => {
                    let value_type = self.parse_child(value, &scope.value(), models)?;
                    Ok(self.dictionary(value_type, description, scope, schema))
                }
                _ => Ok(self.dictionary(DataType::any(), description, scope, schema)),
            };
        }

        if !has_properties {
            if let Some(patterns) = patterns.filter(|p| p.len() == 1) {
                if !matches!(additional, Some(Value::Object(_))) {
                    let (_, value) = patterns.iter().next().ok_or_else(|| {
                        AppError::General("patternProperties unexpectedly empty".into())
                    })?;
                    let value_type = self.parse_child(value, &scope.value(), models)?;
                    return Ok(self.dictionary(value_type, description, scope, schema));
                }
            }
        }

        let required: Vec<&str> = map
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut fields = IndexMap::new();
        for (key, prop) in properties.into_iter().flatten() {
            if key == "additionalProperties" && prop.is_boolean() {
                continue;
            }
            if self.ignore_read_only && prop.get("readOnly").and_then(Value::as_bool) == Some(true)
            {
                continue;
            }
            let child_scope = scope.child(key);
            let data_type = self.parse_child(prop, &child_scope, models)?;
            let (min_ver, max_ver) = versions(prop);
            fields.insert(
                key.clone(),
                StructField {
                    data_type,
                    description: str_key(prop.as_object().unwrap_or(&Map::new()), "description"),
                    is_required: required.contains(&key.as_str()),
                    min_ver: min_ver.or_else(|| scope.min_ver.clone()),
                    max_ver: max_ver.or_else(|| scope.max_ver.clone()),
                },
            );
        }

        let additional_fields = match additional {
            Some(Value::Bool(true)) => Some(Box::new(DataType::any())),
            Some(value @ Value::Object(_)) => {
                Some(Box::new(self.parse_child(value, &scope.value(), models)?))
            }
            _ => None,
        };

        let mut pattern_properties = IndexMap::new();
        for (pattern, value) in patterns.into_iter().flatten() {
            let value_type = self.parse_child(value, &scope.value(), models)?;
            pattern_properties.insert(pattern.clone(), value_type);
        }

        Ok(DataType::Struct(Struct {
            reference: scope.reference(ModelKind::Struct, schema),
            description,
            fields,
            additional_fields,
            pattern_properties,
            min_ver: scope.min_ver.clone(),
            max_ver: scope.max_ver.clone(),
        }))
    }

    fn dictionary(
        &self,
        value_type: DataType,
        description: Option<String>,
        scope: &Scope,
        schema: &Value,
    ) -> DataType {
        DataType::Dictionary(Dictionary {
            reference: scope.reference(ModelKind::Dictionary, schema),
            description,
            value_type: Box::new(value_type),
        })
    }
}

/// Adds a named node to the model list (deduplicating) and returns its embedded form.
///
/// A node whose name is taken by different content is renamed `{parent}_{name}`.
/// Only one such rename exists per parent: a third distinct node with the same
/// name under the same parent (e.g. a third anonymous object kind of a `oneOf`)
/// fails with [`AppError::DuplicateTypeName`].
pub(crate) fn register(
    mut node: DataType,
    parent: Option<&str>,
    models: &mut Vec<DataType>,
) -> AppResult<DataType> {
    let Some(reference) = node.reference().cloned() else {
        return Ok(node);
    };
    if matches!(node, DataType::Reference(_)) {
        return Ok(node);
    }
    if models.iter().any(|m| m.reference() == Some(&reference)) {
        return Ok(DataType::Reference(reference));
    }

    let existing = models
        .iter()
        .filter_map(DataType::reference)
        .find(|r| r.same_slot(&reference))
        .cloned();
    let Some(existing) = existing else {
        models.push(node);
        return Ok(DataType::Reference(reference));
    };

    let duplicate = |first: &Reference, second: &Reference| AppError::DuplicateTypeName {
        name: second.name.clone(),
        first: first.to_string(),
        second: second.to_string(),
    };
    let Some(parent) = parent.filter(|p| *p != reference.name) else {
        return Err(duplicate(&existing, &reference));
    };

    let renamed = Reference::new(
        format!("{}_{}", parent, reference.name),
        reference.kind,
        reference.hash.clone(),
    );
    if models.iter().any(|m| m.reference() == Some(&renamed)) {
        return Ok(DataType::Reference(renamed));
    }
    if let Some(clash) = models
        .iter()
        .filter_map(DataType::reference)
        .find(|r| r.same_slot(&renamed))
    {
        return Err(duplicate(clash, &renamed));
    }
    node.set_reference(Some(renamed.clone()));
    models.push(node);
    Ok(DataType::Reference(renamed))
}

/// Reads `x-openstack.min-ver` / `max-ver`.
pub(crate) fn versions(schema: &Value) -> (Option<String>, Option<String>) {
    let get = |key: &str| {
        schema
            .get("x-openstack")
            .and_then(|ext| ext.get(key))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    };
    (get("min-ver"), get("max-ver"))
}

fn is_constraint_only(kind: &Value) -> bool {
    kind.as_object()
        .is_some_and(|k| k.keys().all(|key| CONSTRAINT_KEYWORDS.contains(&key.as_str())))
}

fn str_key(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn number(map: &Map<String, Value>) -> PrimitiveNumber {
    PrimitiveNumber {
        format: str_key(map, "format"),
        minimum: map.get("minimum").and_then(Value::as_f64),
        maximum: map.get("maximum").and_then(Value::as_f64),
        multiple_of: map.get("multipleOf").and_then(Value::as_f64),
    }
}

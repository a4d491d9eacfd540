#![deny(missing_docs)]

//! # Operation Binder
//!
//! Locates an operation by `operationId` and collects everything the type
//! managers need from it: merged parameters, request body variants (split by
//! microversion or action discriminators), the response resource schema, mime
//! types, response codes and the operation type.

use crate::config::{BinderConfig, OperationOverrides};
use crate::error::{AppError, AppResult};
use crate::model::adt::{DataType, ParsedSchema, RequestParameter};
use crate::model::merge::merged;
use crate::model::params::{merge_parameters, parse_parameter};
use crate::model::parser::versions;
use crate::oas::loader::Document;
use crate::oas::naming::{action_module_name, model_name, plural, resource_names_from_url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Mime type of binary payloads.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Kind of operation, driving module names and emitted templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Collection `GET`.
    List,
    /// Single resource `GET`.
    Show,
    /// `POST` creating a resource.
    Create,
    /// `PUT`/`PATCH` updating a resource.
    Set,
    /// `POST` on an action endpoint.
    Action,
    /// `DELETE`.
    Delete,
    /// Binary `GET`.
    Download,
    /// Binary `PUT`.
    Upload,
}

impl OperationType {
    /// Default module name for the operation type.
    pub fn module_name(&self) -> &'static str {
        match self {
            OperationType::List => "list",
            OperationType::Show => "get",
            OperationType::Create => "create",
            OperationType::Set => "set",
            OperationType::Action => "action",
            OperationType::Delete => "delete",
            OperationType::Download => "download",
            OperationType::Upload => "upload",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationType::List => "list",
            OperationType::Show => "show",
            OperationType::Create => "create",
            OperationType::Set => "set",
            OperationType::Action => "action",
            OperationType::Delete => "delete",
            OperationType::Download => "download",
            OperationType::Upload => "upload",
        };
        f.write_str(name)
    }
}

/// Body discriminator declared through `x-openstack.discriminator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Discriminator {
    /// One variant per microversion.
    Microversion,
    /// One variant per action name.
    Action,
}

/// One request body shape to generate a module for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyVariant {
    /// Body schema with the discriminating `oneOf` resolved.
    pub schema: Value,
    /// Microversion or action name selecting this variant.
    pub discriminator_value: Option<String>,
    /// First microversion of the variant.
    pub min_ver: Option<String>,
    /// Last microversion of the variant.
    pub max_ver: Option<String>,
}

/// Everything extracted from one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationBinding {
    /// `operationId`.
    pub operation_id: String,
    /// URL template.
    pub path: String,
    /// Lower-case HTTP method.
    pub method: String,
    /// Path-level and operation-level parameters, operation level winning.
    pub parameters: Vec<RequestParameter>,
    /// Request bodies. Empty when the operation takes no (JSON) body.
    pub request_body_variants: Vec<BodyVariant>,
    /// Discriminator that produced the variants.
    pub discriminator: Option<Discriminator>,
    /// Mime type of the request body.
    pub request_mime_type: Option<String>,
    /// Mime type of the first successful response.
    pub response_mime_type: Option<String>,
    /// Resource schema of the response (JSON only).
    pub response_schema: Option<Value>,
    /// Wrapping field the resource was found under.
    pub response_key: Option<String>,
    /// Whether the response resource is an item of a list.
    pub response_is_list: bool,
    /// Every 2xx status code declared.
    pub response_codes: Vec<String>,
    /// Inferred or overridden operation type.
    pub operation_type: OperationType,
    /// Action name for action operations.
    pub operation_name: Option<String>,
    /// Singular resource names from the URL.
    pub resource_names: Vec<String>,
}

impl OperationBinding {
    /// Singular name of the resource the operation works on.
    pub fn resource_name(&self) -> &str {
        self.resource_names
            .last()
            .map(String::as_str)
            .unwrap_or("resource")
    }

    /// Target class name: UpperCamel resource name, plural for list operations.
    pub fn target_class_name(&self) -> String {
        match self.operation_type {
            OperationType::List => model_name(&plural(self.resource_name())),
            _ => model_name(self.resource_name()),
        }
    }

    /// Module name, honouring the override.
    pub fn module_name(&self, overrides: &OperationOverrides) -> String {
        if let Some(name) = &overrides.module_name {
            return name.clone();
        }
        match (self.operation_type, &self.operation_name) {
            (OperationType::Action, Some(name)) => action_module_name(name),
            (kind, _) => kind.module_name().to_string(),
        }
    }
}

/// Resource schema located inside a response body.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSchema {
    /// The resource schema.
    pub schema: Value,
    /// Key of the wrapping property, if any.
    pub key: Option<String>,
    /// Whether the schema is the item of a list.
    pub is_list: bool,
}

/// Binds operations of one document.
#[derive(Debug, Clone)]
pub struct OperationBinder<'a> {
    doc: &'a Document,
    config: BinderConfig,
}

impl<'a> OperationBinder<'a> {
    /// Creates a binder with the built-in configuration.
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            config: BinderConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: BinderConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    /// Binds `operation_id`.
    pub fn bind(
        &self,
        operation_id: &str,
        overrides: &OperationOverrides,
    ) -> AppResult<OperationBinding> {
        let op = self.doc.find_operation(operation_id)?;
        tracing::debug!(operation_id, path = %op.path, method = %op.method, "operation located");

        let parameters = self.parameters(&op.path_item, &op.definition)?;
        let (request_mime_type, body) = request_body(&op.definition)?;
        let operation_name = overrides.operation_name.clone();

        let (request_body_variants, discriminator) = match &body {
            Some(schema) => split_body(schema, operation_name.as_deref())?,
            None => {
                if operation_name.is_some()
                    && request_mime_type.as_deref() != Some(OCTET_STREAM)
                {
                    return Err(AppError::NoRequestBody(operation_id.to_string()));
                }
                (Vec::new(), None)
            }
        };
        tracing::debug!(
            operation_id,
            variants = request_body_variants.len(),
            "request body bound"
        );

        let resource_names = resource_names_from_url(&op.path);
        let resource_name = resource_names
            .last()
            .cloned()
            .unwrap_or_else(|| "resource".to_string());
        let response = select_response(&op.definition, &resource_name, overrides)?;

        let operation_type = overrides.operation_type.unwrap_or_else(|| {
            infer_operation_type(
                &op.method,
                &op.path,
                request_mime_type.as_deref(),
                response.mime_type.as_deref(),
                response.is_list,
                operation_name.is_some(),
            )
        });

        Ok(OperationBinding {
            operation_id: operation_id.to_string(),
            path: op.path.clone(),
            method: op.method.clone(),
            parameters,
            request_body_variants,
            discriminator,
            request_mime_type,
            response_mime_type: response.mime_type,
            response_schema: response.schema,
            response_key: response.key,
            response_is_list: response.is_list,
            response_codes: response.codes,
            operation_type,
            operation_name,
            resource_names,
        })
    }

    fn parameters(&self, path_item: &Value, definition: &Value) -> AppResult<Vec<RequestParameter>> {
        let list = |v: &Value| {
            v.get("parameters")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        };
        merge_parameters(&list(path_item), &list(definition))
            .iter()
            .map(parse_parameter)
            .collect()
    }

    /// Marks fields required according to the override table.
    ///
    /// Applies to every struct (root included) whose type name has an entry.
    pub fn apply_required_overrides(&self, parsed: &mut ParsedSchema) {
        let apply = |node: &mut DataType, config: &BinderConfig| {
            if let DataType::Struct(s) = node {
                let Some(name) = s.reference.as_ref().map(|r| model_name(&r.name)) else {
                    return;
                };
                if let Some(required) = config.required_for(&name) {
                    for (key, field) in s.fields.iter_mut() {
                        if required.contains(key) {
                            field.is_required = true;
                        }
                    }
                }
            }
        };
        apply(&mut parsed.root, &self.config);
        for model in parsed.models.iter_mut() {
            apply(model, &self.config);
        }
    }
}

/// Picks the request body content.
fn request_body(definition: &Value) -> AppResult<(Option<String>, Option<Value>)> {
    let Some(content) = definition
        .pointer("/requestBody/content")
        .and_then(Value::as_object)
    else {
        return Ok((None, None));
    };
    let Some((mime, media)) = content
        .iter()
        .find(|(mime, _)| *mime == "application/json")
        .or_else(|| content.iter().find(|(mime, _)| is_json(mime)))
        .or_else(|| content.iter().find(|(mime, _)| *mime == OCTET_STREAM))
    else {
        let found: Vec<&String> = content.keys().collect();
        return Err(AppError::UnsupportedMimeType(format!("{:?}", found)));
    };
    if mime == OCTET_STREAM {
        return Ok((Some(mime.clone()), None));
    }
    let schema = media
        .get("schema")
        .cloned()
        .unwrap_or_else(|| json!({"type": "object"}));
    Ok((Some(mime.clone()), Some(schema)))
}

fn is_json(mime: &str) -> bool {
    mime.ends_with("+json") || mime.contains("json")
}

/// Splits a body into variants by its discriminator.
fn split_body(
    schema: &Value,
    operation_name: Option<&str>,
) -> AppResult<(Vec<BodyVariant>, Option<Discriminator>)> {
    let entries = schema.get("oneOf").and_then(Value::as_array);
    let declared = schema
        .pointer("/x-openstack/discriminator")
        .and_then(Value::as_str);
    let has_action_names = entries.is_some_and(|e| {
        e.iter()
            .any(|entry| entry.pointer("/x-openstack/action-name").is_some())
    });

    let discriminator = match declared {
        Some("microversion") => Some(Discriminator::Microversion),
        Some("action") => Some(Discriminator::Action),
        Some(other) => {
            return Err(AppError::UnsupportedSchema(format!(
                "Unknown body discriminator `{}`",
                other
            )))
        }
        None if operation_name.is_some() && has_action_names => Some(Discriminator::Action),
        None => None,
    };

    let (Some(discriminator), Some(entries)) = (discriminator, entries) else {
        let (min_ver, max_ver) = versions(schema);
        let variant = BodyVariant {
            schema: schema.clone(),
            discriminator_value: None,
            min_ver,
            max_ver,
        };
        return Ok((vec![variant], None));
    };

    let mut base = schema.clone();
    if let Some(map) = base.as_object_mut() {
        map.remove("oneOf");
        if let Some(Value::Object(ext)) = map.get_mut("x-openstack") {
            ext.remove("discriminator");
            if ext.is_empty() {
                map.remove("x-openstack");
            }
        }
    }
    let variant = |entry: &Value, value: Option<String>| {
        let (min_ver, max_ver) = versions(entry);
        BodyVariant {
            schema: merged(&base, entry),
            discriminator_value: value.or_else(|| min_ver.clone()),
            min_ver,
            max_ver,
        }
    };

    let variants = match discriminator {
        Discriminator::Microversion => entries.iter().map(|e| variant(e, None)).collect(),
        Discriminator::Action => {
            let name = operation_name.ok_or_else(|| {
                AppError::DiscriminatorVariantMissing(
                    "action discriminated body requires an operation name".into(),
                )
            })?;
            let selected: Vec<&Value> = entries
                .iter()
                .filter(|e| {
                    e.pointer("/x-openstack/action-name").and_then(Value::as_str) == Some(name)
                })
                .collect();
            match selected.as_slice() {
                [] => {
                    return Err(AppError::DiscriminatorVariantMissing(format!(
                        "no body variant with action-name `{}`",
                        name
                    )))
                }
                [single] => vec![variant(*single, Some(name.to_string()))],
                several => several.iter().map(|e| variant(*e, None)).collect(),
            }
        }
    };
    Ok((variants, Some(discriminator)))
}

/// Result of response selection.
#[derive(Debug, Default)]
struct ResponseSelection {
    mime_type: Option<String>,
    schema: Option<Value>,
    key: Option<String>,
    is_list: bool,
    codes: Vec<String>,
}

fn select_response(
    definition: &Value,
    resource_name: &str,
    overrides: &OperationOverrides,
) -> AppResult<ResponseSelection> {
    let responses = definition.get("responses").and_then(Value::as_object);
    let codes: Vec<String> = responses
        .map(|r| {
            r.keys()
                .filter(|code| code.starts_with('2'))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let Some(first) = codes.first() else {
        tracing::warn!(resource = resource_name, "no successful response declared, using an empty schema");
        return Ok(ResponseSelection {
            schema: Some(json!({"type": "object", "properties": {}})),
            ..Default::default()
        });
    };
    let content = responses
        .and_then(|r| r.get(first))
        .and_then(|r| r.get("content"))
        .and_then(Value::as_object);
    let Some(content) = content else {
        return Ok(ResponseSelection {
            codes,
            ..Default::default()
        });
    };

    let json_media = content
        .iter()
        .find(|(mime, _)| *mime == "application/json")
        .or_else(|| content.iter().find(|(mime, _)| is_json(mime)));
    let Some((mime, media)) = json_media else {
        let mime_type = content.keys().next().cloned();
        return Ok(ResponseSelection {
            mime_type,
            codes,
            ..Default::default()
        });
    };

    let Some(raw) = media.get("schema") else {
        tracing::warn!(resource = resource_name, "response without schema, using an empty one");
        return Ok(ResponseSelection {
            mime_type: Some(mime.clone()),
            schema: Some(json!({"type": "object", "properties": {}})),
            codes,
            ..Default::default()
        });
    };

    let mut located = match &overrides.response_key {
        Some(key) => {
            let wrapped = raw.pointer(&format!("/properties/{}", key)).ok_or_else(|| {
                AppError::InvalidDocument(format!("response has no property `{}`", key))
            })?;
            match wrapped.get("items") {
                Some(items) if wrapped.get("type") == Some(&json!("array")) => ResourceSchema {
                    schema: items.clone(),
                    key: Some(key.clone()),
                    is_list: true,
                },
                _ => ResourceSchema {
                    schema: wrapped.clone(),
                    key: Some(key.clone()),
                    is_list: false,
                },
            }
        }
        None => find_resource_schema(raw, None, resource_name).unwrap_or_else(|| ResourceSchema {
            schema: raw.clone(),
            key: None,
            is_list: false,
        }),
    };

    if let Some(item_key) = &overrides.response_list_item_key {
        if let Some(inner) = located.schema.pointer(&format!("/properties/{}", item_key)) {
            located.schema = inner.clone();
        }
    }

    Ok(ResponseSelection {
        mime_type: Some(mime.clone()),
        schema: Some(located.schema),
        key: located.key,
        is_list: located.is_list,
        codes,
    })
}

fn schema_type(schema: &Value) -> Option<String> {
    match schema.get("type") {
        Some(Value::String(t)) => return Some(t.clone()),
        Some(Value::Array(types)) => {
            return types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null")
                .map(str::to_string)
        }
        _ => {}
    }
    for keyword in ["oneOf", "allOf", "anyOf"] {
        if let Some(kinds) = schema.get(keyword).and_then(Value::as_array) {
            return kinds.iter().rev().find_map(schema_type);
        }
    }
    if schema.get("properties").is_some() {
        return Some("object".into());
    }
    None
}

/// Finds the resource schema inside a response body.
///
/// At the top level a property named after the resource wins; otherwise the
/// first nested array named after the plural resource; otherwise a single
/// object property; otherwise the body itself.
pub fn find_resource_schema(
    schema: &Value,
    parent: Option<&str>,
    resource_name: &str,
) -> Option<ResourceSchema> {
    match schema_type(schema)?.as_str() {
        "array" => {
            let items = schema.get("items")?;
            let items_are_objects = schema_type(items).as_deref() == Some("object");
            match parent {
                Some(parent) if parent == plural(resource_name) => {
                    let props = items.get("properties").and_then(Value::as_object);
                    let wrapped = props
                        .filter(|p| items_are_objects && p.len() == 1)
                        .and_then(|p| p.get(resource_name));
                    Some(ResourceSchema {
                        schema: wrapped.unwrap_or(items).clone(),
                        key: Some(parent.to_string()),
                        is_list: true,
                    })
                }
                None if items_are_objects => Some(ResourceSchema {
                    schema: items.clone(),
                    key: None,
                    is_list: true,
                }),
                _ => find_resource_schema(items, parent, resource_name),
            }
        }
        "object" => {
            let empty = serde_json::Map::new();
            let props = schema
                .get("properties")
                .and_then(Value::as_object)
                .unwrap_or(&empty);
            if parent.is_none() {
                if let Some(resource) = props.get(resource_name) {
                    let (schema, is_list) = match (schema_type(resource).as_deref(), resource.get("items")) {
                        (Some("array"), Some(items)) => (items.clone(), true),
                        _ => (resource.clone(), false),
                    };
                    return Some(ResourceSchema {
                        schema,
                        key: Some(resource_name.to_string()),
                        is_list,
                    });
                }
            }
            for (name, item) in props {
                if name == "additionalProperties" && item.is_boolean() {
                    continue;
                }
                if let Some(found) = find_resource_schema(item, Some(name), resource_name) {
                    return Some(found);
                }
            }
            if parent.is_some() {
                return None;
            }
            if props.len() == 1 {
                if let Some((key, only)) = props.iter().next() {
                    if schema_type(only).as_deref() == Some("object") {
                        return Some(ResourceSchema {
                            schema: only.clone(),
                            key: Some(key.clone()),
                            is_list: false,
                        });
                    }
                }
            }
            Some(ResourceSchema {
                schema: schema.clone(),
                key: None,
                is_list: false,
            })
        }
        _ => None,
    }
}

/// Infers the operation type from method, URL and payload kinds.
pub fn infer_operation_type(
    method: &str,
    path: &str,
    request_mime: Option<&str>,
    response_mime: Option<&str>,
    response_is_list: bool,
    has_operation_name: bool,
) -> OperationType {
    match method {
        "get" if response_mime == Some(OCTET_STREAM) => OperationType::Download,
        "get" if path.ends_with('}') => OperationType::Show,
        "get" if response_is_list => OperationType::List,
        "get" if path.ends_with("/detail") => OperationType::List,
        "get" => OperationType::Show,
        "post" if path.ends_with("/action") || has_operation_name => OperationType::Action,
        "post" => OperationType::Create,
        "put" if request_mime == Some(OCTET_STREAM) => OperationType::Upload,
        "put" | "patch" => OperationType::Set,
        "delete" => OperationType::Delete,
        _ => OperationType::Show,
    }
}

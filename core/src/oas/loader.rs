#![deny(missing_docs)]

//! # Schema Loader
//!
//! Loads an OpenAPI document (YAML or JSON) and normalizes it. Internal `$ref`s
//! are replaced with the referenced content on demand: an operation (or a
//! component) is inlined when it is requested, so downstream stages walk one
//! self-contained tree while unrelated parts of the document never fail it.
//!
//! Reference cycles reachable from the requested node are reported as
//! [`AppError::RecursiveSchema`]. Resolved references are memoised per document.

use crate::error::{AppError, AppResult};
use crate::oas::normalization::normalize_document;
use crate::oas::ref_utils::{normalize_ref_to_local, resolve_pointer};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

/// HTTP methods looked up on a path item, in lookup order.
pub const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Keys whose values are literal data and never contain schema references.
const DATA_KEYS: &[&str] = &["example", "examples", "default", "enum"];

/// A loaded, normalized OpenAPI document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Value,
    self_uri: Option<String>,
    resolved: RefCell<HashMap<String, Value>>,
}

/// One operation listed by [`Document::operations`], references not inlined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationRef<'a> {
    /// URL template, placeholders preserved.
    pub path: &'a str,
    /// Lower-case HTTP method.
    pub method: &'a str,
    /// The operation object.
    pub definition: &'a Value,
    /// The enclosing path item (holds path-level parameters).
    pub path_item: &'a Value,
}

impl<'a> OperationRef<'a> {
    /// The `operationId` of the operation, if any.
    pub fn operation_id(&self) -> Option<&'a str> {
        self.definition.get("operationId").and_then(Value::as_str)
    }
}

/// An operation with every reference it reaches inlined.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// URL template, placeholders preserved.
    pub path: String,
    /// Lower-case HTTP method.
    pub method: String,
    /// The operation object.
    pub definition: Value,
    /// The enclosing path item (holds path-level parameters).
    pub path_item: Value,
}

impl Document {
    /// Reads and loads a document from disk.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading OpenAPI document");
        Self::parse(&content)
    }

    /// Loads a document from YAML or JSON text.
    pub fn parse(content: &str) -> AppResult<Self> {
        let value: Value = serde_yaml::from_str(content)
            .map_err(|e| AppError::Parse(format!("Failed to parse OpenAPI document: {}", e)))?;
        Self::from_value(value)
    }

    /// Loads a document from an already parsed JSON value.
    pub fn from_value(mut value: Value) -> AppResult<Self> {
        if !value.is_object() {
            return Err(AppError::InvalidDocument(
                "OpenAPI document root must be a mapping".into(),
            ));
        }
        if value.get("paths").is_some_and(|p| !p.is_object()) {
            return Err(AppError::InvalidDocument("`paths` must be a mapping".into()));
        }
        let self_uri = value
            .get("$self")
            .and_then(Value::as_str)
            .map(str::to_string);

        normalize_document(&mut value);
        Ok(Self {
            root: value,
            self_uri,
            resolved: RefCell::new(HashMap::new()),
        })
    }

    /// The whole normalized document, references not inlined.
    pub fn value(&self) -> &Value {
        &self.root
    }

    /// `$self` URI of the document.
    pub fn self_uri(&self) -> Option<&str> {
        self.self_uri.as_deref()
    }

    /// `info.title`.
    pub fn title(&self) -> Option<&str> {
        self.root.pointer("/info/title").and_then(Value::as_str)
    }

    /// `components[section][name]` (e.g. `schemas`, `parameters`) with its references inlined.
    pub fn component(&self, section: &str, name: &str) -> AppResult<Option<Value>> {
        let raw = self
            .root
            .get("components")
            .and_then(|c| c.get(section))
            .and_then(|s| s.get(name));
        raw.map(|node| self.inline(node)).transpose()
    }

    /// Every operation of the document in path order.
    pub fn operations(&self) -> Vec<OperationRef<'_>> {
        let Some(paths) = self.root.get("paths").and_then(Value::as_object) else {
            return Vec::new();
        };
        paths
            .iter()
            .flat_map(|(path, item)| {
                HTTP_METHODS.iter().filter_map(move |method| {
                    item.get(*method).map(|definition| OperationRef {
                        path: path.as_str(),
                        method: *method,
                        definition,
                        path_item: item,
                    })
                })
            })
            .collect()
    }

    /// Locates the operation carrying `operation_id` and inlines what it references.
    pub fn find_operation(&self, operation_id: &str) -> AppResult<Operation> {
        let op = self
            .operations()
            .into_iter()
            .find(|op| op.operation_id() == Some(operation_id))
            .ok_or_else(|| AppError::OperationNotFound(operation_id.to_string()))?;

        // Sibling operations of the path item are not part of this operation.
        let mut path_item = Map::new();
        if let Some(item) = op.path_item.as_object() {
            for (key, value) in item {
                if !HTTP_METHODS.contains(&key.as_str()) {
                    path_item.insert(key.clone(), self.inline(value)?);
                }
            }
        }
        Ok(Operation {
            path: op.path.to_string(),
            method: op.method.to_string(),
            definition: self.inline(op.definition)?,
            path_item: Value::Object(path_item),
        })
    }

    fn inline(&self, node: &Value) -> AppResult<Value> {
        let mut resolved = self.resolved.borrow_mut();
        Inliner::new(&self.root, self.self_uri.as_deref(), &mut resolved).inline(node)
    }
}

/// Recursive `$ref` expansion with memoisation and cycle detection.
struct Inliner<'a> {
    root: &'a Value,
    self_uri: Option<&'a str>,
    stack: Vec<String>,
    resolved: &'a mut HashMap<String, Value>,
}

impl<'a> Inliner<'a> {
    fn new(
        root: &'a Value,
        self_uri: Option<&'a str>,
        resolved: &'a mut HashMap<String, Value>,
    ) -> Self {
        Self {
            root,
            self_uri,
            stack: Vec::new(),
            resolved,
        }
    }

    fn inline(&mut self, node: &Value) -> AppResult<Value> {
        match node {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.inline_reference(reference, map);
                }
                let mut out = Map::new();
                for (key, value) in map {
                    let value = if DATA_KEYS.contains(&key.as_str()) {
                        value.clone()
                    } else {
                        self.inline(value)?
                    };
                    out.insert(key.clone(), value);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.inline(item))
                .collect::<AppResult<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn inline_reference(&mut self, reference: &str, node: &Map<String, Value>) -> AppResult<Value> {
        let local = normalize_ref_to_local(reference, self.self_uri)
            .ok_or_else(|| AppError::UnresolvedRef(reference.to_string()))?;

        if self.stack.contains(&local) {
            let mut chain = self.stack.clone();
            chain.push(local);
            return Err(AppError::RecursiveSchema(chain.join(" -> ")));
        }

        let mut target = match self.resolved.get(&local) {
            Some(done) => done.clone(),
            None => {
                let raw = resolve_pointer(self.root, &local)
                    .ok_or_else(|| AppError::UnresolvedRef(reference.to_string()))?;
                self.stack.push(local.clone());
                let done = self.inline(raw);
                self.stack.pop();
                let done = done?;
                self.resolved.insert(local, done.clone());
                done
            }
        };

        // Sibling keywords next to `$ref` refine the target.
        let siblings: Vec<(&String, &Value)> = node.iter().filter(|(k, _)| *k != "$ref").collect();
        if !siblings.is_empty() {
            if let Value::Object(target_map) = &mut target {
                for (key, value) in siblings {
                    let value = self.inline(value)?;
                    target_map.insert(key.clone(), value);
                }
            }
        }
        Ok(target)
    }
}

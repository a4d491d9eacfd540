#![deny(missing_docs)]

//! # Emitter Contract
//!
//! Everything a template renderer receives for one operation variant.
//!
//! - [`OperationContext`]: names, paths, HTTP details and flags of the operation.
//! - [`TypesSnapshot`]: a serialisable view of a [`TypeManager`] (root, subtypes,
//!   parameters, imports, lifetimes) with every type hint resolved to a string.
//! - [`render_declarations`]: a Rust preview of the snapshot, checked with
//!   `ra_ap_syntax` so broken type strings surface before templating.
//! - [`ModTree`]: `mod.rs` aggregation for the generated module paths.

use crate::error::{AppError, AppResult};
use crate::model::adt::ParameterLocation;
use crate::oas::binder::OperationType;
use crate::types::{
    CompoundType, Dialect, SetterKind, StructField, TargetDialect, TargetParameter,
    TypeGraph, TypeManager,
};
use ra_ap_edition::Edition;
use ra_ap_syntax::SourceFile;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A struct field (or flag group member) with its type resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSnapshot {
    /// Rust identifier.
    pub local_name: String,
    /// Wire name.
    pub remote_name: String,
    /// Type as written in the declaration.
    pub type_hint: String,
    /// Description.
    pub description: Option<String>,
    /// Not listed as required.
    pub is_optional: bool,
    /// Accepts `null`.
    pub is_nullable: bool,
    /// Attribute contents.
    pub macros: Vec<String>,
    /// First microversion.
    pub min_ver: Option<String>,
    /// Last microversion.
    pub max_ver: Option<String>,
    /// Name of the schema the type was collapsed from.
    pub original: Option<String>,
}

/// An enum variant, string enum literal set, or flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantSnapshot {
    /// Rust identifier.
    pub name: String,
    /// Payload type of untagged variants.
    pub type_hint: Option<String>,
    /// Literals (canonical first) of string enum variants and flags.
    pub literals: Vec<String>,
    /// Attribute contents.
    pub macros: Vec<String>,
}

/// A compound type ready for templating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeSnapshot {
    /// Type name.
    pub name: String,
    /// `struct`, `enum`, `string_enum` or `flag_group`.
    pub kind: &'static str,
    /// Description.
    pub description: Option<String>,
    /// Derive list.
    pub derives: Vec<String>,
    /// Container attribute contents.
    pub macros: Vec<String>,
    /// Lifetime parameters of the declaration.
    pub lifetimes: Vec<String>,
    /// Struct fields, or the list alternative of a flag group.
    pub fields: Vec<FieldSnapshot>,
    /// Enum variants or flags.
    pub variants: Vec<VariantSnapshot>,
    /// Type of the flattened extra properties map.
    pub additional_fields: Option<String>,
    /// SDK enum a flag group translates into.
    pub sdk_enum_name: Option<String>,
}

/// A parameter ready for templating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSnapshot {
    /// Rust identifier.
    pub local_name: String,
    /// Wire name.
    pub remote_name: String,
    /// Location.
    pub location: ParameterLocation,
    /// Type as written in the declaration.
    pub type_hint: String,
    /// Description.
    pub description: Option<String>,
    /// Mandatory parameter.
    pub is_required: bool,
    /// Presence-only boolean.
    pub is_flag: bool,
    /// Custom builder setter name.
    pub setter_name: Option<String>,
    /// Custom builder setter flavour.
    pub setter_type: Option<SetterKind>,
    /// Attribute contents.
    pub macros: Vec<String>,
    /// First microversion.
    pub min_ver: Option<String>,
    /// Last microversion.
    pub max_ver: Option<String>,
}

/// Serialisable view of a type manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypesSnapshot {
    /// Dialect the types were produced for.
    pub dialect: TargetDialect,
    /// Type of the whole body.
    pub root_type: String,
    /// The root declaration, when the body is a named type.
    pub root: Option<TypeSnapshot>,
    /// Every other declaration, dependencies first.
    pub subtypes: Vec<TypeSnapshot>,
    /// Parameters in declaration order.
    pub parameters: Vec<ParameterSnapshot>,
    /// `use` paths.
    pub imports: Vec<String>,
    /// Lifetime parameters of the request.
    pub lifetimes: Vec<String>,
    /// Models dropped by simplification.
    pub ignored_models: Vec<String>,
}

impl TypesSnapshot {
    /// Captures `manager`, checking every type hint parses as a Rust type.
    pub fn capture<D: Dialect>(manager: &TypeManager<D>) -> AppResult<Self> {
        let graph = manager.graph();
        let root_type = manager.type_hint(manager.get_root_data_type());
        validate_type_hint(&root_type)?;

        let root = manager
            .root_compound()
            .map(|c| snapshot_compound(c, graph))
            .transpose()?;
        let subtypes = manager
            .get_subtypes()
            .into_iter()
            .map(|c| snapshot_compound(c, graph))
            .collect::<AppResult<Vec<_>>>()?;
        let parameters = manager
            .get_parameters(None)
            .into_iter()
            .map(|p| snapshot_parameter(p, graph))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            dialect: manager.dialect().target(),
            root_type,
            root,
            subtypes,
            parameters,
            imports: manager.get_imports().into_iter().collect(),
            lifetimes: manager.get_lifetimes().into_iter().collect(),
            ignored_models: manager.ignored_models().map(|r| r.to_string()).collect(),
        })
    }

    /// All declarations, root first.
    pub fn declarations(&self) -> impl Iterator<Item = &TypeSnapshot> {
        self.root.iter().chain(self.subtypes.iter())
    }
}

fn compound_lifetimes(compound: &CompoundType, graph: &TypeGraph) -> Vec<String> {
    let mut lifetimes = BTreeSet::new();
    for t in compound.member_types() {
        lifetimes.extend(t.lifetimes(graph));
    }
    lifetimes.into_iter().collect()
}

fn snapshot_field(field: &StructField, graph: &TypeGraph) -> AppResult<FieldSnapshot> {
    let type_hint = field.type_hint(graph);
    validate_type_hint(&type_hint)?;
    Ok(FieldSnapshot {
        local_name: field.local_name.clone(),
        remote_name: field.remote_name.clone(),
        type_hint,
        description: field.description.clone(),
        is_optional: field.is_optional,
        is_nullable: field.is_nullable,
        macros: field.macros.clone(),
        min_ver: field.min_ver.clone(),
        max_ver: field.max_ver.clone(),
        original: field.original.as_ref().map(|r| r.name.clone()),
    })
}

fn snapshot_compound(compound: &CompoundType, graph: &TypeGraph) -> AppResult<TypeSnapshot> {
    let mut snapshot = TypeSnapshot {
        name: compound.name().to_string(),
        kind: "struct",
        description: compound.description().map(str::to_string),
        derives: compound.derives().to_vec(),
        macros: compound.macros().to_vec(),
        lifetimes: compound_lifetimes(compound, graph),
        fields: Vec::new(),
        variants: Vec::new(),
        additional_fields: None,
        sdk_enum_name: None,
    };
    match compound {
        CompoundType::Struct(s) => {
            snapshot.fields = s
                .fields
                .values()
                .map(|f| snapshot_field(f, graph))
                .collect::<AppResult<_>>()?;
            snapshot.additional_fields = s.additional_fields.as_ref().map(|t| t.type_hint(graph));
        }
        CompoundType::Enum(e) => {
            snapshot.kind = "enum";
            for (name, variant) in &e.variants {
                let type_hint = variant.data_type.type_hint(graph);
                validate_type_hint(&type_hint)?;
                snapshot.variants.push(VariantSnapshot {
                    name: name.clone(),
                    type_hint: Some(type_hint),
                    literals: Vec::new(),
                    macros: Vec::new(),
                });
            }
        }
        CompoundType::StringEnum(e) => {
            snapshot.kind = "string_enum";
            let serde = e.derives.iter().any(|d| d == "Serialize");
            for (name, literals) in &e.variants {
                let mut macros = Vec::new();
                if serde {
                    if let Some((first, aliases)) = literals.split_first() {
                        macros.push(format!("serde(rename = \"{}\")", first));
                        for alias in aliases {
                            macros.push(format!("serde(alias = \"{}\")", alias));
                        }
                    }
                } else if let Some(first) = literals.first() {
                    macros.push(format!("value(name = \"{}\")", first));
                }
                snapshot.variants.push(VariantSnapshot {
                    name: name.clone(),
                    type_hint: None,
                    literals: literals.clone(),
                    macros,
                });
            }
        }
        CompoundType::FlagGroup(g) => {
            snapshot.kind = "flag_group";
            snapshot.sdk_enum_name = Some(g.sdk_enum_name.clone());
            snapshot.variants = g
                .flags
                .iter()
                .map(|f| VariantSnapshot {
                    name: f.local_name.clone(),
                    type_hint: Some("bool".to_string()),
                    literals: vec![f.literal.clone(), f.sdk_value.clone()],
                    macros: f.macros.clone(),
                })
                .collect();
            snapshot.fields = g
                .list_field
                .iter()
                .map(|f| snapshot_field(f, graph))
                .collect::<AppResult<_>>()?;
        }
    }
    Ok(snapshot)
}

fn snapshot_parameter(param: &TargetParameter, graph: &TypeGraph) -> AppResult<ParameterSnapshot> {
    let type_hint = param.type_hint(graph);
    validate_type_hint(&type_hint)?;
    Ok(ParameterSnapshot {
        local_name: param.local_name.clone(),
        remote_name: param.remote_name.clone(),
        location: param.location,
        type_hint,
        description: param.description.clone(),
        is_required: param.is_required,
        is_flag: param.is_flag,
        setter_name: param.setter_name.clone(),
        setter_type: param.setter_type,
        macros: param.macros.clone(),
        min_ver: param.min_ver.clone(),
        max_ver: param.max_ver.clone(),
    })
}

/// Checks that `ty` parses as a Rust type.
pub fn validate_type_hint(ty: &str) -> AppResult<()> {
    // Parse the type within a field of a dummy struct
    let wrapper_code = format!("struct Wrapper<'a> {{\n    f: {},\n}}", ty);
    let parse = SourceFile::parse(&wrapper_code, Edition::Edition2021);
    if !parse.errors().is_empty() {
        let errs: Vec<String> = parse.errors().into_iter().map(|e| e.to_string()).collect();
        return Err(AppError::General(format!(
            "Invalid type `{}`: {}",
            ty,
            errs.join(", ")
        )));
    }
    Ok(())
}

/// Everything a template receives for one operation variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationContext {
    /// `operationId` in the document.
    pub operation_id: String,
    /// Target class name (`Server`, `Servers` for lists).
    pub target_class_name: String,
    /// Service name (module root).
    pub service_name: String,
    /// Module name of the generated file (microversion suffixed for variants).
    pub module_name: String,
    /// Module path segments without the module itself (`compute/v2/server`).
    pub module_path: String,
    /// Operation type.
    pub operation_type: OperationType,
    /// Action selector.
    pub operation_name: Option<String>,
    /// CLI command name.
    pub command_name: Option<String>,
    /// HTTP method (lowercase).
    pub method: String,
    /// URL template.
    pub url: String,
    /// Successful response codes.
    pub response_codes: Vec<String>,
    /// Request body mime type.
    pub request_mime_type: Option<String>,
    /// Response body mime type.
    pub response_mime_type: Option<String>,
    /// Wrapping key of the response resource.
    pub response_key: Option<String>,
    /// Per-item wrapper inside list responses.
    pub response_list_item_key: Option<String>,
    /// Whether the response is a list of resources.
    pub response_is_list: bool,
    /// `limit` and `marker` query parameters on a list.
    pub is_paginated: bool,
    /// A list operation exposing a `name` query parameter.
    pub find_by_name_available: bool,
    /// Any header parameter present.
    pub has_header_params: bool,
    /// Microversion the body variant was introduced in.
    pub microversion: Option<String>,
    /// Microversion header the operation accepts.
    pub microversion_header: Option<String>,
    /// Output dialect.
    pub dialect: TargetDialect,
    /// Request types.
    pub types: TypesSnapshot,
    /// Response types (CLI only).
    pub response_types: Option<TypesSnapshot>,
}

impl OperationContext {
    /// Module path including the module itself.
    pub fn full_module_path(&self) -> String {
        if self.module_path.is_empty() {
            self.module_name.clone()
        } else {
            format!("{}/{}", self.module_path, self.module_name)
        }
    }

    /// Rust declaration preview of request (and response) types.
    pub fn preview(&self) -> AppResult<String> {
        let mut code = render_declarations(&self.types);
        if let Some(response) = &self.response_types {
            code.push('\n');
            code.push_str(&render_declarations(response));
        }
        validate_source(&code)?;
        Ok(code)
    }
}

/// Helper to generate documentation lines.
fn generate_doc_comment(description: Option<&str>, indent: &str) -> String {
    let mut code = String::new();
    if let Some(desc) = description {
        for line in desc.lines() {
            code.push_str(&format!("{}/// {}\n", indent, line.trim()));
        }
    }
    code
}

fn generics(lifetimes: &[String]) -> String {
    if lifetimes.is_empty() {
        String::new()
    } else {
        format!("<{}>", lifetimes.join(", "))
    }
}

fn push_attributes(code: &mut String, derives: &[String], macros: &[String], indent: &str) {
    if !derives.is_empty() {
        code.push_str(&format!("{}#[derive({})]\n", indent, derives.join(", ")));
    }
    for m in macros {
        code.push_str(&format!("{}#[{}]\n", indent, m));
    }
}

fn push_field(code: &mut String, field: &FieldSnapshot) {
    code.push_str(&generate_doc_comment(field.description.as_deref(), "    "));
    push_attributes(code, &[], &field.macros, "    ");
    code.push_str(&format!(
        "    pub(crate) {}: {},\n",
        field.local_name, field.type_hint
    ));
}

/// Renders the declarations of a snapshot as Rust source.
pub fn render_declarations(snapshot: &TypesSnapshot) -> String {
    let mut code = String::new();
    for import in &snapshot.imports {
        code.push_str(&format!("use {};\n", import));
    }
    if !snapshot.imports.is_empty() {
        code.push('\n');
    }

    for (i, decl) in snapshot.declarations().enumerate() {
        if i > 0 {
            code.push('\n');
        }
        code.push_str(&generate_doc_comment(decl.description.as_deref(), ""));
        push_attributes(&mut code, &decl.derives, &decl.macros, "");
        let generics = generics(&decl.lifetimes);
        match decl.kind {
            "enum" | "string_enum" => {
                code.push_str(&format!("pub enum {}{} {{\n", decl.name, generics));
                for variant in &decl.variants {
                    push_attributes(&mut code, &[], &variant.macros, "    ");
                    match (&variant.type_hint, decl.kind) {
                        (Some(ty), "enum") => {
                            code.push_str(&format!("    {}({}),\n", variant.name, ty))
                        }
                        _ => code.push_str(&format!("    {},\n", variant.name)),
                    }
                }
            }
            _ => {
                code.push_str(&format!("pub struct {}{} {{\n", decl.name, generics));
                for variant in decl.variants.iter().filter(|_| decl.kind == "flag_group") {
                    push_attributes(&mut code, &[], &variant.macros, "    ");
                    code.push_str(&format!("    {}: bool,\n", variant.name));
                }
                for field in &decl.fields {
                    push_field(&mut code, field);
                }
                if let Some(extra) = &decl.additional_fields {
                    if snapshot.dialect == TargetDialect::Sdk {
                        code.push_str("    #[serde(flatten)]\n");
                        code.push_str(
                            "    #[builder(default, private, setter(name = \"_properties\"))]\n",
                        );
                    }
                    code.push_str(&format!("    pub(crate) _properties: {},\n", extra));
                }
            }
        }
        code.push_str("}\n");
    }
    code
}

/// Checks that `code` parses as a Rust source file.
pub fn validate_source(code: &str) -> AppResult<()> {
    let parse = SourceFile::parse(code, Edition::Edition2021);
    if !parse.errors().is_empty() {
        let errs: Vec<String> = parse.errors().into_iter().map(|e| e.to_string()).collect();
        return Err(AppError::General(format!(
            "Generated declarations do not parse: {}",
            errs.join(", ")
        )));
    }
    Ok(())
}

/// Aggregates generated module paths into `mod.rs` files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModTree {
    children: BTreeMap<String, BTreeSet<String>>,
}

impl ModTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a `/` separated module path (`compute/v2/server/create`).
    pub fn register(&mut self, path: &str) {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for depth in 0..segments.len() {
            let dir = segments[..depth].join("/");
            self.children
                .entry(dir)
                .or_default()
                .insert(segments[depth].to_string());
        }
    }

    /// One `mod.rs` per directory, keyed by the directory (`""` is the root).
    pub fn render(&self) -> BTreeMap<String, String> {
        self.children
            .iter()
            .map(|(dir, modules)| {
                let mut code = String::new();
                for module in modules {
                    code.push_str(&format!("pub mod {};\n", module));
                }
                (dir.clone(), code)
            })
            .collect()
    }

    /// Whether nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

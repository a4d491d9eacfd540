//! # CLI Dialects
//!
//! [`CliDialect`] converts request bodies and parameters into `clap` argument
//! structs with owned types. [`CliResponseDialect`] converts response bodies
//! into flat `StructTable` rows.

use crate::model::adt::{ModelKind, ParameterLocation};
use crate::types::{
    CompoundType, Dialect, ListShape, MultiKindStrategy, RustType, StructField, TargetDialect,
    TargetParameter, TypeGraph,
};

/// Fields printed in every table view.
const BASIC_FIELDS: &[&str] = &["id", "name", "created_at", "updated_at"];

/// Fields shown by default in structs without an `id`.
const DEFAULT_COLUMNS: usize = 10;

/// `clap` request dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliDialect;

/// Response table dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliResponseDialect;

/// Collapses numeric-or-string unions shared by both CLI dialects.
fn simplify_scalars(a: ModelKind, b: ModelKind) -> Option<RustType> {
    use ModelKind::*;
    match (a, b) {
        (String, Number) | (Number, String) => Some(RustType::NumString),
        (String, Integer) | (Integer, String) => Some(RustType::IntString),
        (String, Boolean) | (Boolean, String) => Some(RustType::String),
        (String, Dictionary) | (Dictionary, String) => Some(RustType::JsonValue),
        _ => None,
    }
}

fn help_heading(location: ParameterLocation) -> &'static str {
    match location {
        ParameterLocation::Path => "Path parameters",
        ParameterLocation::Query => "Query parameters",
        ParameterLocation::Header => "Header parameters",
        ParameterLocation::Cookie => "Cookie parameters",
    }
}

/// `arg(...)` contents for a value of type `t`.
fn arg_parts(t: &RustType, graph: &TypeGraph) -> Vec<String> {
    let mut parts = Vec::new();
    match t {
        RustType::Vec(item) => {
            parts.push("action=clap::ArgAction::Append".to_string());
            parts.extend(arg_parts(item, graph).into_iter().filter(|p| !p.starts_with("action")));
        }
        RustType::KeyValueVec(value) => {
            parts.push("action=clap::ArgAction::Append".to_string());
            parts.push("value_name=\"key=value\"".to_string());
            parts.push(format!(
                "value_parser=parse_key_val::<String, {}>",
                value.type_hint(graph)
            ));
        }
        RustType::BooleanFlag => parts.push("action=clap::ArgAction::SetTrue".to_string()),
        RustType::Bool => parts.push("action=clap::ArgAction::Set".to_string()),
        RustType::JsonValue => {
            parts.push("value_name=\"JSON\"".to_string());
            parts.push("value_parser=crate::common::parse_json".to_string());
        }
        RustType::Named(r) => {
            if let Some(CompoundType::StringEnum(_)) = graph.compounds.get(r) {
                parts.push("value_enum".to_string());
            }
        }
        _ => {}
    }
    parts
}

fn is_flattened(t: &RustType, graph: &TypeGraph) -> bool {
    matches!(
        t.named().and_then(|r| graph.compounds.get(r)),
        Some(CompoundType::Struct(_)) | Some(CompoundType::FlagGroup(_))
    )
}

fn body_field_macros(field: &StructField, graph: &TypeGraph) -> Vec<String> {
    if is_flattened(&field.data_type, graph) {
        return vec!["command(flatten)".to_string()];
    }
    let mut parts = vec![
        "help_heading = \"Body parameters\"".to_string(),
        "long".to_string(),
    ];
    parts.extend(arg_parts(&field.data_type, graph));
    vec![format!("arg({})", parts.join(", "))]
}

impl Dialect for CliDialect {
    fn target(&self) -> TargetDialect {
        TargetDialect::Cli
    }

    fn string(&self) -> RustType {
        RustType::String
    }

    fn boolean_parameter(&self, _is_flag: bool) -> RustType {
        RustType::BooleanFlag
    }

    fn dictionary(&self, value: RustType) -> RustType {
        RustType::KeyValueVec(Box::new(value))
    }

    fn list(&self, shape: ListShape<'_>) -> (RustType, bool) {
        if shape.item_struct_fields.is_some_and(|n| n > 1) {
            return (RustType::Vec(Box::new(RustType::JsonValue)), true);
        }
        if shape.item.is_list() || matches!(shape.item, RustType::KeyValueVec(_)) {
            return (RustType::Vec(Box::new(RustType::JsonValue)), false);
        }
        (RustType::Vec(Box::new(shape.item)), false)
    }

    fn simplify_pair(
        &self,
        a: (ModelKind, &RustType),
        b: (ModelKind, &RustType),
    ) -> Option<(RustType, bool)> {
        simplify_scalars(a.0, b.0).map(|t| (t, false))
    }

    fn multi_kind(&self, kinds: &[RustType], graph: &TypeGraph) -> MultiKindStrategy {
        let has_string_enum = kinds.iter().any(|k| {
            matches!(
                k.named().and_then(|r| graph.compounds.get(r)),
                Some(CompoundType::StringEnum(_))
            )
        });
        let has_list = kinds.iter().any(RustType::is_list);
        if has_string_enum && has_list {
            MultiKindStrategy::FlagGroup
        } else {
            MultiKindStrategy::JsonValue
        }
    }

    fn flattens_single_field_structs(&self) -> bool {
        true
    }

    fn decorate(&self, compound: &mut CompoundType, graph: &TypeGraph, _is_root: bool) {
        match compound {
            CompoundType::Struct(s) => {
                s.derives = vec!["Args".into(), "Clone".into()];
                s.macros = Vec::new();
                for field in s.fields.values_mut() {
                    field.macros = body_field_macros(field, graph);
                }
            }
            CompoundType::StringEnum(e) => {
                e.derives = ["Clone", "Eq", "Ord", "PartialEq", "PartialOrd", "ValueEnum"]
                    .map(String::from)
                    .to_vec();
                e.macros = Vec::new();
            }
            CompoundType::FlagGroup(g) => {
                g.derives = vec!["Args".into(), "Clone".into()];
                g.macros = vec!["group(required = false, multiple = false)".to_string()];
                for flag in g.flags.iter_mut() {
                    flag.macros = vec![
                        "arg(action=clap::ArgAction::SetTrue, help_heading = \"Body parameters\", long)"
                            .to_string(),
                    ];
                }
                if let Some(list) = g.list_field.as_mut() {
                    list.macros = body_field_macros(list, graph);
                }
            }
            CompoundType::Enum(e) => {
                e.derives = vec!["Clone".into(), "Debug".into()];
                e.macros = Vec::new();
            }
        }
    }

    fn decorate_parameter(&self, param: &mut TargetParameter, graph: &TypeGraph) {
        let mut parts = vec![format!("help_heading = \"{}\"", help_heading(param.location))];
        if param.location == ParameterLocation::Path {
            parts.push(format!("id = \"path_param_{}\"", param.remote_name));
            parts.push(format!(
                "value_name = \"{}\"",
                param.remote_name.to_uppercase()
            ));
        } else {
            parts.push("long".to_string());
        }
        parts.extend(arg_parts(&param.data_type, graph));
        param.macros = vec![format!("arg({})", parts.join(", "))];
    }

    fn compound_imports(&self, compound: &CompoundType) -> Vec<&'static str> {
        match compound {
            CompoundType::Struct(_) | CompoundType::FlagGroup(_) => vec!["clap::Args"],
            CompoundType::StringEnum(_) => vec!["clap::ValueEnum"],
            CompoundType::Enum(_) => Vec::new(),
        }
    }
}

impl Dialect for CliResponseDialect {
    fn target(&self) -> TargetDialect {
        TargetDialect::Cli
    }

    fn root_name(&self) -> &'static str {
        "Response"
    }

    fn name_prefix(&self) -> &'static str {
        "Response"
    }

    fn string(&self) -> RustType {
        RustType::String
    }

    fn dictionary(&self, _value: RustType) -> RustType {
        RustType::JsonValue
    }

    fn list(&self, shape: ListShape<'_>) -> (RustType, bool) {
        if shape.field_name == Some("links") {
            return (RustType::JsonValue, false);
        }
        match shape.item {
            RustType::String => (RustType::VecString, false),
            _ => (RustType::JsonValue, shape.item_struct_fields.is_some()),
        }
    }

    fn simplify_pair(
        &self,
        a: (ModelKind, &RustType),
        b: (ModelKind, &RustType),
    ) -> Option<(RustType, bool)> {
        match (a, b) {
            ((ModelKind::String, _), (_, RustType::VecString))
            | ((_, RustType::VecString), (ModelKind::String, _)) => {
                Some((RustType::VecString, false))
            }
            _ => simplify_scalars(a.0, b.0).map(|t| (t, false)),
        }
    }

    fn multi_kind(&self, _kinds: &[RustType], _graph: &TypeGraph) -> MultiKindStrategy {
        MultiKindStrategy::JsonValue
    }

    fn keeps_string_enums(&self) -> bool {
        false
    }

    fn keeps_nested_structs(&self) -> bool {
        false
    }

    fn decorate(&self, compound: &mut CompoundType, _graph: &TypeGraph, _is_root: bool) {
        let CompoundType::Struct(s) = compound else {
            return;
        };
        s.derives = ["Clone", "Deserialize", "Serialize", "StructTable"]
            .map(String::from)
            .to_vec();
        s.macros = Vec::new();
        let has_id = s.fields.contains_key("id");
        for (idx, field) in s.fields.values_mut().enumerate() {
            let mut table = Vec::new();
            let mut macros = Vec::new();
            if field.is_optional || field.is_nullable {
                table.push("optional".to_string());
                macros.push("serde(default)".to_string());
            }
            if field.local_name != field.remote_name {
                macros.push(format!("serde(rename = \"{}\")", field.remote_name));
                table.push(format!("title = \"{}\"", field.remote_name));
            }
            if field.data_type == RustType::JsonValue {
                table.push("pretty".to_string());
            }
            let basic = BASIC_FIELDS.contains(&field.remote_name.as_str());
            if !basic && (has_id || idx >= DEFAULT_COLUMNS) {
                table.push("wide".to_string());
            }
            if !table.is_empty() {
                macros.push(format!("structable({})", table.join(", ")));
            }
            field.macros = macros;
        }
    }

    fn decorate_parameter(&self, param: &mut TargetParameter, _graph: &TypeGraph) {
        param.macros = Vec::new();
    }

    fn compound_imports(&self, compound: &CompoundType) -> Vec<&'static str> {
        match compound {
            CompoundType::Struct(_) => vec![
                "serde::Deserialize",
                "serde::Serialize",
                "structable_derive::StructTable",
            ],
            _ => Vec::new(),
        }
    }
}

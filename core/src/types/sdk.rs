//! # SDK Dialect
//!
//! Request builders for the SDK crate: `derive_builder` structs over borrowed
//! strings, serialized with serde.

use crate::model::adt::ModelKind;
use crate::types::{
    CompoundType, Dialect, ListKind, ListShape, MultiKindStrategy, RustType, SetterKind,
    TargetDialect, TargetParameter, TypeGraph,
};

/// Borrowed strings, builders, serde.
#[derive(Debug, Clone, Copy, Default)]
pub struct SdkDialect;

const SERDE_DERIVES: &[&str] = &["Debug", "Deserialize", "Clone", "Serialize"];

impl Dialect for SdkDialect {
    fn target(&self) -> TargetDialect {
        TargetDialect::Sdk
    }

    fn string(&self) -> RustType {
        RustType::BorrowedStr
    }

    fn dictionary(&self, value: RustType) -> RustType {
        RustType::BTreeMap(Box::new(RustType::BorrowedStr), Box::new(value))
    }

    fn list(&self, shape: ListShape<'_>) -> (RustType, bool) {
        let item = Box::new(shape.item);
        let converted = match shape.kind {
            ListKind::Array => RustType::Vec(item),
            ListKind::Set => RustType::BTreeSet(item),
            ListKind::CommaSeparatedList => RustType::CommaSeparatedList(item),
        };
        (converted, false)
    }

    fn simplify_pair(
        &self,
        a: (ModelKind, &RustType),
        b: (ModelKind, &RustType),
    ) -> Option<(RustType, bool)> {
        use ModelKind::*;
        match (a.0, b.0) {
            (String, Number) | (Number, String) | (String, Integer) | (Integer, String) => {
                Some((self.string(), false))
            }
            (String, Boolean) | (Boolean, String) => Some((RustType::Bool, false)),
            (String, Dictionary) | (Dictionary, String) => Some((RustType::JsonValue, true)),
            _ => None,
        }
    }

    fn multi_kind(&self, _kinds: &[RustType], _graph: &TypeGraph) -> MultiKindStrategy {
        MultiKindStrategy::Enum
    }

    fn decorate(&self, compound: &mut CompoundType, _graph: &TypeGraph, _is_root: bool) {
        match compound {
            CompoundType::Struct(s) => {
                s.derives = ["Builder", "Debug", "Deserialize", "Clone", "Serialize"]
                    .map(String::from)
                    .to_vec();
                s.macros = vec!["builder(setter(strip_option))".to_string()];
                for field in s.fields.values_mut() {
                    let mut macros = Vec::new();
                    if field.local_name != field.remote_name {
                        macros.push(format!("serde(rename = \"{}\")", field.remote_name));
                    }
                    if field.is_optional {
                        macros.push("serde(skip_serializing_if = \"Option::is_none\")".into());
                    }
                    let default = if field.is_optional { "default, " } else { "" };
                    if matches!(field.data_type, RustType::BTreeMap(..)) {
                        macros.push(format!(
                            "builder({}private, setter(name = \"_{}\"))",
                            default, field.local_name
                        ));
                    } else {
                        macros.push(format!("builder({}setter(into))", default));
                    }
                    field.macros = macros;
                }
            }
            CompoundType::Enum(e) => {
                e.derives = SERDE_DERIVES.iter().map(|d| d.to_string()).collect();
                e.macros = vec!["serde(untagged)".to_string()];
            }
            CompoundType::StringEnum(e) => {
                e.derives = SERDE_DERIVES.iter().map(|d| d.to_string()).collect();
                e.macros = Vec::new();
            }
            CompoundType::FlagGroup(g) => {
                g.derives = SERDE_DERIVES.iter().map(|d| d.to_string()).collect();
            }
        }
    }

    fn decorate_parameter(&self, param: &mut TargetParameter, _graph: &TypeGraph) {
        let setter = match param.data_type {
            RustType::CommaSeparatedList(_) => Some(SetterKind::Csv),
            RustType::BTreeSet(_) => Some(SetterKind::Set),
            RustType::Vec(_) => Some(SetterKind::List),
            _ => None,
        };
        let default = if param.is_required { "" } else { "default, " };
        match setter {
            Some(kind) => {
                param.setter_type = Some(kind);
                param.setter_name = Some(param.local_name.clone());
                param.macros = vec![format!(
                    "builder({}private, setter(name = \"_{}\"))",
                    default, param.local_name
                )];
            }
            None => {
                param.setter_type = None;
                param.setter_name = None;
                param.macros = vec![format!("builder({}setter(into))", default)];
            }
        }
    }

    fn compound_imports(&self, compound: &CompoundType) -> Vec<&'static str> {
        match compound {
            CompoundType::Struct(_) => vec![
                "derive_builder::Builder",
                "serde::Deserialize",
                "serde::Serialize",
            ],
            _ => vec!["serde::Deserialize", "serde::Serialize"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::adt::{DataType, ParameterLocation, ParsedSchema, RequestParameter};
    use crate::model::SchemaParser;
    use crate::types::{SdkTypeManager, LIFETIME};
    use serde_json::Value;

    fn manager(yaml: &str) -> SdkTypeManager {
        let schema: Value = serde_yaml::from_str(yaml).unwrap();
        let parsed: ParsedSchema = SchemaParser::new().parse(&schema).unwrap();
        let mut tm = SdkTypeManager::new();
        tm.set_models(parsed).unwrap();
        tm
    }

    #[test]
    fn test_struct_macros() {
        let tm = manager(r#"
type: object
properties:
  flavorRef: {type: string}
  name: {type: string}
  metadata: {type: object, additionalProperties: {type: string}}
required: [name]
"#);
        let Some(CompoundType::Struct(root)) = tm.root_compound() else {
            panic!("root is not a struct");
        };
        assert_eq!(root.derives[0], "Builder");
        assert_eq!(root.macros, vec!["builder(setter(strip_option))"]);
        assert_eq!(
            root.fields["flavorRef"].macros,
            vec![
                "serde(rename = \"flavorRef\")",
                "serde(skip_serializing_if = \"Option::is_none\")",
                "builder(default, setter(into))",
            ]
        );
        assert_eq!(root.fields["name"].macros, vec!["builder(setter(into))"]);
        assert_eq!(
            root.fields["metadata"].macros.last().map(String::as_str),
            Some("builder(default, private, setter(name = \"_metadata\"))")
        );
    }

    #[test]
    fn test_every_string_borrows() {
        let tm = manager(r#"
type: object
properties:
  server:
    type: object
    properties:
      name: {type: string}
      tags: {type: array, items: {type: string}}
"#);
        for compound in tm.get_subtypes() {
            let CompoundType::Struct(s) = compound else { continue };
            let has_string = s
                .fields
                .values()
                .any(|f| f.data_type.walk().contains(&&RustType::BorrowedStr));
            if has_string {
                assert!(tm.graph().compound_lifetimes(
                    tm.graph()
                        .compounds
                        .iter()
                        .find(|(_, c)| c.name() == s.name)
                        .map(|(r, _)| r)
                        .unwrap()
                )
                .contains(LIFETIME));
            }
        }
        assert_eq!(tm.type_hint(tm.get_root_data_type()), "Request<'a>");
    }

    #[test]
    fn test_parameter_setters() {
        let params: Vec<RequestParameter> = [
            r#"{"name": "fields", "in": "query", "style": "form", "explode": false,
                "schema": {"type": "array", "items": {"type": "string"}}}"#,
            r#"{"name": "tags", "in": "query",
                "schema": {"type": "array", "items": {"type": "string"}, "uniqueItems": true}}"#,
            r#"{"name": "id", "in": "path", "schema": {"type": "string"}}"#,
        ]
        .iter()
        .map(|raw| {
            crate::model::params::parse_parameter(&serde_json::from_str(raw).unwrap()).unwrap()
        })
        .collect();
        let mut tm = SdkTypeManager::new();
        tm.set_parameters(&params).unwrap();

        let query = tm.get_parameters(Some(ParameterLocation::Query));
        assert_eq!(query[0].setter_type, Some(SetterKind::Csv));
        assert_eq!(
            query[0].type_hint(tm.graph()),
            "Option<CommaSeparatedList<Cow<'a, str>>>"
        );
        assert_eq!(query[1].setter_type, Some(SetterKind::Set));
        assert_eq!(
            query[1].macros,
            vec!["builder(default, private, setter(name = \"_tags\"))"]
        );

        let path = tm.get_parameters(Some(ParameterLocation::Path));
        assert_eq!(path[0].macros, vec!["builder(setter(into))"]);
        assert_eq!(path[0].data_type, RustType::BorrowedStr);
        assert!(matches!(params[2].data_type, DataType::Primitive(_)));
    }
}

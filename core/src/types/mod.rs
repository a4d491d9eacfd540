#![deny(missing_docs)]

//! # Target Types
//!
//! The target-language (Rust) type graph built from the ADT, plus the
//! [`Dialect`] seam that distinguishes SDK output from CLI output.
//!
//! - **manager**: the generic [`TypeManager`] driving conversion, naming and iteration.
//! - **sdk**: builder/serde flavoured dialect with borrowed strings.
//! - **cli**: clap flavoured request dialect and table flavoured response dialect.

pub mod cli;
pub mod manager;
pub mod sdk;

pub use cli::{CliDialect, CliResponseDialect};
pub use manager::TypeManager;
pub use sdk::SdkDialect;

use crate::error::AppError;
use crate::model::adt::{ModelKind, ParameterLocation, Reference};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// SDK dialect type manager.
pub type SdkTypeManager = TypeManager<SdkDialect>;
/// CLI request dialect type manager.
pub type CliTypeManager = TypeManager<CliDialect>;
/// CLI response dialect type manager.
pub type CliResponseTypeManager = TypeManager<CliResponseDialect>;

/// Lifetime borrowed SDK strings carry.
pub const LIFETIME: &str = "'a";

/// Output flavour selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetDialect {
    /// Request builders for the SDK crate.
    Sdk,
    /// Command handlers for the CLI crate.
    Cli,
}

impl fmt::Display for TargetDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetDialect::Sdk => f.write_str("sdk"),
            TargetDialect::Cli => f.write_str("cli"),
        }
    }
}

impl FromStr for TargetDialect {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sdk" => Ok(TargetDialect::Sdk),
            "cli" => Ok(TargetDialect::Cli),
            other => Err(AppError::General(format!("Unknown target `{}`", other))),
        }
    }
}

/// A target type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum RustType {
    /// `bool`.
    Bool,
    /// `bool` toggled by presence on the command line.
    BooleanFlag,
    /// Integer with its schema format.
    Integer(Option<String>),
    /// Float with its schema format.
    Number(Option<String>),
    /// Owned `String`.
    String,
    /// Borrowed `Cow<'a, str>`.
    BorrowedStr,
    /// `serde_json::Value`.
    JsonValue,
    /// CLI helper accepting integers given as strings.
    IntString,
    /// CLI helper accepting numbers given as strings.
    NumString,
    /// CLI helper printing a list of strings.
    VecString,
    /// `Option<T>`.
    Option(Box<RustType>),
    /// `Vec<T>`.
    Vec(Box<RustType>),
    /// `BTreeSet<T>`.
    BTreeSet(Box<RustType>),
    /// SDK helper joining items with commas.
    CommaSeparatedList(Box<RustType>),
    /// `BTreeMap<K, V>`.
    BTreeMap(Box<RustType>, Box<RustType>),
    /// CLI `Vec<(String, V)>` parsed from `key=value`.
    KeyValueVec(Box<RustType>),
    /// A compound type of the graph.
    Named(Reference),
}

impl RustType {
    /// Wraps in `Option` unless already optional.
    pub fn optional(self) -> RustType {
        match self {
            RustType::Option(_) => self,
            other => RustType::Option(Box::new(other)),
        }
    }

    /// Peels one `Option` layer.
    pub fn strip_option(self) -> (RustType, bool) {
        match self {
            RustType::Option(inner) => {
                let (inner, _) = inner.strip_option();
                (inner, true)
            }
            other => (other, false),
        }
    }

    /// Item type of sequence shaped types.
    pub fn item(&self) -> Option<&RustType> {
        match self {
            RustType::Vec(i)
            | RustType::BTreeSet(i)
            | RustType::CommaSeparatedList(i)
            | RustType::Option(i) => Some(i),
            _ => None,
        }
    }

    /// Whether the type is a list.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            RustType::Vec(_)
                | RustType::BTreeSet(_)
                | RustType::CommaSeparatedList(_)
                | RustType::VecString
        )
    }

    /// The referenced compound, if this is a named type.
    pub fn named(&self) -> Option<&Reference> {
        match self {
            RustType::Named(r) => Some(r),
            _ => None,
        }
    }

    /// Every type nested in this one, self included.
    pub fn walk(&self) -> Vec<&RustType> {
        let mut out = vec![self];
        match self {
            RustType::Option(i)
            | RustType::Vec(i)
            | RustType::BTreeSet(i)
            | RustType::CommaSeparatedList(i)
            | RustType::KeyValueVec(i) => out.extend(i.walk()),
            RustType::BTreeMap(k, v) => {
                out.extend(k.walk());
                out.extend(v.walk());
            }
            _ => {}
        }
        out
    }

    /// Compounds referenced from this type.
    pub fn references(&self) -> Vec<&Reference> {
        self.walk().into_iter().filter_map(RustType::named).collect()
    }

    /// Rust spelling of the type.
    pub fn type_hint(&self, graph: &TypeGraph) -> String {
        match self {
            RustType::Bool | RustType::BooleanFlag => "bool".into(),
            RustType::Integer(format) => match format.as_deref() {
                Some("int64") => "i64".into(),
                Some("uint32") => "u32".into(),
                Some("uint64") => "u64".into(),
                _ => "i32".into(),
            },
            RustType::Number(format) => match format.as_deref() {
                Some("double") => "f64".into(),
                _ => "f32".into(),
            },
            RustType::String => "String".into(),
            RustType::BorrowedStr => format!("Cow<{}, str>", LIFETIME),
            RustType::JsonValue => "Value".into(),
            RustType::IntString => "IntString".into(),
            RustType::NumString => "NumString".into(),
            RustType::VecString => "VecString".into(),
            RustType::Option(i) => format!("Option<{}>", i.type_hint(graph)),
            RustType::Vec(i) => format!("Vec<{}>", i.type_hint(graph)),
            RustType::BTreeSet(i) => format!("BTreeSet<{}>", i.type_hint(graph)),
            RustType::CommaSeparatedList(i) => {
                format!("CommaSeparatedList<{}>", i.type_hint(graph))
            }
            RustType::BTreeMap(k, v) => {
                format!("BTreeMap<{}, {}>", k.type_hint(graph), v.type_hint(graph))
            }
            RustType::KeyValueVec(v) => format!("Vec<(String, {})>", v.type_hint(graph)),
            RustType::Named(r) => match graph.compounds.get(r) {
                Some(compound) => {
                    let lifetimes = graph.compound_lifetimes(r);
                    if lifetimes.is_empty() {
                        compound.name().to_string()
                    } else {
                        let list: Vec<&str> = lifetimes.iter().map(String::as_str).collect();
                        format!("{}<{}>", compound.name(), list.join(", "))
                    }
                }
                None => "Value".into(),
            },
        }
    }

    /// Lifetimes the type requires.
    pub fn lifetimes(&self, graph: &TypeGraph) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for t in self.walk() {
            match t {
                RustType::BorrowedStr => {
                    out.insert(LIFETIME.to_string());
                }
                RustType::Named(r) => out.extend(graph.compound_lifetimes(r)),
                _ => {}
            }
        }
        out
    }

    /// Module imports the type introduces (dialect neutral part).
    pub fn imports(&self) -> BTreeSet<&'static str> {
        let mut out = BTreeSet::new();
        for t in self.walk() {
            let import = match t {
                RustType::BorrowedStr => "std::borrow::Cow",
                RustType::JsonValue => "serde_json::Value",
                RustType::IntString => "openstack_sdk::types::IntString",
                RustType::NumString => "openstack_sdk::types::NumString",
                RustType::VecString => "crate::common::VecString",
                RustType::BTreeSet(_) => "std::collections::BTreeSet",
                RustType::BTreeMap(..) => "std::collections::BTreeMap",
                RustType::CommaSeparatedList(_) => "crate::api::common::CommaSeparatedList",
                RustType::KeyValueVec(_) => "crate::common::parse_key_val",
                _ => continue,
            };
            out.insert(import);
        }
        out
    }
}

/// A field of a target struct.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructField {
    /// Rust identifier.
    pub local_name: String,
    /// Wire name.
    pub remote_name: String,
    /// Description.
    pub description: Option<String>,
    /// Field type without the optional wrapper.
    pub data_type: RustType,
    /// Not listed as required.
    pub is_optional: bool,
    /// Accepts `null`.
    pub is_nullable: bool,
    /// Attribute contents (`serde(rename = "x")`).
    pub macros: Vec<String>,
    /// First microversion of the field.
    pub min_ver: Option<String>,
    /// Last microversion of the field.
    pub max_ver: Option<String>,
    /// Struct the field type was collapsed from (documentation only).
    pub original: Option<Reference>,
}

impl StructField {
    /// Field type as written in the struct.
    pub fn type_hint(&self, graph: &TypeGraph) -> String {
        if self.is_optional {
            format!("Option<{}>", self.data_type.type_hint(graph))
        } else {
            self.data_type.type_hint(graph)
        }
    }
}

/// A struct compound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructType {
    /// Type name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Fields keyed by wire name.
    pub fields: IndexMap<String, StructField>,
    /// Type of extra properties (`additionalProperties`/`patternProperties`).
    pub additional_fields: Option<RustType>,
    /// Derive list.
    pub derives: Vec<String>,
    /// Container attribute contents.
    pub macros: Vec<String>,
    /// First microversion of the struct.
    pub min_ver: Option<String>,
    /// Last microversion of the struct.
    pub max_ver: Option<String>,
}

/// A variant of an untagged enum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumVariant {
    /// Payload type.
    pub data_type: RustType,
}

/// Untagged enum compound built from a `oneOf`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumType {
    /// Type name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Variants keyed by identifier.
    pub variants: IndexMap<String, EnumVariant>,
    /// Derive list.
    pub derives: Vec<String>,
    /// Container attribute contents.
    pub macros: Vec<String>,
}

/// Enum over string literals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StringEnumType {
    /// Type name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Variant identifier to literals; the first literal is the canonical one,
    /// the rest are accepted aliases.
    pub variants: IndexMap<String, Vec<String>>,
    /// Derive list.
    pub derives: Vec<String>,
    /// Container attribute contents.
    pub macros: Vec<String>,
}

/// One boolean flag of a [`FlagGroupType`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flag {
    /// Rust identifier of the flag.
    pub local_name: String,
    /// Literal the flag stands for.
    pub literal: String,
    /// SDK value the flag translates into (`Networks::Auto`).
    pub sdk_value: String,
    /// Attribute contents.
    pub macros: Vec<String>,
}

/// CLI group of mutually exclusive flags plus an optional repeated option,
/// standing in for a `oneOf` of a string enum and a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagGroupType {
    /// Type name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// One flag per enum literal.
    pub flags: Vec<Flag>,
    /// The list alternative.
    pub list_field: Option<StructField>,
    /// Name of the SDK enum the selection is translated to.
    pub sdk_enum_name: String,
    /// Variant of the SDK enum wrapping the string enum.
    pub sdk_parent_enum_variant: Option<String>,
    /// Derive list.
    pub derives: Vec<String>,
    /// Container attribute contents.
    pub macros: Vec<String>,
}

/// A named node of the target graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CompoundType {
    /// Struct.
    Struct(StructType),
    /// Untagged enum.
    Enum(EnumType),
    /// String literal enum.
    StringEnum(StringEnumType),
    /// CLI flag group.
    FlagGroup(FlagGroupType),
}

impl CompoundType {
    /// Type name.
    pub fn name(&self) -> &str {
        match self {
            CompoundType::Struct(s) => &s.name,
            CompoundType::Enum(e) => &e.name,
            CompoundType::StringEnum(e) => &e.name,
            CompoundType::FlagGroup(g) => &g.name,
        }
    }

    /// Renames the type.
    pub fn set_name(&mut self, name: String) {
        match self {
            CompoundType::Struct(s) => s.name = name,
            CompoundType::Enum(e) => e.name = name,
            CompoundType::StringEnum(e) => e.name = name,
            CompoundType::FlagGroup(g) => g.name = name,
        }
    }

    /// Kind tag used for disambiguation.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            CompoundType::Struct(_) => "Struct",
            CompoundType::Enum(_) => "Enum",
            CompoundType::StringEnum(_) => "StringEnum",
            CompoundType::FlagGroup(_) => "FlagGroup",
        }
    }

    /// Description.
    pub fn description(&self) -> Option<&str> {
        match self {
            CompoundType::Struct(s) => s.description.as_deref(),
            CompoundType::Enum(e) => e.description.as_deref(),
            CompoundType::StringEnum(e) => e.description.as_deref(),
            CompoundType::FlagGroup(g) => g.description.as_deref(),
        }
    }

    /// Field or variant identifiers, used as the last disambiguation resort.
    pub fn member_names(&self) -> Vec<String> {
        match self {
            CompoundType::Struct(s) => s.fields.values().map(|f| f.local_name.clone()).collect(),
            CompoundType::Enum(e) => e.variants.keys().cloned().collect(),
            CompoundType::StringEnum(e) => e.variants.keys().cloned().collect(),
            CompoundType::FlagGroup(g) => g.flags.iter().map(|f| f.local_name.clone()).collect(),
        }
    }

    /// Types directly used by the compound.
    pub fn member_types(&self) -> Vec<&RustType> {
        match self {
            CompoundType::Struct(s) => s
                .fields
                .values()
                .map(|f| &f.data_type)
                .chain(s.additional_fields.iter())
                .collect(),
            CompoundType::Enum(e) => e.variants.values().map(|v| &v.data_type).collect(),
            CompoundType::StringEnum(_) => Vec::new(),
            CompoundType::FlagGroup(g) => g.list_field.iter().map(|f| &f.data_type).collect(),
        }
    }

    /// Derive list.
    pub fn derives(&self) -> &[String] {
        match self {
            CompoundType::Struct(s) => &s.derives,
            CompoundType::Enum(e) => &e.derives,
            CompoundType::StringEnum(e) => &e.derives,
            CompoundType::FlagGroup(g) => &g.derives,
        }
    }

    /// Container attribute contents.
    pub fn macros(&self) -> &[String] {
        match self {
            CompoundType::Struct(s) => &s.macros,
            CompoundType::Enum(e) => &e.macros,
            CompoundType::StringEnum(e) => &e.macros,
            CompoundType::FlagGroup(g) => &g.macros,
        }
    }
}

/// Builder setter flavour of SDK list parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SetterKind {
    /// Comma joined list.
    Csv,
    /// Unique repeated values.
    Set,
    /// Repeated values.
    List,
}

/// A converted request parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetParameter {
    /// Wire name.
    pub remote_name: String,
    /// Rust identifier.
    pub local_name: String,
    /// Location.
    pub location: ParameterLocation,
    /// Type without the optional wrapper.
    pub data_type: RustType,
    /// Description.
    pub description: Option<String>,
    /// Mandatory parameter.
    pub is_required: bool,
    /// Presence-only boolean.
    pub is_flag: bool,
    /// Name of a custom builder setter.
    pub setter_name: Option<String>,
    /// Flavour of the custom setter.
    pub setter_type: Option<SetterKind>,
    /// Attribute contents.
    pub macros: Vec<String>,
    /// First microversion of the parameter.
    pub min_ver: Option<String>,
    /// Last microversion of the parameter.
    pub max_ver: Option<String>,
}

impl TargetParameter {
    /// Parameter type as written in the struct.
    pub fn type_hint(&self, graph: &TypeGraph) -> String {
        if self.is_required || matches!(self.data_type, RustType::BooleanFlag) {
            self.data_type.type_hint(graph)
        } else {
            format!("Option<{}>", self.data_type.type_hint(graph))
        }
    }
}

/// Reference-keyed graph of converted types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeGraph {
    /// Conversion cache: ADT reference to target type.
    pub refs: IndexMap<Reference, RustType>,
    /// Named compounds keyed by the reference they were built from.
    pub compounds: IndexMap<Reference, CompoundType>,
}

impl TypeGraph {
    /// Lifetimes required by a compound (union over its members).
    pub fn compound_lifetimes(&self, reference: &Reference) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut stack = vec![reference];
        let mut seen = BTreeSet::new();
        while let Some(r) = stack.pop() {
            if !seen.insert(r) {
                continue;
            }
            let Some(compound) = self.compounds.get(r) else {
                continue;
            };
            for t in compound.member_types() {
                for nested in t.walk() {
                    match nested {
                        RustType::BorrowedStr => {
                            out.insert(LIFETIME.to_string());
                        }
                        RustType::Named(child) => stack.push(child),
                        _ => {}
                    }
                }
            }
        }
        out
    }

    /// Whether any compound uses `reference`.
    pub fn is_referenced(&self, reference: &Reference) -> bool {
        self.compounds.values().any(|c| {
            c.member_types()
                .iter()
                .any(|t| t.references().contains(&reference))
        })
    }
}

/// How a list maps in a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// Plain array.
    Array,
    /// Array with unique items.
    Set,
    /// Comma joined query array.
    CommaSeparatedList,
}

/// What the manager knows about a list being converted.
#[derive(Debug, Clone)]
pub struct ListShape<'a> {
    /// Kind of list in the ADT.
    pub kind: ListKind,
    /// Converted item.
    pub item: RustType,
    /// Number of fields when the item is a struct.
    pub item_struct_fields: Option<usize>,
    /// Name of the field holding the list.
    pub field_name: Option<&'a str>,
    /// Whether the list is a parameter.
    pub in_parameter: bool,
}

/// What to do with a `oneOf` that still has several kinds after simplification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiKindStrategy {
    /// Emit an untagged enum.
    Enum,
    /// Collapse to a JSON value.
    JsonValue,
    /// Emit a CLI flag group.
    FlagGroup,
}

/// Dialect hooks of the [`TypeManager`].
///
/// A third output flavour is another implementation of this trait.
pub trait Dialect: Clone + fmt::Debug {
    /// Dialect selector.
    fn target(&self) -> TargetDialect;

    /// Name of the root type.
    fn root_name(&self) -> &'static str {
        "Request"
    }

    /// Prefix prepended to every compound name.
    fn name_prefix(&self) -> &'static str {
        ""
    }

    /// Target of the ADT string primitive.
    fn string(&self) -> RustType;

    /// Target of a boolean parameter.
    fn boolean_parameter(&self, _is_flag: bool) -> RustType {
        RustType::Bool
    }

    /// Target of a dictionary over `value`.
    fn dictionary(&self, value: RustType) -> RustType;

    /// Target of a list, and whether struct items were collapsed on the way.
    fn list(&self, shape: ListShape<'_>) -> (RustType, bool);

    /// Collapses a pair of `oneOf` kinds, returning the merged type and
    /// whether the dictionary side was dropped.
    fn simplify_pair(
        &self,
        a: (ModelKind, &RustType),
        b: (ModelKind, &RustType),
    ) -> Option<(RustType, bool)>;

    /// Strategy for an irreducible `oneOf`.
    fn multi_kind(&self, kinds: &[RustType], graph: &TypeGraph) -> MultiKindStrategy;

    /// Whether string enums become their own type (otherwise plain strings).
    fn keeps_string_enums(&self) -> bool {
        true
    }

    /// Whether struct fields may reference nested structs (otherwise JSON values).
    fn keeps_nested_structs(&self) -> bool {
        true
    }

    /// Whether non-root single field structs collapse into their field type.
    fn flattens_single_field_structs(&self) -> bool {
        false
    }

    /// Fills derives and attribute macros of a compound.
    fn decorate(&self, compound: &mut CompoundType, graph: &TypeGraph, is_root: bool);

    /// Fills attribute macros and setters of a parameter.
    fn decorate_parameter(&self, param: &mut TargetParameter, graph: &TypeGraph);

    /// Imports a compound needs for its derives and macros.
    fn compound_imports(&self, compound: &CompoundType) -> Vec<&'static str>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_hints() {
        let graph = TypeGraph::default();
        let t = RustType::Option(Box::new(RustType::Vec(Box::new(RustType::BorrowedStr))));
        assert_eq!(t.type_hint(&graph), "Option<Vec<Cow<'a, str>>>");
        assert_eq!(
            RustType::KeyValueVec(Box::new(RustType::String)).type_hint(&graph),
            "Vec<(String, String)>"
        );
        assert_eq!(RustType::Integer(Some("int64".into())).type_hint(&graph), "i64");
        assert_eq!(RustType::Number(None).type_hint(&graph), "f32");
    }

    #[test]
    fn test_lifetimes_propagate_through_containers() {
        let graph = TypeGraph::default();
        let t = RustType::BTreeMap(
            Box::new(RustType::BorrowedStr),
            Box::new(RustType::JsonValue),
        );
        assert!(t.lifetimes(&graph).contains(LIFETIME));
        assert!(RustType::String.lifetimes(&graph).is_empty());
    }

    #[test]
    fn test_named_type_hint_includes_lifetime() {
        let mut graph = TypeGraph::default();
        let r = Reference::new("flavor", ModelKind::Struct, "h");
        let mut fields = IndexMap::new();
        fields.insert(
            "id".to_string(),
            StructField {
                local_name: "id".into(),
                remote_name: "id".into(),
                description: None,
                data_type: RustType::BorrowedStr,
                is_optional: false,
                is_nullable: false,
                macros: Vec::new(),
                min_ver: None,
                max_ver: None,
                original: None,
            },
        );
        graph.compounds.insert(
            r.clone(),
            CompoundType::Struct(StructType {
                name: "Flavor".into(),
                description: None,
                fields,
                additional_fields: None,
                derives: Vec::new(),
                macros: Vec::new(),
                min_ver: None,
                max_ver: None,
            }),
        );
        assert_eq!(RustType::Named(r.clone()).type_hint(&graph), "Flavor<'a>");
        assert!(!graph.is_referenced(&r));
    }

    #[test]
    fn test_imports() {
        let t = RustType::Option(Box::new(RustType::BTreeSet(Box::new(RustType::BorrowedStr))));
        let imports = t.imports();
        assert!(imports.contains("std::borrow::Cow"));
        assert!(imports.contains("std::collections::BTreeSet"));
    }

    #[test]
    fn test_target_dialect_from_str() {
        assert_eq!("cli".parse::<TargetDialect>().unwrap(), TargetDialect::Cli);
        assert!("go".parse::<TargetDialect>().is_err());
    }
}

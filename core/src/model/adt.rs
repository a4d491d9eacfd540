//! # ADT Models
//!
//! The internal algebraic data-type graph produced by the schema parser.
//!
//! Every node is either a primitive or a composite. Named composites are emitted
//! into the parser's model list once and embedded elsewhere as [`DataType::Reference`],
//! so structurally identical sub-trees are shared.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Kind tag of a model node. Part of a [`Reference`] identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ModelKind {
    /// Unconstrained string.
    String,
    /// Floating point number.
    Number,
    /// Integer number.
    Integer,
    /// Boolean.
    Boolean,
    /// JSON `null`.
    Null,
    /// Any JSON value.
    Any,
    /// Homogeneous ordered sequence.
    Array,
    /// Array serialized as a comma-joined query value.
    CommaSeparatedList,
    /// Array with unique items.
    Set,
    /// String keyed homogeneous map.
    Dictionary,
    /// Fixed set of named fields.
    Struct,
    /// Fixed set of primitive literals.
    Enum,
    /// Tagged choice among kinds.
    OneOf,
}

impl ModelKind {
    /// Tag used when a name needs disambiguation.
    pub fn tag(&self) -> &'static str {
        match self {
            ModelKind::String => "String",
            ModelKind::Number => "Number",
            ModelKind::Integer => "Integer",
            ModelKind::Boolean => "Boolean",
            ModelKind::Null => "Null",
            ModelKind::Any => "Any",
            ModelKind::Array => "Array",
            ModelKind::CommaSeparatedList => "CommaSeparatedList",
            ModelKind::Set => "Set",
            ModelKind::Dictionary => "Dictionary",
            ModelKind::Struct => "Struct",
            ModelKind::Enum => "Enum",
            ModelKind::OneOf => "OneOf",
        }
    }
}

/// Handle into the parser's model list.
///
/// Two references are equal iff name, kind and content hash match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Reference {
    /// Schema name (usually the property name the schema was found under).
    pub name: String,
    /// Kind of the referenced node.
    pub kind: ModelKind,
    /// Content hash of the source schema fragment.
    pub hash: String,
}

impl Reference {
    /// Creates a new reference.
    pub fn new(name: impl Into<String>, kind: ModelKind, hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            hash: hash.into(),
        }
    }

    /// Whether both references carry the same name and kind (ignoring content).
    pub fn same_slot(&self, other: &Reference) -> bool {
        self.name == other.name && self.kind == other.kind
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.hash.get(..8).unwrap_or(&self.hash);
        write!(f, "{}:{}#{}", self.name, self.kind.tag(), short)
    }
}

/// String constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrimitiveString {
    /// `format` keyword.
    pub format: Option<String>,
    /// `minLength`.
    pub min_length: Option<u64>,
    /// `maxLength`.
    pub max_length: Option<u64>,
    /// `pattern`.
    pub pattern: Option<String>,
}

/// Number/integer constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrimitiveNumber {
    /// `format` keyword (`int32`, `int64`, `float`, `double`).
    pub format: Option<String>,
    /// `minimum`.
    pub minimum: Option<f64>,
    /// `maximum`.
    pub maximum: Option<f64>,
    /// `multipleOf`.
    pub multiple_of: Option<f64>,
}

/// Leaf nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Primitive {
    /// String.
    String(PrimitiveString),
    /// Number.
    Number(PrimitiveNumber),
    /// Integer.
    Integer(PrimitiveNumber),
    /// Boolean.
    Boolean,
    /// Null.
    Null,
    /// Unconstrained JSON value.
    Any,
}

impl Primitive {
    /// Kind tag of the primitive.
    pub fn kind(&self) -> ModelKind {
        match self {
            Primitive::String(_) => ModelKind::String,
            Primitive::Number(_) => ModelKind::Number,
            Primitive::Integer(_) => ModelKind::Integer,
            Primitive::Boolean => ModelKind::Boolean,
            Primitive::Null => ModelKind::Null,
            Primitive::Any => ModelKind::Any,
        }
    }

    /// Plain string without constraints.
    pub fn string() -> Self {
        Primitive::String(PrimitiveString::default())
    }
}

/// Array, comma separated list or set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListType {
    /// Optional identity.
    pub reference: Option<Reference>,
    /// Description of the list.
    pub description: Option<String>,
    /// Item type.
    pub item_type: Box<DataType>,
}

/// Homogeneous map keyed by string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dictionary {
    /// Optional identity.
    pub reference: Option<Reference>,
    /// Description.
    pub description: Option<String>,
    /// Value type.
    pub value_type: Box<DataType>,
}

/// A single field of a [`Struct`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructField {
    /// Field type.
    pub data_type: DataType,
    /// Field description.
    pub description: Option<String>,
    /// Whether the field is listed in `required`.
    pub is_required: bool,
    /// Microversion the field appeared in.
    pub min_ver: Option<String>,
    /// Last microversion the field is valid for.
    pub max_ver: Option<String>,
}

/// Finite, named set of fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Struct {
    /// Optional identity.
    pub reference: Option<Reference>,
    /// Description.
    pub description: Option<String>,
    /// Fields keyed by their wire name, in schema order.
    pub fields: IndexMap<String, StructField>,
    /// Type of `additionalProperties` when the struct is open.
    pub additional_fields: Option<Box<DataType>>,
    /// `patternProperties` value types keyed by pattern.
    pub pattern_properties: IndexMap<String, DataType>,
    /// Microversion the struct appeared in.
    pub min_ver: Option<String>,
    /// Last microversion the struct is valid for.
    pub max_ver: Option<String>,
}

/// Primitive base type inhabited by enum literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EnumBase {
    /// String literals.
    String,
    /// Integer literals.
    Integer,
    /// Non integral numbers.
    Number,
    /// Boolean literals.
    Boolean,
}

/// Finite set of primitive literals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Enum {
    /// Optional identity.
    pub reference: Option<Reference>,
    /// Description.
    pub description: Option<String>,
    /// Literals in schema order, deduplicated, `null` stripped.
    pub literals: Vec<Value>,
    /// Base types the literals inhabit.
    pub base_types: BTreeSet<EnumBase>,
}

impl Enum {
    /// String literals of the enum.
    pub fn string_literals(&self) -> impl Iterator<Item = &str> {
        self.literals.iter().filter_map(Value::as_str)
    }
}

/// Tagged choice among kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OneOfType {
    /// Optional identity.
    pub reference: Option<Reference>,
    /// Description.
    pub description: Option<String>,
    /// Parsed kinds (named kinds appear as references).
    pub kinds: Vec<DataType>,
    /// Microversion the type appeared in.
    pub min_ver: Option<String>,
    /// Last microversion the type is valid for.
    pub max_ver: Option<String>,
}

/// A node of the ADT graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataType {
    /// Primitive leaf.
    Primitive(Primitive),
    /// `Array(item_type)`.
    Array(ListType),
    /// Array serialised as a single comma-joined string.
    CommaSeparatedList(ListType),
    /// Array with unique items.
    Set(ListType),
    /// `Dictionary(value_type)`.
    Dictionary(Dictionary),
    /// Struct.
    Struct(Struct),
    /// Enum over primitive literals.
    Enum(Enum),
    /// Tagged choice.
    OneOf(OneOfType),
    /// Stand-in for a node stored in the model list.
    Reference(Reference),
}

impl DataType {
    /// Shortcut for `Primitive::Any`.
    pub fn any() -> Self {
        DataType::Primitive(Primitive::Any)
    }

    /// Shortcut for a plain string.
    pub fn string() -> Self {
        DataType::Primitive(Primitive::string())
    }

    /// Kind of the node. References report the kind they point to.
    pub fn kind(&self) -> ModelKind {
        match self {
            DataType::Primitive(p) => p.kind(),
            DataType::Array(_) => ModelKind::Array,
            DataType::CommaSeparatedList(_) => ModelKind::CommaSeparatedList,
            DataType::Set(_) => ModelKind::Set,
            DataType::Dictionary(_) => ModelKind::Dictionary,
            DataType::Struct(_) => ModelKind::Struct,
            DataType::Enum(_) => ModelKind::Enum,
            DataType::OneOf(_) => ModelKind::OneOf,
            DataType::Reference(r) => r.kind,
        }
    }

    /// The identity of a composite node (or the reference itself).
    pub fn reference(&self) -> Option<&Reference> {
        match self {
            DataType::Primitive(_) => None,
            DataType::Array(l) | DataType::CommaSeparatedList(l) | DataType::Set(l) => {
                l.reference.as_ref()
            }
            DataType::Dictionary(d) => d.reference.as_ref(),
            DataType::Struct(s) => s.reference.as_ref(),
            DataType::Enum(e) => e.reference.as_ref(),
            DataType::OneOf(o) => o.reference.as_ref(),
            DataType::Reference(r) => Some(r),
        }
    }

    /// Sets the identity of a composite node. No-op on primitives and references.
    pub fn set_reference(&mut self, reference: Option<Reference>) {
        match self {
            DataType::Array(l) | DataType::CommaSeparatedList(l) | DataType::Set(l) => {
                l.reference = reference
            }
            DataType::Dictionary(d) => d.reference = reference,
            DataType::Struct(s) => s.reference = reference,
            DataType::Enum(e) => e.reference = reference,
            DataType::OneOf(o) => o.reference = reference,
            DataType::Primitive(_) | DataType::Reference(_) => {}
        }
    }

    /// Sets the description of a composite node.
    pub fn set_description(&mut self, description: Option<String>) {
        match self {
            DataType::Array(l) | DataType::CommaSeparatedList(l) | DataType::Set(l) => {
                l.description = description
            }
            DataType::Dictionary(d) => d.description = description,
            DataType::Struct(s) => s.description = description,
            DataType::Enum(e) => e.description = description,
            DataType::OneOf(o) => o.description = description,
            DataType::Primitive(_) | DataType::Reference(_) => {}
        }
    }

    /// Description of a composite node.
    pub fn description(&self) -> Option<&str> {
        match self {
            DataType::Array(l) | DataType::CommaSeparatedList(l) | DataType::Set(l) => {
                l.description.as_deref()
            }
            DataType::Dictionary(d) => d.description.as_deref(),
            DataType::Struct(s) => s.description.as_deref(),
            DataType::Enum(e) => e.description.as_deref(),
            DataType::OneOf(o) => o.description.as_deref(),
            DataType::Primitive(_) | DataType::Reference(_) => None,
        }
    }

    /// Whether the node is the `null` primitive.
    pub fn is_null(&self) -> bool {
        matches!(self, DataType::Primitive(Primitive::Null))
    }

    /// Collapses a named node into its reference, keeping anonymous nodes inline.
    pub fn embed(self) -> DataType {
        match self.reference() {
            Some(r) if !matches!(self, DataType::Reference(_)) => DataType::Reference(r.clone()),
            _ => self,
        }
    }

    /// Direct child references of this node (fields, kinds, items, values).
    pub fn child_references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        match self {
            DataType::Array(l) | DataType::CommaSeparatedList(l) | DataType::Set(l) => {
                collect_refs(&l.item_type, &mut out)
            }
            DataType::Dictionary(d) => collect_refs(&d.value_type, &mut out),
            DataType::Struct(s) => {
                for f in s.fields.values() {
                    collect_refs(&f.data_type, &mut out);
                }
                if let Some(a) = &s.additional_fields {
                    collect_refs(a, &mut out);
                }
                for p in s.pattern_properties.values() {
                    collect_refs(p, &mut out);
                }
            }
            DataType::OneOf(o) => {
                for k in &o.kinds {
                    collect_refs(k, &mut out);
                }
            }
            DataType::Primitive(_) | DataType::Enum(_) | DataType::Reference(_) => {}
        }
        out
    }
}

/// Walks inline nodes down to the first references found.
fn collect_refs<'a>(dt: &'a DataType, out: &mut Vec<&'a Reference>) {
    match dt {
        DataType::Reference(r) => out.push(r),
        other => out.extend(other.child_references()),
    }
}

/// Result of parsing one schema: the root node and every named node reached from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedSchema {
    /// Top level node (inline even when named).
    pub root: DataType,
    /// Named nodes in parse order.
    pub models: Vec<DataType>,
}

impl ParsedSchema {
    /// Looks a model up by its reference.
    pub fn get(&self, reference: &Reference) -> Option<&DataType> {
        self.models
            .iter()
            .find(|m| m.reference() == Some(reference))
    }

    /// Mutable lookup by reference.
    pub fn get_mut(&mut self, reference: &Reference) -> Option<&mut DataType> {
        self.models
            .iter_mut()
            .find(|m| m.reference() == Some(reference))
    }
}

/// Location of a request parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// URL path placeholder.
    Path,
    /// Query string.
    Query,
    /// HTTP header.
    Header,
    /// Cookie.
    Cookie,
}

impl ParameterLocation {
    /// Parses the OpenAPI `in` value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            _ => None,
        }
    }

    /// The OpenAPI `in` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

/// An operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestParameter {
    /// Wire name.
    pub name: String,
    /// Where the parameter travels.
    pub location: ParameterLocation,
    /// Parameter type.
    pub data_type: DataType,
    /// Description.
    pub description: Option<String>,
    /// Whether the parameter is mandatory.
    pub is_required: bool,
    /// Boolean query parameter meaning "presence without value".
    pub is_flag: bool,
    /// Microversion the parameter appeared in.
    pub min_ver: Option<String>,
    /// Last microversion the parameter is valid for.
    pub max_ver: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_equality_includes_hash() {
        let a = Reference::new("server", ModelKind::Struct, "aaa");
        let b = Reference::new("server", ModelKind::Struct, "bbb");
        assert_ne!(a, b);
        assert!(a.same_slot(&b));
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_embed_named_node() {
        let reference = Reference::new("flavor", ModelKind::Struct, "h");
        let node = DataType::Struct(Struct {
            reference: Some(reference.clone()),
            ..Default::default()
        });
        assert_eq!(node.embed(), DataType::Reference(reference));
        assert_eq!(DataType::string().embed(), DataType::string());
    }

    #[test]
    fn test_child_references_struct() {
        let inner = Reference::new("inner", ModelKind::Struct, "1");
        let item = Reference::new("tag", ModelKind::Enum, "2");
        let mut s = Struct::default();
        s.fields.insert(
            "inner".into(),
            StructField {
                data_type: DataType::Reference(inner.clone()),
                description: None,
                is_required: false,
                min_ver: None,
                max_ver: None,
            },
        );
        s.fields.insert(
            "tags".into(),
            StructField {
                data_type: DataType::Array(ListType {
                    reference: None,
                    description: None,
                    item_type: Box::new(DataType::Reference(item.clone())),
                }),
                description: None,
                is_required: false,
                min_ver: None,
                max_ver: None,
            },
        );
        let node = DataType::Struct(s);
        assert_eq!(node.child_references(), vec![&inner, &item]);
    }

    #[test]
    fn test_parameter_location_parse() {
        assert_eq!(ParameterLocation::parse("query"), Some(ParameterLocation::Query));
        assert_eq!(ParameterLocation::parse("body"), None);
    }
}

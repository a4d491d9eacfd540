//! # Type Manager
//!
//! Converts a [`ParsedSchema`] and a parameter list into the target type graph.
//! Dialect specific choices are delegated to a [`Dialect`].
//!
//! Conversion is memoised per [`Reference`]. After all models are converted a
//! naming pass makes compound names unique and the dialect decorates every
//! reachable compound and parameter with its derives and attribute macros.

use crate::error::{AppError, AppResult};
use crate::model::adt::{
    DataType, Enum, EnumBase, ListType, ModelKind, OneOfType, ParameterLocation, ParsedSchema,
    Primitive, Reference, RequestParameter, Struct,
};
use crate::model::hash::content_hash;
use crate::oas::naming::{local_attribute_name, model_name, variant_name};
use crate::types::{
    CompoundType, Dialect, EnumType, EnumVariant, Flag, FlagGroupType, ListKind, ListShape,
    MultiKindStrategy, RustType, StringEnumType, StructField, StructType, TargetParameter,
    TypeGraph,
};
use heck::ToUpperCamelCase;
use indexmap::{IndexMap, IndexSet};
use std::collections::{BTreeSet, HashMap, HashSet};

/// A `oneOf` alternative: its ADT kind, converted type and identity.
type Kind = (ModelKind, RustType, Option<Reference>);

/// Where a node is being converted.
#[derive(Debug, Clone, Copy, Default)]
struct Ctx<'a> {
    field_name: Option<&'a str>,
    in_parameter: bool,
}

/// Converts ADT models into a dialect's target types.
#[derive(Debug, Clone)]
pub struct TypeManager<D: Dialect> {
    dialect: D,
    models: Vec<DataType>,
    graph: TypeGraph,
    root: RustType,
    root_reference: Reference,
    parameters: IndexMap<String, TargetParameter>,
    ignored_models: IndexSet<Reference>,
    flattened: HashSet<Reference>,
}

impl<D: Dialect + Default> Default for TypeManager<D> {
    fn default() -> Self {
        Self::with_dialect(D::default())
    }
}

impl<D: Dialect + Default> TypeManager<D> {
    /// Creates a manager whose root is an empty request struct.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: Dialect> TypeManager<D> {
    /// Creates a manager for `dialect`.
    pub fn with_dialect(dialect: D) -> Self {
        let root_reference = Reference::new(dialect.root_name(), ModelKind::Struct, "root");
        let mut manager = Self {
            dialect,
            models: Vec::new(),
            graph: TypeGraph::default(),
            root: RustType::Named(root_reference.clone()),
            root_reference,
            parameters: IndexMap::new(),
            ignored_models: IndexSet::new(),
            flattened: HashSet::new(),
        };
        manager.insert_empty_root();
        manager.decorate();
        manager
    }

    /// The active dialect.
    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// The converted graph.
    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    /// Converts a parsed schema. Replaces any previously set models.
    pub fn set_models(&mut self, parsed: ParsedSchema) -> AppResult<()> {
        self.models = parsed.models;
        self.graph = TypeGraph::default();
        self.ignored_models.clear();
        self.flattened.clear();

        let root_name = self.dialect.root_name();
        self.root_reference = match parsed.root.reference() {
            Some(r) => r.clone(),
            None => Reference::new(root_name, parsed.root.kind(), "root"),
        };
        let root_reference = self.root_reference.clone();
        self.root = match &parsed.root {
            DataType::Struct(s) => self.convert_struct(s, &root_reference, true)?,
            DataType::Enum(e) => self.convert_enum(e, Some(&root_reference), Ctx::default())?,
            DataType::OneOf(o) => {
                let mut o = o.clone();
                o.reference = Some(root_reference.clone());
                self.convert_one_of(&o, Ctx::default())?
            }
            other => self.convert(other, Ctx::default())?,
        };
        if let Some(compound) = self.graph.compounds.get_mut(&root_reference) {
            compound.set_name(root_name.to_string());
        }
        tracing::debug!(
            dialect = %self.dialect.target(),
            compounds = self.graph.compounds.len(),
            "models converted"
        );
        self.ensure_unique_names()?;
        self.decorate();
        Ok(())
    }

    /// Converts the operation parameters. Replaces any previously set parameters.
    pub fn set_parameters(&mut self, parameters: &[RequestParameter]) -> AppResult<()> {
        self.parameters.clear();
        for param in parameters {
            let data_type = match &param.data_type {
                DataType::Primitive(Primitive::Boolean) => {
                    self.dialect.boolean_parameter(param.is_flag)
                }
                other => {
                    let ctx = Ctx {
                        field_name: Some(&param.name),
                        in_parameter: true,
                    };
                    self.convert(other, ctx)?
                }
            };
            let (data_type, _) = data_type.strip_option();

            let mut key = param.name.clone();
            let mut local_name = local_attribute_name(&param.name);
            if self.parameters.contains_key(&key)
                || self.parameters.values().any(|p| p.local_name == local_name)
            {
                key = format!("{}_{}", param.location.as_str(), param.name);
                local_name = format!("{}_{}", param.location.as_str(), local_name);
            }
            self.parameters.insert(
                key,
                TargetParameter {
                    remote_name: param.name.clone(),
                    local_name,
                    location: param.location,
                    data_type,
                    description: param.description.clone(),
                    is_required: param.is_required,
                    is_flag: param.is_flag,
                    setter_name: None,
                    setter_type: None,
                    macros: Vec::new(),
                    min_ver: param.min_ver.clone(),
                    max_ver: param.max_ver.clone(),
                },
            );
        }
        self.ensure_unique_names()?;
        self.decorate();
        Ok(())
    }

    /// Type of the whole request (or response) body.
    ///
    /// Without a body this is an empty struct named after the dialect's root.
    pub fn get_root_data_type(&self) -> &RustType {
        &self.root
    }

    /// The root compound, when the body is a named type.
    pub fn root_compound(&self) -> Option<&CompoundType> {
        self.root.named().and_then(|r| self.graph.compounds.get(r))
    }

    /// Every compound reachable from the root and the parameters, root excluded,
    /// each name once, dependencies first.
    pub fn get_subtypes(&self) -> Vec<&CompoundType> {
        let mut seen = HashSet::new();
        self.reachable()
            .into_iter()
            .filter(|r| Some(r) != self.root.named())
            .filter_map(|r| self.graph.compounds.get(&r))
            .filter(|c| seen.insert((c.kind_tag(), c.name().to_string())))
            .collect()
    }

    /// Parameters, optionally filtered by location.
    pub fn get_parameters(&self, location: Option<ParameterLocation>) -> Vec<&TargetParameter> {
        self.parameters
            .values()
            .filter(|p| location.map_or(true, |l| p.location == l))
            .collect()
    }

    /// Union of imports of the root, the subtypes and the parameters.
    pub fn get_imports(&self) -> BTreeSet<String> {
        let mut imports: BTreeSet<String> = self
            .root
            .imports()
            .into_iter()
            .map(str::to_string)
            .collect();
        for r in self.reachable() {
            let Some(compound) = self.graph.compounds.get(&r) else {
                continue;
            };
            for t in compound.member_types() {
                imports.extend(t.imports().into_iter().map(str::to_string));
            }
            imports.extend(
                self.dialect
                    .compound_imports(compound)
                    .into_iter()
                    .map(str::to_string),
            );
        }
        for p in self.parameters.values() {
            imports.extend(p.data_type.imports().into_iter().map(str::to_string));
        }
        imports
    }

    /// Lifetimes of the root type and the parameters.
    pub fn get_lifetimes(&self) -> BTreeSet<String> {
        let mut lifetimes = self.root.lifetimes(&self.graph);
        for p in self.parameters.values() {
            lifetimes.extend(p.data_type.lifetimes(&self.graph));
        }
        lifetimes
    }

    /// Target name of a model; `None` names the root.
    pub fn get_model_name(&self, reference: Option<&Reference>) -> String {
        match reference {
            None => self.dialect.root_name().to_string(),
            Some(r) => match self.graph.compounds.get(r) {
                Some(compound) => compound.name().to_string(),
                None => self.type_name(r),
            },
        }
    }

    /// Models dropped by simplification.
    pub fn ignored_models(&self) -> impl Iterator<Item = &Reference> {
        self.ignored_models.iter()
    }

    /// Rust spelling of `t` within this graph.
    pub fn type_hint(&self, t: &RustType) -> String {
        t.type_hint(&self.graph)
    }

    /// Drops a model and every component only it used.
    pub fn discard_model(&mut self, reference: &Reference) {
        if !self.ignored_models.insert(reference.clone()) {
            return;
        }
        self.graph.compounds.shift_remove(reference);
        self.graph.refs.shift_remove(reference);
        let children: Vec<Reference> = self
            .model(reference)
            .map(|m| m.child_references().into_iter().cloned().collect())
            .unwrap_or_default();
        for child in children {
            if !self.graph.is_referenced(&child) {
                self.discard_model(&child);
            }
        }
    }

    fn insert_empty_root(&mut self) {
        self.graph.compounds.insert(
            self.root_reference.clone(),
            CompoundType::Struct(StructType {
                name: self.dialect.root_name().to_string(),
                description: None,
                fields: IndexMap::new(),
                additional_fields: None,
                derives: Vec::new(),
                macros: Vec::new(),
                min_ver: None,
                max_ver: None,
            }),
        );
    }

    fn model(&self, reference: &Reference) -> Option<&DataType> {
        self.models.iter().find(|m| m.reference() == Some(reference))
    }

    fn type_name(&self, reference: &Reference) -> String {
        format!("{}{}", self.dialect.name_prefix(), model_name(&reference.name))
    }

    /// Identity for an anonymous composite.
    fn anonymous_reference(&self, node: &DataType, ctx: Ctx<'_>) -> Reference {
        let name = ctx.field_name.unwrap_or(self.dialect.root_name());
        let hash = serde_json::to_value(node)
            .map(|v| content_hash(&v))
            .unwrap_or_default();
        Reference::new(name, node.kind(), hash)
    }

    fn convert(&mut self, node: &DataType, ctx: Ctx<'_>) -> AppResult<RustType> {
        match node {
            DataType::Primitive(p) => Ok(self.primitive(p)),
            DataType::Array(l) => Ok(self.convert_list(ListKind::Array, l, ctx)?.0),
            DataType::Set(l) => Ok(self.convert_list(ListKind::Set, l, ctx)?.0),
            DataType::CommaSeparatedList(l) => {
                Ok(self.convert_list(ListKind::CommaSeparatedList, l, ctx)?.0)
            }
            DataType::Dictionary(d) => {
                let value = self.convert(&d.value_type, ctx)?;
                Ok(self.dialect.dictionary(value))
            }
            DataType::Struct(s) => {
                let reference = match &s.reference {
                    Some(r) => r.clone(),
                    None => self.anonymous_reference(node, ctx),
                };
                self.convert_struct(s, &reference, false)
            }
            DataType::Enum(e) => self.convert_enum(e, e.reference.as_ref(), ctx),
            DataType::OneOf(o) => self.convert_one_of(o, ctx),
            DataType::Reference(r) => self.convert_reference(r, ctx),
        }
    }

    fn primitive(&self, p: &Primitive) -> RustType {
        match p {
            Primitive::String(_) => self.dialect.string(),
            Primitive::Integer(n) => RustType::Integer(n.format.clone()),
            Primitive::Number(n) => RustType::Number(n.format.clone()),
            Primitive::Boolean => RustType::Bool,
            Primitive::Null | Primitive::Any => RustType::JsonValue,
        }
    }

    fn convert_reference(&mut self, reference: &Reference, ctx: Ctx<'_>) -> AppResult<RustType> {
        if let Some(t) = self.graph.refs.get(reference) {
            return Ok(t.clone());
        }
        let model = self
            .model(reference)
            .cloned()
            .ok_or_else(|| AppError::UnresolvedRef(reference.to_string()))?;
        self.ignored_models.shift_remove(reference);
        let converted = match &model {
            DataType::Struct(s) => self.convert_struct(s, reference, false)?,
            DataType::Enum(e) => self.convert_enum(e, Some(reference), ctx)?,
            other => self.convert(other, ctx)?,
        };
        self.graph.refs.insert(reference.clone(), converted.clone());
        Ok(converted)
    }

    fn convert_list(
        &mut self,
        kind: ListKind,
        list: &ListType,
        ctx: Ctx<'_>,
    ) -> AppResult<(RustType, Option<Reference>)> {
        let item = self.convert(&list.item_type, ctx)?;
        let item_struct_fields = item.named().and_then(|r| match self.graph.compounds.get(r) {
            Some(CompoundType::Struct(s)) => Some(s.fields.len()),
            _ => None,
        });
        let (converted, collapsed) = self.dialect.list(ListShape {
            kind,
            item,
            item_struct_fields,
            field_name: ctx.field_name,
            in_parameter: ctx.in_parameter,
        });
        let original = collapsed
            .then(|| list.item_type.reference().cloned())
            .flatten();
        Ok((converted, original))
    }

    fn convert_struct(
        &mut self,
        s: &Struct,
        reference: &Reference,
        is_root: bool,
    ) -> AppResult<RustType> {
        if let Some(t) = self.graph.refs.get(reference) {
            return Ok(t.clone());
        }
        let mut fields = IndexMap::new();
        for (remote, f) in &s.fields {
            let ctx = Ctx {
                field_name: Some(remote),
                in_parameter: false,
            };
            let (converted, mut original) = match &f.data_type {
                DataType::Array(l) => self.convert_list(ListKind::Array, l, ctx)?,
                DataType::Set(l) => self.convert_list(ListKind::Set, l, ctx)?,
                DataType::CommaSeparatedList(l) => {
                    self.convert_list(ListKind::CommaSeparatedList, l, ctx)?
                }
                other => (self.convert(other, ctx)?, None),
            };
            if let DataType::Reference(r) = &f.data_type {
                if self.flattened.contains(r) {
                    original = Some(r.clone());
                }
            }
            let (mut data_type, is_nullable) = converted.strip_option();

            if !self.dialect.keeps_nested_structs() {
                let nested = data_type.named().cloned().filter(|r| {
                    matches!(self.graph.compounds.get(r), Some(CompoundType::Struct(_)))
                });
                if let Some(nested) = nested {
                    self.discard_model(&nested);
                    original = Some(nested);
                    data_type = RustType::JsonValue;
                }
            }

            fields.insert(
                remote.clone(),
                StructField {
                    local_name: local_attribute_name(remote),
                    remote_name: remote.clone(),
                    description: f.description.clone(),
                    data_type,
                    is_optional: !f.is_required,
                    is_nullable,
                    macros: Vec::new(),
                    min_ver: f.min_ver.clone(),
                    max_ver: f.max_ver.clone(),
                    original,
                },
            );
        }

        let extra = match (&s.additional_fields, s.pattern_properties.len()) {
            (Some(additional), _) => Some(self.convert(additional, Ctx::default())?),
            (None, 0) => None,
            (None, 1) => match s.pattern_properties.values().next() {
                Some(p) => Some(self.convert(p, Ctx::default())?),
                None => None,
            },
            (None, _) => Some(RustType::JsonValue),
        };
        let additional_fields = extra.map(|value| self.dialect.dictionary(value));

        if !is_root
            && self.dialect.flattens_single_field_structs()
            && fields.len() == 1
            && additional_fields.is_none()
        {
            if let Some(only) = fields.values().next() {
                if only.data_type.references().is_empty() {
                    tracing::debug!(model = %reference, "single field struct flattened");
                    let flat = only.data_type.clone();
                    self.flattened.insert(reference.clone());
                    self.graph.refs.insert(reference.clone(), flat.clone());
                    return Ok(flat);
                }
            }
        }

        let name = if is_root {
            self.dialect.root_name().to_string()
        } else {
            self.type_name(reference)
        };
        self.graph.compounds.insert(
            reference.clone(),
            CompoundType::Struct(StructType {
                name,
                description: s.description.clone(),
                fields,
                additional_fields,
                derives: Vec::new(),
                macros: Vec::new(),
                min_ver: s.min_ver.clone(),
                max_ver: s.max_ver.clone(),
            }),
        );
        let named = RustType::Named(reference.clone());
        self.graph.refs.insert(reference.clone(), named.clone());
        Ok(named)
    }

    fn base_type(&self, base: EnumBase) -> (ModelKind, RustType) {
        match base {
            EnumBase::String => (ModelKind::String, self.dialect.string()),
            EnumBase::Integer => (ModelKind::Integer, RustType::Integer(None)),
            EnumBase::Number => (ModelKind::Number, RustType::Number(None)),
            EnumBase::Boolean => (ModelKind::Boolean, RustType::Bool),
        }
    }

    fn convert_enum(
        &mut self,
        e: &Enum,
        reference: Option<&Reference>,
        ctx: Ctx<'_>,
    ) -> AppResult<RustType> {
        let bases: Vec<EnumBase> = e.base_types.iter().copied().collect();
        match bases.as_slice() {
            [EnumBase::String] if self.dialect.keeps_string_enums() => {
                let reference = match reference {
                    Some(r) => r.clone(),
                    None => self.anonymous_reference(&DataType::Enum(e.clone()), ctx),
                };
                let mut variants: IndexMap<String, Vec<String>> = IndexMap::new();
                for literal in e.string_literals() {
                    variants
                        .entry(variant_name(literal))
                        .or_default()
                        .push(literal.to_string());
                }
                self.graph.compounds.insert(
                    reference.clone(),
                    CompoundType::StringEnum(StringEnumType {
                        name: self.type_name(&reference),
                        description: e.description.clone(),
                        variants,
                        derives: Vec::new(),
                        macros: Vec::new(),
                    }),
                );
                Ok(RustType::Named(reference))
            }
            [single] => Ok(self.base_type(*single).1),
            [a, b] => {
                let (ka, ta) = self.base_type(*a);
                let (kb, tb) = self.base_type(*b);
                self.dialect
                    .simplify_pair((ka, &ta), (kb, &tb))
                    .map(|(t, _)| t)
                    .ok_or_else(|| unsupported_enum(e, reference, &bases))
            }
            _ => Err(unsupported_enum(e, reference, &bases)),
        }
    }

    fn convert_one_of(&mut self, o: &OneOfType, ctx: Ctx<'_>) -> AppResult<RustType> {
        let mut nullable = false;
        let mut kinds: Vec<Kind> = Vec::new();
        for kind in &o.kinds {
            if kind.is_null() {
                nullable = true;
                continue;
            }
            let (converted, inner_nullable) = self.convert(kind, ctx)?.strip_option();
            nullable |= inner_nullable;
            if !kinds.iter().any(|(_, t, _)| *t == converted) {
                kinds.push((kind.kind(), converted, kind.reference().cloned()));
            }
        }

        while let Some((i, j, merged, dropped)) = self.find_simplification(&kinds) {
            if let Some(dropped) = dropped {
                tracing::warn!(model = %dropped, "dictionary alternative ignored by oneOf simplification");
                self.discard_model(&dropped);
            }
            kinds[i] = merged;
            kinds.remove(j);
        }

        let converted = match kinds.len() {
            0 => RustType::JsonValue,
            1 => kinds.remove(0).1,
            _ => {
                let types: Vec<RustType> = kinds.iter().map(|(_, t, _)| t.clone()).collect();
                match self.dialect.multi_kind(&types, &self.graph) {
                    MultiKindStrategy::JsonValue => RustType::JsonValue,
                    MultiKindStrategy::Enum => self.untagged_enum(o, &kinds, ctx),
                    MultiKindStrategy::FlagGroup => self.flag_group(o, &kinds, ctx)?,
                }
            }
        };
        Ok(if nullable {
            converted.optional()
        } else {
            converted
        })
    }

    /// First pair of kinds that collapses, with the merged kind and the
    /// dictionary model dropped on the way.
    fn find_simplification(&self, kinds: &[Kind]) -> Option<(usize, usize, Kind, Option<Reference>)> {
        for i in 0..kinds.len() {
            for j in (i + 1)..kinds.len() {
                let (a, b) = (&kinds[i], &kinds[j]);
                if b.1 == RustType::Vec(Box::new(a.1.clone())) {
                    return Some((i, j, b.clone(), None));
                }
                if a.1 == RustType::Vec(Box::new(b.1.clone())) {
                    return Some((i, j, a.clone(), None));
                }
                let Some((merged, dropped_dict)) =
                    self.dialect.simplify_pair((a.0, &a.1), (b.0, &b.1))
                else {
                    continue;
                };
                let dropped = if dropped_dict {
                    [a, b]
                        .into_iter()
                        .find(|k| k.0 == ModelKind::Dictionary)
                        .and_then(|k| k.2.clone())
                } else {
                    None
                };
                let kind = if merged == a.1 {
                    a.0
                } else if merged == b.1 {
                    b.0
                } else {
                    match merged {
                        RustType::Bool => ModelKind::Boolean,
                        RustType::JsonValue => ModelKind::Any,
                        _ => ModelKind::String,
                    }
                };
                return Some((i, j, (kind, merged, None), dropped));
            }
        }
        None
    }

    fn variant_names(&self, kinds: &[Kind]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (idx, (_, _, reference)) in kinds.iter().enumerate() {
            let candidate = reference.as_ref().map(|r| model_name(&r.name));
            match candidate {
                Some(name) if !names.contains(&name) => names.push(name),
                _ => names.push(format!("F{}", idx + 1)),
            }
        }
        names
    }

    fn untagged_enum(
        &mut self,
        o: &OneOfType,
        kinds: &[Kind],
        ctx: Ctx<'_>,
    ) -> RustType {
        let reference = match &o.reference {
            Some(r) => r.clone(),
            None => self.anonymous_reference(&DataType::OneOf(o.clone()), ctx),
        };
        let variants = self
            .variant_names(kinds)
            .into_iter()
            .zip(kinds.iter())
            .map(|(name, (_, t, _))| {
                (
                    name,
                    EnumVariant {
                        data_type: t.clone(),
                    },
                )
            })
            .collect();
        self.graph.compounds.insert(
            reference.clone(),
            CompoundType::Enum(EnumType {
                name: self.type_name(&reference),
                description: o.description.clone(),
                variants,
                derives: Vec::new(),
                macros: Vec::new(),
            }),
        );
        RustType::Named(reference)
    }

    fn flag_group(
        &mut self,
        o: &OneOfType,
        kinds: &[Kind],
        ctx: Ctx<'_>,
    ) -> AppResult<RustType> {
        let reference = match &o.reference {
            Some(r) => r.clone(),
            None => self.anonymous_reference(&DataType::OneOf(o.clone()), ctx),
        };
        let names = self.variant_names(kinds);
        let mut string_enum = None;
        let mut list = None;
        for (idx, (_, t, _)) in kinds.iter().enumerate() {
            match t.named().and_then(|r| self.graph.compounds.get(r)) {
                Some(CompoundType::StringEnum(e)) => string_enum = Some((idx, e.clone())),
                _ if t.is_list() => list = Some(t.clone()),
                _ => {}
            }
        }
        let Some((enum_idx, string_enum)) = string_enum else {
            return Err(AppError::UnsupportedSchema(format!(
                "oneOf `{}` has no string enum alternative for a flag group",
                reference
            )));
        };

        let group_field = ctx.field_name.unwrap_or(&reference.name);
        let suffix = local_attribute_name(group_field);
        let flags = string_enum
            .variants
            .iter()
            .map(|(variant, literals)| {
                let literal = literals.first().cloned().unwrap_or_default();
                Flag {
                    local_name: format!(
                        "{}_{}",
                        local_attribute_name(&literal).trim_start_matches('_'),
                        suffix.trim_start_matches('_')
                    ),
                    literal,
                    sdk_value: format!("{}::{}", model_name(&reference.name), variant),
                    macros: Vec::new(),
                }
            })
            .collect();
        let list_field = list.map(|data_type| StructField {
            local_name: suffix.clone(),
            remote_name: group_field.to_string(),
            description: o.description.clone(),
            data_type,
            is_optional: true,
            is_nullable: false,
            macros: Vec::new(),
            min_ver: o.min_ver.clone(),
            max_ver: o.max_ver.clone(),
            original: None,
        });

        self.graph.compounds.insert(
            reference.clone(),
            CompoundType::FlagGroup(FlagGroupType {
                name: self.type_name(&reference),
                description: o.description.clone(),
                flags,
                list_field,
                sdk_enum_name: model_name(&reference.name),
                sdk_parent_enum_variant: names.get(enum_idx).cloned(),
                derives: Vec::new(),
                macros: Vec::new(),
            }),
        );
        Ok(RustType::Named(reference))
    }

    /// Compounds reachable from the root and the parameters, dependencies first.
    fn reachable(&self) -> Vec<Reference> {
        fn visit(
            graph: &TypeGraph,
            reference: &Reference,
            seen: &mut HashSet<Reference>,
            out: &mut Vec<Reference>,
        ) {
            if !seen.insert(reference.clone()) {
                return;
            }
            let Some(compound) = graph.compounds.get(reference) else {
                return;
            };
            for t in compound.member_types() {
                for child in t.references() {
                    visit(graph, child, seen, out);
                }
            }
            out.push(reference.clone());
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for r in self.root.references() {
            visit(&self.graph, r, &mut seen, &mut out);
        }
        for p in self.parameters.values() {
            for r in p.data_type.references() {
                visit(&self.graph, r, &mut seen, &mut out);
            }
        }
        out
    }

    /// Resolves name collisions: keep, append the kind tag, append the member
    /// names, fail.
    fn ensure_unique_names(&mut self) -> AppResult<()> {
        let mut order = self.reachable();
        if let Some(root) = self.root.named() {
            if let Some(pos) = order.iter().position(|r| r == root) {
                let root = order.remove(pos);
                order.insert(0, root);
            }
        }

        let mut owners: HashMap<String, Reference> = HashMap::new();
        for reference in order {
            let Some(compound) = self.graph.compounds.get(&reference) else {
                continue;
            };
            let name = compound.name().to_string();
            let Some(owner) = owners.get(&name).cloned() else {
                owners.insert(name, reference);
                continue;
            };
            if same_shape(self.graph.compounds.get(&owner), Some(compound)) {
                continue;
            }

            let members: String = compound
                .member_names()
                .iter()
                .map(|m| m.to_upper_camel_case())
                .collect();
            let candidates = [
                format!("{}{}", name, compound.kind_tag()),
                format!("{}{}", name, members),
            ];
            let Some(renamed) = candidates
                .into_iter()
                .find(|c| c != &name && !owners.contains_key(c) && !self.name_taken(c))
            else {
                return Err(AppError::DuplicateTypeName {
                    name,
                    first: owner.to_string(),
                    second: reference.to_string(),
                });
            };
            tracing::debug!(from = %name, to = %renamed, "type renamed to stay unique");
            if let Some(compound) = self.graph.compounds.get_mut(&reference) {
                compound.set_name(renamed.clone());
            }
            owners.insert(renamed, reference);
        }
        Ok(())
    }

    fn name_taken(&self, name: &str) -> bool {
        let reachable: HashSet<Reference> = self.reachable().into_iter().collect();
        self.graph
            .compounds
            .iter()
            .any(|(r, c)| reachable.contains(r) && c.name() == name)
    }

    /// Re-applies dialect derives and macros to everything reachable.
    fn decorate(&mut self) {
        let root = self.root.named().cloned();
        for reference in self.reachable() {
            let Some(mut compound) = self.graph.compounds.get(&reference).cloned() else {
                continue;
            };
            self.dialect
                .decorate(&mut compound, &self.graph, Some(&reference) == root.as_ref());
            self.graph.compounds.insert(reference, compound);
        }
        let keys: Vec<String> = self.parameters.keys().cloned().collect();
        for key in keys {
            let Some(mut param) = self.parameters.get(&key).cloned() else {
                continue;
            };
            self.dialect.decorate_parameter(&mut param, &self.graph);
            self.parameters.insert(key, param);
        }
    }
}

/// Same kind and members, names aside.
fn same_shape(a: Option<&CompoundType>, b: Option<&CompoundType>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            let mut b = b.clone();
            b.set_name(a.name().to_string());
            *a == b
        }
        _ => false,
    }
}

fn unsupported_enum(e: &Enum, reference: Option<&Reference>, bases: &[EnumBase]) -> AppError {
    let location = reference
        .map(|r| r.to_string())
        .unwrap_or_else(|| format!("{:?}", e.literals));
    AppError::UnsupportedSchema(format!(
        "Enum `{}` mixes base types {:?}",
        location, bases
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchemaParser;
    use crate::types::{CliDialect, CliResponseDialect, SdkDialect, LIFETIME};
    use serde_json::Value;

    fn parse(yaml: &str) -> ParsedSchema {
        let schema: Value = serde_yaml::from_str(yaml).unwrap();
        SchemaParser::new().parse(&schema).unwrap()
    }

    fn sdk(yaml: &str) -> TypeManager<SdkDialect> {
        let mut tm = TypeManager::<SdkDialect>::new();
        tm.set_models(parse(yaml)).unwrap();
        tm
    }

    fn cli(yaml: &str) -> TypeManager<CliDialect> {
        let mut tm = TypeManager::<CliDialect>::new();
        tm.set_models(parse(yaml)).unwrap();
        tm
    }

    fn root_struct<D: Dialect>(tm: &TypeManager<D>) -> &StructType {
        match tm.root_compound() {
            Some(CompoundType::Struct(s)) => s,
            other => panic!("root is not a struct: {:?}", other),
        }
    }

    fn field_hint<D: Dialect>(tm: &TypeManager<D>, name: &str) -> String {
        root_struct(tm).fields[name].type_hint(tm.graph())
    }

    const SERVER: &str = r#"
type: object
properties:
  server:
    type: object
    properties:
      name: {type: string}
      flavorRef: {oneOf: [{type: string}, {type: integer}]}
      description: {type: [string, "null"], maxLength: 255}
      metadata:
        type: object
        additionalProperties: {type: string}
      networks:
        type: array
        items:
          type: object
          properties:
            uuid: {type: string}
            port: {type: string}
            fixed_ip: {type: string}
            tag: {type: string}
    required: [name, flavorRef]
required: [server]
"#;

    #[test]
    fn test_empty_manager_has_request_root() {
        let tm = TypeManager::<SdkDialect>::new();
        let root = tm.root_compound().unwrap();
        assert_eq!(root.name(), "Request");
        assert!(tm.get_subtypes().is_empty());
    }

    #[test]
    fn test_minimal_object() {
        let tm = sdk(r#"
type: object
properties:
  name: {type: string}
  count: {type: integer}
"#);
        let root = root_struct(&tm);
        assert_eq!(root.fields.len(), 2);
        assert!(root.fields["name"].is_optional);
        assert_eq!(field_hint(&tm, "count"), "Option<i32>");
        assert!(tm.get_subtypes().is_empty());
    }

    #[test]
    fn test_required_field_never_optional() {
        let tm = sdk(r#"
type: object
properties:
  name: {type: [string, "null"]}
required: [name]
"#);
        let field = &root_struct(&tm).fields["name"];
        assert!(field.is_nullable);
        assert!(!field.type_hint(tm.graph()).starts_with("Option<"));
    }

    #[test]
    fn test_sdk_server_body() {
        let tm = sdk(SERVER);
        assert_eq!(field_hint(&tm, "server"), "Server<'a>");
        let server = tm
            .get_subtypes()
            .into_iter()
            .find(|c| c.name() == "Server")
            .cloned()
            .unwrap();
        let CompoundType::Struct(server) = server else {
            panic!("server is not a struct");
        };
        assert_eq!(server.fields["name"].type_hint(tm.graph()), "Cow<'a, str>");
        assert_eq!(server.fields["flavorRef"].type_hint(tm.graph()), "Cow<'a, str>");
        assert_eq!(server.fields["flavorRef"].local_name, "flavor_ref");
        assert_eq!(
            server.fields["description"].type_hint(tm.graph()),
            "Option<Cow<'a, str>>"
        );
        assert_eq!(
            server.fields["metadata"].type_hint(tm.graph()),
            "Option<BTreeMap<Cow<'a, str>, Cow<'a, str>>>"
        );
        assert_eq!(
            server.fields["networks"].type_hint(tm.graph()),
            "Option<Vec<Networks<'a>>>"
        );
        assert!(tm.get_lifetimes().contains(LIFETIME));
    }

    #[test]
    fn test_cli_server_body() {
        let tm = cli(SERVER);
        let subtypes = tm.get_subtypes();
        let Some(CompoundType::Struct(server)) = subtypes.iter().find(|c| c.name() == "Server")
        else {
            panic!("server struct missing");
        };
        assert_eq!(server.fields["name"].type_hint(tm.graph()), "String");
        assert_eq!(server.fields["flavorRef"].type_hint(tm.graph()), "IntString");
        assert_eq!(
            server.fields["metadata"].type_hint(tm.graph()),
            "Option<Vec<(String, String)>>"
        );
        let networks = &server.fields["networks"];
        assert_eq!(networks.type_hint(tm.graph()), "Option<Vec<Value>>");
        assert_eq!(networks.original.as_ref().map(|r| r.name.as_str()), Some("networks"));
        assert!(tm.get_lifetimes().is_empty());
        assert!(!subtypes.iter().any(|c| c.name() == "Networks"));
    }

    #[test]
    fn test_subtypes_unique() {
        let tm = sdk(SERVER);
        let names: Vec<&str> = tm.get_subtypes().iter().map(|c| c.name()).collect();
        let unique: HashSet<&&str> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
        assert!(!names.contains(&"Request"));
    }

    #[test]
    fn test_one_of_string_null() {
        let tm = sdk(r#"
type: object
properties:
  tag: {oneOf: [{type: string}, {type: "null"}]}
required: [tag]
"#);
        let field = &root_struct(&tm).fields["tag"];
        assert_eq!(field.data_type, RustType::BorrowedStr);
        assert!(field.is_nullable);
    }

    #[test]
    fn test_one_of_string_or_list_of_strings() {
        let tm = sdk(r#"
type: object
properties:
  names:
    oneOf:
      - {type: string}
      - {type: array, items: {type: string}}
"#);
        assert_eq!(field_hint(&tm, "names"), "Option<Vec<Cow<'a, str>>>");
    }

    #[test]
    fn test_one_of_string_number_per_dialect() {
        let yaml = r#"
type: object
properties:
  ram: {oneOf: [{type: string}, {type: number}]}
"#;
        assert_eq!(field_hint(&sdk(yaml), "ram"), "Option<Cow<'a, str>>");
        assert_eq!(field_hint(&cli(yaml), "ram"), "Option<NumString>");
    }

    #[test]
    fn test_one_of_string_dictionary_ignores_dictionary() {
        let tm = sdk(r#"
type: object
properties:
  hints:
    oneOf:
      - {type: string}
      - {type: object, additionalProperties: {type: string}}
"#);
        assert_eq!(field_hint(&tm, "hints"), "Option<Value>");
        assert_eq!(tm.ignored_models().count(), 1);
    }

    #[test]
    fn test_irreducible_one_of_becomes_enum() {
        let tm = sdk(r#"
type: object
properties:
  block:
    oneOf:
      - {type: integer}
      - type: object
        properties:
          uuid: {type: string}
"#);
        let subtypes = tm.get_subtypes();
        let Some(CompoundType::Enum(e)) = subtypes.iter().find(|c| c.kind_tag() == "Enum")
        else {
            panic!("enum missing");
        };
        let names: Vec<&str> = e.variants.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["F1", "Block"]);
        assert!(e.macros.contains(&"serde(untagged)".to_string()));
    }

    #[test]
    fn test_string_enum_variants_and_aliases() {
        let tm = sdk(r#"
type: object
properties:
  status: {type: string, enum: [ACTIVE, active, "", 2fa]}
"#);
        let subtypes = tm.get_subtypes();
        let Some(CompoundType::StringEnum(e)) = subtypes.first() else {
            panic!("string enum missing");
        };
        assert_eq!(e.name, "Status");
        assert_eq!(e.variants["Active"], vec!["ACTIVE", "active"]);
        assert!(e.variants.contains_key("Empty"));
        assert!(e.variants.contains_key("_2fa"));
    }

    #[test]
    fn test_mixed_enum_simplified() {
        let yaml = r#"
type: object
properties:
  force: {enum: [true, "True", false, "False"]}
"#;
        assert_eq!(field_hint(&sdk(yaml), "force"), "Option<bool>");
        assert_eq!(field_hint(&cli(yaml), "force"), "Option<String>");
    }

    #[test]
    fn test_three_base_enum_is_unsupported() {
        let mut tm = TypeManager::<SdkDialect>::new();
        let err = tm
            .set_models(parse(r#"
type: object
properties:
  x: {enum: [1, "a", true]}
"#))
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedSchema(_)));
    }

    #[test]
    fn test_cli_flattens_single_field_struct() {
        let tm = cli(r#"
type: object
properties:
  flavor:
    type: object
    properties:
      id: {type: string}
"#);
        let field = &root_struct(&tm).fields["flavor"];
        assert_eq!(field.type_hint(tm.graph()), "Option<String>");
        assert_eq!(field.original.as_ref().map(|r| r.name.as_str()), Some("flavor"));

        let sdk = sdk(r#"
type: object
properties:
  flavor:
    type: object
    properties:
      id: {type: string}
"#);
        assert_eq!(field_hint(&sdk, "flavor"), "Option<Flavor<'a>>");
    }

    #[test]
    fn test_flatten_keeps_struct_of_struct() {
        let tm = cli(r#"
type: object
properties:
  outer:
    type: object
    properties:
      inner:
        type: object
        properties:
          a: {type: string}
          b: {type: string}
"#);
        assert_eq!(field_hint(&tm, "outer"), "Option<Outer>");
    }

    #[test]
    fn test_cli_flag_group() {
        let tm = cli(r#"
type: object
properties:
  networks:
    oneOf:
      - {type: string, enum: [auto, none]}
      - type: array
        items:
          type: object
          properties:
            uuid: {type: string}
            port: {type: string}
"#);
        let subtypes = tm.get_subtypes();
        let Some(CompoundType::FlagGroup(group)) =
            subtypes.iter().find(|c| c.kind_tag() == "FlagGroup")
        else {
            panic!("flag group missing");
        };
        let flags: Vec<&str> = group.flags.iter().map(|f| f.local_name.as_str()).collect();
        assert_eq!(flags, vec!["auto_networks", "none_networks"]);
        assert_eq!(group.flags[0].sdk_value, "Networks::Auto");
        assert_eq!(group.sdk_enum_name, "Networks");
        let list = group.list_field.as_ref().unwrap();
        assert_eq!(list.data_type, RustType::Vec(Box::new(RustType::JsonValue)));
    }

    #[test]
    fn test_cli_response_dialect() {
        let mut tm = TypeManager::<CliResponseDialect>::new();
        tm.set_models(parse(r#"
type: object
properties:
  id: {type: string}
  type: {type: string}
  status: {type: string, enum: [ACTIVE, ERROR]}
  tags: {type: array, items: {type: string}}
  links: {type: array, items: {type: object, properties: {href: {type: string}, rel: {type: string}}}}
  flavor: {type: object, properties: {id: {type: string}, ram: {type: integer}}}
  metadata: {type: object, additionalProperties: {type: string}}
"#))
        .unwrap();
        let root = root_struct(&tm);
        assert_eq!(root.name, "Response");
        assert_eq!(root.fields["status"].data_type, RustType::String);
        assert_eq!(root.fields["tags"].data_type, RustType::VecString);
        assert_eq!(root.fields["links"].data_type, RustType::JsonValue);
        assert_eq!(root.fields["flavor"].data_type, RustType::JsonValue);
        assert_eq!(root.fields["metadata"].data_type, RustType::JsonValue);
        assert_eq!(root.fields["type"].local_name, "_type");
        assert!(tm.get_subtypes().is_empty());
    }

    #[test]
    fn test_name_collision_disambiguated_by_kind() {
        let tm = sdk(r#"
type: object
properties:
  flavor_ref:
    type: object
    properties:
      id: {type: string}
  flavorRef: {type: string, enum: [small, large]}
"#);
        let mut names: Vec<&str> = tm.get_subtypes().iter().map(|c| c.name()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["FlavorRef", "FlavorRefStringEnum"]);
    }

    /// Object holding `count` properties whose nested structs all map to `ServerImage`.
    fn server_image_schema(count: usize) -> String {
        let holders = [
            "  a:\n    type: object\n    properties:\n      server_image: {type: object, properties: {id: {type: string}}}\n",
            "  b:\n    type: object\n    properties:\n      serverImage: {type: object, properties: {name: {type: string}}}\n",
            "  c:\n    type: object\n    properties:\n      server-image: {type: object, properties: {size: {type: integer}}}\n",
            "  d:\n    type: object\n    properties:\n      ServerImage: {type: object, properties: {size: {type: string}}}\n",
        ];
        format!("type: object\nproperties:\n{}", holders[..count].concat())
    }

    /// `ServerImage*` subtypes keyed by their member names.
    fn server_images<D: Dialect>(tm: &TypeManager<D>) -> Vec<(String, Vec<String>)> {
        let mut out: Vec<(String, Vec<String>)> = tm
            .get_subtypes()
            .iter()
            .filter(|c| c.name().starts_with("ServerImage"))
            .map(|c| (c.name().to_string(), c.member_names()))
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_second_collision_gets_kind_tag() {
        let tm = sdk(&server_image_schema(2));
        assert_eq!(
            server_images(&tm),
            vec![
                ("ServerImage".to_string(), vec!["id".to_string()]),
                ("ServerImageStruct".to_string(), vec!["name".to_string()]),
            ]
        );
    }

    #[test]
    fn test_third_collision_gets_member_names() {
        let tm = sdk(&server_image_schema(3));
        assert_eq!(
            server_images(&tm),
            vec![
                ("ServerImage".to_string(), vec!["id".to_string()]),
                ("ServerImageSize".to_string(), vec!["size".to_string()]),
                ("ServerImageStruct".to_string(), vec!["name".to_string()]),
            ]
        );
    }

    #[test]
    fn test_fourth_collision_fails() {
        let mut tm = TypeManager::<SdkDialect>::new();
        let err = tm.set_models(parse(&server_image_schema(4))).unwrap_err();
        assert!(
            matches!(err, AppError::DuplicateTypeName { ref name, .. } if name == "ServerImage"),
            "{:?}",
            err
        );
    }

    #[test]
    fn test_parameters_by_location() {
        let mut tm = TypeManager::<SdkDialect>::new();
        let params = vec![
            RequestParameter {
                name: "id".into(),
                location: ParameterLocation::Path,
                data_type: DataType::string(),
                description: None,
                is_required: true,
                is_flag: false,
                min_ver: None,
                max_ver: None,
            },
            RequestParameter {
                name: "limit".into(),
                location: ParameterLocation::Query,
                data_type: DataType::Primitive(Primitive::Integer(Default::default())),
                description: None,
                is_required: false,
                is_flag: false,
                min_ver: None,
                max_ver: None,
            },
        ];
        tm.set_parameters(&params).unwrap();
        assert_eq!(tm.get_parameters(None).len(), 2);
        let query = tm.get_parameters(Some(ParameterLocation::Query));
        assert_eq!(query.len(), 1);
        assert_eq!(query[0].type_hint(tm.graph()), "Option<i32>");
        assert!(tm.get_lifetimes().contains(LIFETIME));
    }

    #[test]
    fn test_discard_model_cascades() {
        let mut tm = sdk(r#"
type: object
properties:
  outer:
    type: object
    properties:
      inner:
        type: object
        properties:
          a: {type: string}
      b: {type: string}
"#);
        let outer = tm
            .graph()
            .compounds
            .keys()
            .find(|r| r.name == "outer")
            .cloned()
            .unwrap();
        tm.discard_model(&outer);
        let ignored: Vec<&str> = tm.ignored_models().map(|r| r.name.as_str()).collect();
        assert_eq!(ignored, vec!["outer", "inner"]);
        assert!(!tm.graph().compounds.keys().any(|r| r.name == "inner"));
    }

    #[test]
    fn test_imports_union() {
        let tm = sdk(SERVER);
        let imports = tm.get_imports();
        assert!(imports.contains("std::borrow::Cow"));
        assert!(imports.contains("std::collections::BTreeMap"));
        assert!(imports.contains("derive_builder::Builder"));
    }
}

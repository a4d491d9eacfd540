#![deny(missing_docs)]

//! # Data Model
//!
//! - **adt**: the algebraic data-type graph every schema is parsed into.
//! - **hash**: canonical content hashing used for reference identity.
//! - **merge**: deep merge backing `allOf` and `oneOf` inheritance.
//! - **parser**: JSON-Schema to ADT.
//! - **params**: OpenAPI parameters to [`RequestParameter`].

pub mod adt;
pub mod hash;
pub mod merge;
pub mod params;
pub mod parser;

pub use adt::{
    DataType, Dictionary, Enum, EnumBase, ListType, ModelKind, OneOfType, ParameterLocation,
    ParsedSchema, Primitive, PrimitiveNumber, PrimitiveString, Reference, RequestParameter,
    Struct, StructField,
};
pub use params::{merge_parameters, parse_parameter};
pub use parser::SchemaParser;

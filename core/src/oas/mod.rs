#![deny(missing_docs)]

//! # OpenAPI Module
//!
//! - **loader**: document loading, `$ref` inlining and operation lookup.
//! - **normalization**: pre-parse rewrites of legacy schema spellings.
//! - **ref_utils**: JSON Pointer and `$self` handling.
//! - **naming**: type, attribute, resource and module naming rules.
//! - **binder**: operation binding (parameters, bodies, responses).

pub mod binder;
pub mod loader;
pub mod naming;
pub mod normalization;
pub mod ref_utils;

pub use binder::{
    find_resource_schema, BodyVariant, Discriminator, OperationBinder, OperationBinding,
    OperationType,
};
pub use loader::{Document, Operation, OperationRef};

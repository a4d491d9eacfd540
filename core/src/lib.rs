#![deny(missing_docs)]

//! # OpenStack Codegen Core
//!
//! OpenAPI to SDK/CLI code generation pipeline.
//!
//! A document is loaded with its `$ref`s inlined ([`oas::loader`]), one operation
//! is bound ([`oas::binder`]), its body and parameters are parsed into the ADT
//! ([`model`]) and converted into dialect specific target types ([`types`]).
//! The [`generator`] wraps the result into [`emitter`] contexts for templating.

/// Shared error types.
pub mod error;

/// Batch metadata and per-operation overrides.
pub mod config;

/// OpenAPI document handling and operation binding.
pub mod oas;

/// Schema ADT and its parser.
pub mod model;

/// Target type graph and dialects.
pub mod types;

/// Template contexts and declaration preview.
pub mod emitter;

/// Pipeline orchestration.
pub mod generator;

pub use config::{BinderConfig, Metadata, OperationMetadata, OperationOverrides};
pub use emitter::{ModTree, OperationContext, TypesSnapshot};
pub use error::{AppError, AppResult};
pub use generator::{GenerateRequest, Generator, OperationReport};
pub use model::SchemaParser;
pub use oas::{Document, OperationBinder, OperationType};
pub use types::{CliTypeManager, SdkTypeManager, TargetDialect, TypeManager};

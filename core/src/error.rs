//! # Error Handling
//!
//! Provides the unified `AppError` enum used across the workspace.
//!
//! Variants follow the four failure classes of the pipeline: input defects
//! (malformed documents, unresolved references), caller-visible lookup failures,
//! capability gaps of a dialect, and naming collisions. Warnings are not errors
//! and go through `tracing` instead.

use derive_more::{Display, From};

/// The Global Error Enum.
///
/// We use `derive_more` for boilerplate.
/// Note: String errors default to `General`.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// Wrapper for standard IO errors.
    #[display("IO Error: {_0}")]
    Io(std::io::Error),

    /// The document could not be deserialized (YAML or JSON).
    #[from(ignore)]
    #[display("Parse Error: {_0}")]
    Parse(String),

    /// The document is structurally broken (missing `paths`, wrong node kinds, ...).
    #[from(ignore)]
    #[display("Invalid document: {_0}")]
    InvalidDocument(String),

    /// A `$ref` points outside the document or to a missing node.
    #[from(ignore)]
    #[display("Unresolved reference `{_0}`")]
    UnresolvedRef(String),

    /// A schema fragment carries a `type` the parser does not know.
    #[from(ignore)]
    #[display("Cannot determine schema type: {_0}")]
    UnknownSchemaType(String),

    /// No method on any path carries the requested `operationId`.
    #[from(ignore)]
    #[display("Operation `{_0}` not found")]
    OperationNotFound(String),

    /// The operation needs a request body but the document declares none.
    #[from(ignore)]
    #[display("Operation `{_0}` has no request body")]
    NoRequestBody(String),

    /// The request body content type cannot be expressed.
    #[from(ignore)]
    #[display("Unsupported mime type `{_0}`")]
    UnsupportedMimeType(String),

    /// Two distinct schemas ended up with the same target name.
    #[from(ignore)]
    #[display("Duplicate type name `{name}`: {first} collides with {second}")]
    DuplicateTypeName {
        /// The colliding target name.
        name: String,
        /// Reference already owning the name.
        first: String,
        /// Reference that could not be renamed.
        second: String,
    },

    /// A `$ref` chain loops back onto itself.
    #[from(ignore)]
    #[display("Recursive schema: {_0}")]
    RecursiveSchema(String),

    /// A parameter has a location or serialization the generator cannot express.
    #[from(ignore)]
    #[display("Unsupported parameter shape: {_0}")]
    UnsupportedParameterShape(String),

    /// A discriminated body has no variant for the requested selector.
    #[from(ignore)]
    #[display("Discriminator variant missing: {_0}")]
    DiscriminatorVariantMissing(String),

    /// The schema shape cannot be expressed by the selected dialect.
    #[from(ignore)]
    #[display("Unsupported schema: {_0}")]
    UnsupportedSchema(String),

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for AppError {}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;

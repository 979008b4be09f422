//! Error types for the transform engine.
//!
//! The hierarchy mirrors the lifecycle of a transformer:
//!
//! - [`SchemaError`] - loading, parsing and compiling a target schema
//! - [`ConfigError`] - bad rule, operation or method declarations, raised while
//!   the transformer tree is built and never while a document is processed
//! - [`OperationError`] - an operation rejected the value handed to it
//! - [`AssemblyError`] - the output document could not take a value at a path
//! - [`TransformError`] - top-level error of a transform call
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors while loading or compiling a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Failed to read the schema file.
    #[error("Failed to read schema: {0}")]
    Io(#[from] std::io::Error),

    /// Schema (or validated document) is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON schema itself is malformed.
    #[error("Schema could not be compiled: {0}")]
    Compile(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in the declarations embedded in a schema.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Operation name not present in the registry.
    #[error("Unsupported operation {0:?}")]
    UnknownOperation(String),

    /// Operation arguments failed validation.
    #[error("Invalid arguments for operation '{operation}': {message}")]
    InvalidArguments { operation: String, message: String },

    /// Combination method is not first, last or concatenate.
    #[error("Unknown method {0:?}")]
    UnknownMethod(String),

    /// Rule block could not be read.
    #[error("Invalid transform rule: {0}")]
    InvalidRule(String),

    /// Source path is not valid in the input dialect.
    #[error("Invalid source path {path:?}: {message}")]
    InvalidPath { path: String, message: String },

    /// Schema node cannot be turned into a transformer.
    #[error("Invalid schema node at {path}: {message}")]
    InvalidSchema { path: String, message: String },

    /// Static output field with an unusable path.
    #[error("Invalid static field: {0}")]
    InvalidStaticField(#[from] AssemblyError),

    /// Any of the above, annotated with the schema path of the field.
    #[error("{path}: {source}")]
    Field {
        path: String,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    /// Attach the schema path of the field being built.
    pub fn at(self, path: impl Into<String>) -> Self {
        match self {
            already @ ConfigError::Field { .. } => already,
            other => ConfigError::Field {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }
}

// =============================================================================
// Operation Errors
// =============================================================================

/// Errors raised by a value operation.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Input value has the wrong shape for the operation.
    #[error("{operation} expects {expected}, got {found}")]
    UnexpectedInput {
        operation: &'static str,
        expected: &'static str,
        found: String,
    },

    /// Input had the right shape but its content is unusable.
    #[error("{operation} failed: {message}")]
    Failed {
        operation: &'static str,
        message: String,
    },
}

// =============================================================================
// Assembly Errors
// =============================================================================

/// Errors from the output assembler.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Output path could not be parsed.
    #[error("Invalid output path {path:?}: {message}")]
    InvalidPath { path: String, message: String },

    /// The existing document has a different shape than the path implies.
    #[error("Shape conflict at {path}: {message}")]
    ShapeConflict { path: String, message: String },
}

// =============================================================================
// Transform Errors (top-level)
// =============================================================================

/// Top-level error of a transform call.
///
/// `ValidationFailure` is kept apart from the other kinds so callers can tell
/// an upstream data defect (the input simply lacks what the schema requires)
/// from a defect in the transform itself.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Transformer could not be built.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Input document could not be parsed.
    #[error("Failed to parse input: {0}")]
    Input(String),

    /// A value was located but could not be converted.
    #[error("Failed to extract {field} from {path:?}: {message}")]
    Extraction {
        field: String,
        path: String,
        message: String,
    },

    /// An operation rejected its input.
    #[error("Failed operation on {field} with value from {path:?}: {source}")]
    Operation {
        field: String,
        path: String,
        #[source]
        source: OperationError,
    },

    /// Output assembly hit an incompatible structure.
    #[error("Failed to assemble output: {0}")]
    Assembly(#[from] AssemblyError),

    /// The validator could not process the encoded result.
    #[error("Transformed result validation error: {0}")]
    Schema(#[from] SchemaError),

    /// The result does not conform to the target schema.
    #[error("Schema validation of the transformed result reports invalid: {}", .errors.join("; "))]
    ValidationFailure { errors: Vec<String> },

    /// Encoding the result failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransformError {
    /// True when the call failed only because the result did not validate.
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, TransformError::ValidationFailure { .. })
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for transformer construction.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for value operations.
pub type OperationResult<T> = Result<T, OperationError>;

/// Result type for output assembly.
pub type AssemblyResult<T> = Result<T, AssemblyError>;

/// Result type for transform calls.
pub type TransformResult<T> = Result<T, TransformError>;

//! # jstransform - schema-driven document transformation
//!
//! jstransform reshapes JSON or XML documents into the shape declared by a JSON
//! schema. Per-field rules live inside the schema under `transform`, keyed by a
//! transform identifier, so one schema can serve several input feeds.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ JSON / XML  │────▶│   Source    │────▶│ Transformer │────▶│  Validated  │
//! │    input    │     │  (adapter)  │     │    tree     │     │    JSON     │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                            │       ▲
//!                                   rules + operations  output assembler
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jstransform::{JsonTransformer, Schema, Transformer};
//!
//! let schema = Schema::from_file("schemas/image.json")?;
//! let transformer = JsonTransformer::new(schema, "cumulo")?;
//! let out = transformer.transform(input_bytes)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`schema`] - Schema loading, walking and validation
//! - [`transform`] - Rules, sources, transformer tree and entry points
//! - [`validation`] - Validator gate
//! - [`logging`] - Subscriber setup for the CLI

// Core modules
pub mod error;
pub mod schema;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Logging
pub mod logging;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AssemblyError, ConfigError, ConfigResult, OperationError, SchemaError, SchemaResult, TransformError,
    TransformResult,
};

// =============================================================================
// Re-exports - Schema
// =============================================================================

pub use schema::Schema;

// =============================================================================
// Re-exports - DSL
// =============================================================================

pub use transform::dsl::{
    operation_names, operations_description, Method, Operation, OperationDecl, PathDialect, PathRewrite,
    RuleDecl, TransformSpec,
};

// =============================================================================
// Re-exports - Sources and output
// =============================================================================

pub use transform::convert::{DeclaredType, ScalarType};
pub use transform::document::{Document, OutputPath};
pub use transform::source::{Extracted, JsonSource, Source, XmlDocument};
pub use transform::tree::InstanceTransformer;

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    new_transformer, EmptyArrayPolicy, InputFormat, JsonTransformer, StaticField, TransformOptions, Transformer,
    XmlTransformer,
};

//! Transformation module.
//!
//! - DSL: rules, operations and path rewriting
//! - Source: JSON and XML input adapters
//! - Tree: schema-shaped transformer nodes
//! - Document: path-addressed output assembly
//! - Pipeline: transformer entry points

pub mod convert;
pub mod document;
pub mod dsl;
pub mod pipeline;
pub mod source;
pub mod tree;

pub use dsl::*;
pub use pipeline::*;

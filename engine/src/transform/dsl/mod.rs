//! Rule language embedded in target schemas.
//!
//! This module provides:
//! - `operations`: value operations and their registry
//! - `spec`: per-field rules (sources + combination method)
//! - `path`: source path rewriting while arrays are traversed
//!
//! ## Rule Grammar
//!
//! ```text
//! "transform": {
//!   "<identifier>": {
//!     "from": [ { "jsonPath" | "xmlPath" | "path": "...", "operations": [ { "type": "...", "args": {...} } ] } ],
//!     "method": "first" | "last" | "concatenate",
//!     "methodOptions": { "concatenateDelimiter": "..." }
//!   }
//! }
//! ```

pub mod operations;
pub mod path;
pub mod spec;

pub use operations::{operation_names, operations_description, CaseMode, Operation, OperationDecl};
pub use path::{json_to_xpath, PathDialect, PathRewrite};
pub use spec::{Method, MethodOptions, Resolved, RuleDecl, SourceDecl, TransformSpec};

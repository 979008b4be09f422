//! Source adapters: pull raw values out of an input document by path.
//!
//! Both adapters implement [`Source`]. A missing key or node is `Ok(None)`,
//! never an error; errors are reserved for unusable paths and values that
//! exist but cannot be read as the declared type.

mod json;
mod xml;

pub use json::JsonSource;
pub use xml::XmlDocument;

use serde_json::Value;

use crate::transform::convert::DeclaredType;
use crate::transform::dsl::PathDialect;

/// Outcome of a successful extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// Value ready for the operation pipeline
    Value(Value),
    /// Text that matched but could not be converted to the declared type.
    /// Operations may still accept it.
    Unconverted { raw: String, reason: String },
}

/// Check a declared source path for `dialect` without a document.
///
/// JSON paths relative to an array element (`@.name`) are checked as if they
/// were rooted.
pub fn check_path(dialect: PathDialect, path: &str) -> Result<(), String> {
    match dialect {
        PathDialect::JsonPath => match path.strip_prefix('@') {
            Some(rest) => json::parse_path(&format!("${rest}")).map(|_| ()),
            None => json::parse_path(path).map(|_| ()),
        },
        PathDialect::XPath => xml::compile_xpath(path),
    }
}

/// Read access to an input document.
pub trait Source {
    /// Path language this source understands.
    fn dialect(&self) -> PathDialect;

    /// Extract the value at `path`.
    fn extract(&self, path: &str, declared: DeclaredType) -> Result<Option<Extracted>, String>;

    /// Path of element `index` of the sequence located at `path`.
    fn element_path(&self, path: &str, index: usize) -> String;
}

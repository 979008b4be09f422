//! Target schemas.
//!
//! A [`Schema`] keeps the raw JSON schema (with its embedded `transform`
//! blocks) next to a compiled draft 7 validator. Reference resolution is not
//! performed here: `$ref` nodes must be resolved before loading.
//!
//! # Example
//!
//! ```rust,ignore
//! use jstransform::Schema;
//!
//! let schema = Schema::from_file("schemas/image.json")?;
//! schema.walk(|path, def| {
//!     println!("{path}: {}", def["type"]);
//!     Ok::<_, std::convert::Infallible>(())
//! })?;
//! ```

use serde_json::Value;
use std::fmt;
use std::path::Path;

use crate::error::{SchemaError, SchemaResult};

/// A JSON schema with its compiled validator.
pub struct Schema {
    raw: Value,
    validator: jsonschema::Validator,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").field("raw", &self.raw).finish_non_exhaustive()
    }
}

impl Schema {
    pub fn from_value(raw: Value) -> SchemaResult<Self> {
        let validator = jsonschema::draft7::new(&raw).map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Self { raw, validator })
    }

    pub fn from_json(json: &str) -> SchemaResult<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Type of the root node.
    pub fn kind(&self) -> Option<&str> {
        node_type(&self.raw)
    }

    /// Required property names of the object node at `path` (`$`, `$.a`,
    /// `$.list[*].b`, ...). Unknown paths have no required fields.
    pub fn required(&self, path: &str) -> Vec<String> {
        self.node(path).map(required_fields).unwrap_or_default()
    }

    /// Definition of the node at a schema path.
    pub fn node(&self, path: &str) -> Option<&Value> {
        let rest = path.strip_prefix('$')?.replace('[', ".[");
        let mut node = &self.raw;
        for segment in rest.split('.').filter(|s| !s.is_empty()) {
            node = if segment == "[*]" {
                items_of(node)?
            } else {
                node.get("properties")?.get(segment)?
            };
        }
        Some(node)
    }

    /// Visit every node below the root, depth first in declaration order.
    ///
    /// Object properties are reported as `<parent>.<name>`, array elements as
    /// `<parent>[*]`.
    pub fn walk<E>(&self, mut visit: impl FnMut(&str, &Value) -> Result<(), E>) -> Result<(), E> {
        walk_children("$", &self.raw, &mut visit)
    }

    /// Validate an encoded document, returning every violation.
    pub fn validate(&self, encoded: &[u8]) -> SchemaResult<Vec<String>> {
        let instance: Value = serde_json::from_slice(encoded)?;
        Ok(self.validate_value(&instance))
    }

    pub fn validate_value(&self, instance: &Value) -> Vec<String> {
        self.validator.iter_errors(instance).map(|e| e.to_string()).collect()
    }
}

fn walk_children<E>(
    path: &str,
    def: &Value,
    visit: &mut impl FnMut(&str, &Value) -> Result<(), E>,
) -> Result<(), E> {
    if let Some(properties) = def.get("properties").and_then(Value::as_object) {
        for (name, child) in properties {
            let child_path = format!("{path}.{name}");
            visit(&child_path, child)?;
            walk_children(&child_path, child, visit)?;
        }
    }
    if let Some(items) = items_of(def) {
        let child_path = format!("{path}[*]");
        visit(&child_path, items)?;
        walk_children(&child_path, items, visit)?;
    }
    Ok(())
}

/// Element definition of an array node; a tuple `items` uses its first entry.
pub fn items_of(def: &Value) -> Option<&Value> {
    match def.get("items")? {
        Value::Array(tuple) => tuple.first(),
        single @ Value::Object(_) => Some(single),
        _ => None,
    }
}

/// Declared `type` of a node. A list resolves to its first non-null entry.
pub fn node_type(def: &Value) -> Option<&str> {
    match def.get("type")? {
        Value::String(name) => Some(name.as_str()),
        Value::Array(names) => names.iter().filter_map(Value::as_str).find(|n| *n != "null"),
        _ => None,
    }
}

/// Names listed in a node's `required` array.
pub fn required_fields(def: &Value) -> Vec<String> {
    def.get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

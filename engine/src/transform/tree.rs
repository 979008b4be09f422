//! Schema-shaped transformer tree.
//!
//! The tree is built once per (schema, transform identifier) by walking the
//! schema and attaching one node per schema node. At transform time it drives
//! a [`Source`] to pull values and assembles the output document.
//!
//! ```text
//! $                 Object
//! ├── type          Scalar   copy $.type
//! ├── URL           Object
//! │   └── absolute  Scalar   first($.absoluteUrl)
//! └── crops         Array    copy $.crops
//!     └── [*]       Object
//!         └── name  Scalar   copy @.name
//! ```

use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Write as _;

use crate::error::{ConfigError, ConfigResult, TransformError, TransformResult};
use crate::schema::{items_of, node_type, required_fields, Schema};
use crate::transform::convert::{coerce, kind, DeclaredType, ScalarType};
use crate::transform::document::{Document, OutputPath};
use crate::transform::dsl::{Method, PathDialect, PathRewrite, TransformSpec};
use crate::transform::pipeline::EmptyArrayPolicy;
use crate::transform::source::Source;

/// Per-call context handed down the tree.
pub struct Call<'a> {
    pub source: &'a dyn Source,
    pub empty_array: EmptyArrayPolicy,
}

/// A node of the transformer tree.
#[derive(Debug)]
pub enum InstanceTransformer {
    Object(ObjectTransformer),
    Array(ArrayTransformer),
    Scalar(ScalarTransformer),
}

#[derive(Debug)]
pub struct ObjectTransformer {
    path: String,
    children: Vec<Child>,
    required: HashSet<String>,
    is_root: bool,
    /// Created as an ancestor before its own schema node was visited
    implicit: bool,
}

#[derive(Debug)]
struct Child {
    name: String,
    output: OutputPath,
    node: InstanceTransformer,
}

#[derive(Debug)]
pub struct ArrayTransformer {
    path: String,
    spec: TransformSpec,
    element: Option<Box<InstanceTransformer>>,
}

#[derive(Debug)]
pub struct ScalarTransformer {
    path: String,
    spec: TransformSpec,
    ty: ScalarType,
    default: Option<Value>,
}

// =============================================================================
// Construction
// =============================================================================

impl InstanceTransformer {
    /// Build the tree for `identifier`, with source paths in `dialect`. Every
    /// configuration problem in the schema surfaces here.
    pub fn build(schema: &Schema, identifier: &str, dialect: PathDialect) -> ConfigResult<Self> {
        let raw = schema.raw();
        let mut root = if raw.get("properties").is_some() {
            InstanceTransformer::Object(ObjectTransformer {
                path: "$".to_string(),
                children: Vec::new(),
                required: required_fields(raw).into_iter().collect(),
                is_root: true,
                implicit: false,
            })
        } else if items_of(raw).is_some() {
            Self::from_definition("$", raw, identifier, dialect)?
        } else {
            return Err(ConfigError::InvalidSchema {
                path: "$".to_string(),
                message: "no properties nor items found for schema".to_string(),
            });
        };

        schema.walk(|path, def| {
            let node = Self::from_definition(path, def, identifier, dialect).map_err(|e| e.at(path))?;
            root.attach(path, node).map_err(|e| e.at(path))
        })?;

        tracing::debug!(identifier, nodes = root.count(), "built transformer tree");
        Ok(root)
    }

    fn from_definition(path: &str, def: &Value, identifier: &str, dialect: PathDialect) -> ConfigResult<Self> {
        let invalid = |message: String| ConfigError::InvalidSchema {
            path: path.to_string(),
            message,
        };

        let ty = match node_type(def) {
            Some(ty) => ty,
            None if def.get("properties").is_some() => "object",
            None if def.get("items").is_some() => "array",
            None if def.get("$ref").is_some() => {
                return Err(invalid("unresolved $ref, resolve references before loading".to_string()))
            }
            None => return Err(invalid("missing type".to_string())),
        };

        match ty {
            "object" => Ok(InstanceTransformer::Object(ObjectTransformer {
                path: path.to_string(),
                children: Vec::new(),
                required: required_fields(def).into_iter().collect(),
                is_root: path == "$",
                implicit: false,
            })),
            "array" => {
                let spec = TransformSpec::from_schema(def, identifier, path, dialect)?;
                if spec.method() == Method::Concatenate {
                    return Err(ConfigError::InvalidRule(
                        "concatenate cannot produce an array".to_string(),
                    ));
                }
                Ok(InstanceTransformer::Array(ArrayTransformer {
                    path: path.to_string(),
                    spec,
                    element: None,
                }))
            }
            other => {
                let format = def.get("format").and_then(Value::as_str);
                let ty = ScalarType::from_name(other, format)
                    .ok_or_else(|| invalid(format!("unsupported type {other:?}")))?;
                Ok(InstanceTransformer::Scalar(ScalarTransformer {
                    path: path.to_string(),
                    spec: TransformSpec::from_schema(def, identifier, path, dialect)?,
                    ty,
                    default: def.get("default").cloned(),
                }))
            }
        }
    }

    /// Attach `node` at schema path `path`, creating missing object ancestors.
    fn attach(&mut self, path: &str, node: InstanceTransformer) -> ConfigResult<()> {
        let normalized = path.replace('[', ".[");
        let segments: Vec<&str> = normalized.split('.').collect();
        let invalid = |message: &str| ConfigError::InvalidSchema {
            path: path.to_string(),
            message: message.to_string(),
        };
        if segments.first() != Some(&"$") {
            return Err(invalid("paths must start with '$'"));
        }
        let Some((last, parents)) = segments[1..].split_last() else {
            return Err(invalid("cannot attach at the root"));
        };

        let mut parent = self;
        let mut parent_path = String::from("$");
        for segment in parents {
            parent_path.push_str(if segment.starts_with('[') { "" } else { "." });
            parent_path.push_str(segment);
            parent = parent.descend(segment, &parent_path)?;
        }
        parent.add_child(last, node)
    }

    fn descend(&mut self, segment: &str, path: &str) -> ConfigResult<&mut InstanceTransformer> {
        match (self, segment) {
            (InstanceTransformer::Array(array), "[*]") => {
                let element = array.element.get_or_insert_with(|| Box::new(ObjectTransformer::implicit(path)));
                Ok(element.as_mut())
            }
            (InstanceTransformer::Object(object), name) => {
                let pos = match object.children.iter().position(|c| c.name == name) {
                    Some(pos) => pos,
                    None => {
                        object.children.push(Child {
                            name: name.to_string(),
                            output: OutputPath::root().key(name),
                            node: ObjectTransformer::implicit(path),
                        });
                        object.children.len() - 1
                    }
                };
                Ok(&mut object.children[pos].node)
            }
            (other, segment) => Err(ConfigError::InvalidSchema {
                path: path.to_string(),
                message: format!("{} node cannot contain {segment:?}", other.kind_name()),
            }),
        }
    }

    fn add_child(&mut self, segment: &str, node: InstanceTransformer) -> ConfigResult<()> {
        match (self, segment) {
            (InstanceTransformer::Array(array), "[*]") => {
                if array.spec.has_operations() && !matches!(node, InstanceTransformer::Scalar(_)) {
                    return Err(ConfigError::InvalidRule(format!(
                        "operations on array {} produce plain values, its items must be scalars",
                        array.path
                    )));
                }
                array.element = Some(Box::new(node));
                Ok(())
            }
            (InstanceTransformer::Object(object), name) => {
                match object.children.iter_mut().find(|c| c.name == name) {
                    Some(existing) => {
                        let mut node = node;
                        if let (InstanceTransformer::Object(old), InstanceTransformer::Object(new)) =
                            (&mut existing.node, &mut node)
                        {
                            if old.implicit {
                                new.children = std::mem::take(&mut old.children);
                            }
                        }
                        existing.node = node;
                    }
                    None => object.children.push(Child {
                        name: name.to_string(),
                        output: OutputPath::root().key(name),
                        node,
                    }),
                }
                Ok(())
            }
            (other, segment) => Err(ConfigError::InvalidSchema {
                path: segment.to_string(),
                message: format!("{} node cannot have children", other.kind_name()),
            }),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            InstanceTransformer::Object(_) => "object",
            InstanceTransformer::Array(_) => "array",
            InstanceTransformer::Scalar(_) => "scalar",
        }
    }

    fn count(&self) -> usize {
        1 + match self {
            InstanceTransformer::Object(o) => o.children.iter().map(|c| c.node.count()).sum(),
            InstanceTransformer::Array(a) => a.element.as_ref().map_or(0, |e| e.count()),
            InstanceTransformer::Scalar(_) => 0,
        }
    }
}

impl ObjectTransformer {
    fn implicit(path: &str) -> InstanceTransformer {
        InstanceTransformer::Object(ObjectTransformer {
            path: path.to_string(),
            children: Vec::new(),
            required: HashSet::new(),
            is_root: false,
            implicit: true,
        })
    }
}

// =============================================================================
// Transformation
// =============================================================================

impl InstanceTransformer {
    /// Produce this node's output value. `None` means the field is absent.
    pub fn transform(&self, call: &Call<'_>, rewrite: &PathRewrite) -> TransformResult<Option<Value>> {
        match self {
            InstanceTransformer::Object(object) => object.transform(call, rewrite),
            InstanceTransformer::Array(array) => array.transform(call, rewrite),
            InstanceTransformer::Scalar(scalar) => scalar.transform(call, rewrite),
        }
    }

    /// Value stored for a required field that produced nothing.
    pub fn placeholder(&self, policy: EmptyArrayPolicy) -> Value {
        match (self, policy) {
            (InstanceTransformer::Array(_), EmptyArrayPolicy::EmptySequence) => Value::Array(Vec::new()),
            _ => Value::Null,
        }
    }

    fn is_implicit_scalar(&self) -> bool {
        matches!(self, InstanceTransformer::Scalar(s) if s.spec.is_implicit())
    }
}

impl ObjectTransformer {
    fn transform(&self, call: &Call<'_>, rewrite: &PathRewrite) -> TransformResult<Option<Value>> {
        let mut doc = Document::object();
        let mut produced = false;

        for child in &self.children {
            let value = match child.node.transform(call, rewrite)? {
                Some(value) => {
                    produced = true;
                    Some(value)
                }
                None if self.required.contains(&child.name) => Some(child.node.placeholder(call.empty_array)),
                None => None,
            };
            doc.store(&child.output, value)?;
        }

        if produced || self.is_root {
            Ok(Some(doc.into_value()))
        } else {
            tracing::trace!(field = %self.path, "object produced no values");
            Ok(None)
        }
    }
}

impl ArrayTransformer {
    fn transform(&self, call: &Call<'_>, rewrite: &PathRewrite) -> TransformResult<Option<Value>> {
        let Some(resolved) = self.spec.evaluate(call.source, DeclaredType::Array, rewrite, &self.path)? else {
            return Ok(None);
        };
        let items = match resolved.value {
            Value::Array(items) => items,
            other => {
                return Err(TransformError::Extraction {
                    field: self.path.clone(),
                    path: resolved.path,
                    message: format!("expected an array, found {}", kind(&other)),
                })
            }
        };
        if items.is_empty() {
            return Ok(None);
        }

        let mut doc = Document::array();
        for (i, item) in items.into_iter().enumerate() {
            let value = match self.element.as_deref() {
                None => Some(item),
                Some(InstanceTransformer::Scalar(scalar)) if resolved.computed || scalar.spec.is_implicit() => {
                    scalar.coerce_value(item, &resolved.path)?
                }
                Some(element) => {
                    let scoped = rewrite.scoped(call.source.element_path(&resolved.path, i), i);
                    element.transform(call, &scoped)?
                }
            };
            let value = value.or_else(|| self.element.as_deref().map(|e| e.placeholder(call.empty_array)));
            doc.store(&OutputPath::root().index(i), Some(value.unwrap_or(Value::Null)))?;
        }

        tracing::trace!(field = %self.path, path = %resolved.path, "assembled array");
        Ok(Some(doc.into_value()))
    }
}

impl ScalarTransformer {
    fn transform(&self, call: &Call<'_>, rewrite: &PathRewrite) -> TransformResult<Option<Value>> {
        let resolved = self
            .spec
            .evaluate(call.source, DeclaredType::Scalar(self.ty), rewrite, &self.path)?;
        match resolved {
            Some(resolved) => self.coerce_value(resolved.value, &resolved.path),
            None => match &self.default {
                Some(default) => self.coerce_value(default.clone(), "default"),
                None => Ok(None),
            },
        }
    }

    fn coerce_value(&self, value: Value, path: &str) -> TransformResult<Option<Value>> {
        coerce(&value, self.ty).map_err(|message| TransformError::Extraction {
            field: self.path.clone(),
            path: path.to_string(),
            message,
        })
    }
}

// =============================================================================
// Description
// =============================================================================

impl InstanceTransformer {
    /// Render the tree as indented text, one node per line.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_into(&mut out, "$", 0, false);
        out
    }

    fn describe_into(&self, out: &mut String, name: &str, depth: usize, required: bool) {
        let indent = "  ".repeat(depth);
        let marker = if required { "*" } else { "" };
        match self {
            InstanceTransformer::Object(object) => {
                let _ = writeln!(out, "{indent}{name}{marker}: object");
                for child in &object.children {
                    let required = object.required.contains(&child.name);
                    child.node.describe_into(out, &child.name, depth + 1, required);
                }
            }
            InstanceTransformer::Array(array) => {
                let _ = writeln!(out, "{indent}{name}{marker}: array <- {}", array.spec);
                if let Some(element) = &array.element {
                    element.describe_into(out, "[*]", depth + 1, false);
                }
            }
            InstanceTransformer::Scalar(scalar) => {
                let _ = write!(out, "{indent}{name}{marker}: {} <- {}", scalar.ty, scalar.spec);
                if let Some(default) = &scalar.default {
                    let _ = write!(out, " (default {default})");
                }
                out.push('\n');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::source::JsonSource;
    use serde_json::json;

    fn build(schema: Value, identifier: &str) -> ConfigResult<InstanceTransformer> {
        InstanceTransformer::build(&Schema::from_value(schema).unwrap(), identifier, PathDialect::JsonPath)
    }

    fn run(tree: &InstanceTransformer, input: &Value) -> Value {
        let source = JsonSource::new(input);
        let call = Call {
            source: &source,
            empty_array: EmptyArrayPolicy::EmptySequence,
        };
        tree.transform(&call, &PathRewrite::root()).unwrap().unwrap()
    }

    #[test]
    fn test_tree_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InstanceTransformer>();
    }

    #[test]
    fn test_optional_absent_is_omitted_and_required_absent_is_null() {
        let tree = build(
            json!({
                "type": "object",
                "required": ["a"],
                "properties": {
                    "a": {"type": "string"},
                    "b": {"type": "string"},
                    "list": {"type": "array", "items": {"type": "string"}},
                    "nested": {"type": "object", "properties": {"x": {"type": "string"}}}
                }
            }),
            "test",
        )
        .unwrap();
        assert_eq!(run(&tree, &json!({})), json!({"a": null}));
        assert_eq!(
            run(&tree, &json!({"a": "A", "list": [], "nested": {"x": "X"}})),
            json!({"a": "A", "nested": {"x": "X"}})
        );
    }

    #[test]
    fn test_required_empty_array_follows_policy() {
        let tree = build(
            json!({
                "type": "object",
                "required": ["list"],
                "properties": {"list": {"type": "array", "items": {"type": "integer"}}}
            }),
            "test",
        )
        .unwrap();
        let input = json!({"list": []});
        let source = JsonSource::new(&input);

        let call = Call { source: &source, empty_array: EmptyArrayPolicy::EmptySequence };
        assert_eq!(tree.transform(&call, &PathRewrite::root()).unwrap(), Some(json!({"list": []})));

        let call = Call { source: &source, empty_array: EmptyArrayPolicy::Null };
        assert_eq!(tree.transform(&call, &PathRewrite::root()).unwrap(), Some(json!({"list": null})));
    }

    #[test]
    fn test_schema_default_fills_missing_value() {
        let tree = build(
            json!({
                "type": "object",
                "properties": {
                    "outer": {
                        "type": "object",
                        "required": ["inner"],
                        "properties": {"inner": {"type": "integer", "default": 7}}
                    }
                }
            }),
            "test",
        )
        .unwrap();
        assert_eq!(run(&tree, &json!({})), json!({"outer": {"inner": 7}}));
    }

    #[test]
    fn test_array_element_scalar_coercion() {
        let tree = build(
            json!({
                "type": "object",
                "properties": {
                    "ids": {
                        "type": "array",
                        "items": {"type": "string"},
                        "transform": {"test": {"from": [{"jsonPath": "$.people[*].id"}]}}
                    }
                }
            }),
            "test",
        )
        .unwrap();
        assert_eq!(
            run(&tree, &json!({"people": [{"id": 1}, {"id": 2}]})),
            json!({"ids": ["1", "2"]})
        );
    }

    #[test]
    fn test_array_rule_must_locate_an_array() {
        let tree = build(
            json!({
                "type": "object",
                "properties": {"list": {"type": "array", "items": {"type": "string"}}}
            }),
            "test",
        )
        .unwrap();
        let input = json!({"list": "not a list"});
        let source = JsonSource::new(&input);
        let call = Call { source: &source, empty_array: EmptyArrayPolicy::EmptySequence };
        assert!(matches!(
            tree.transform(&call, &PathRewrite::root()),
            Err(TransformError::Extraction { .. })
        ));
    }

    #[test]
    fn test_construction_errors() {
        let unresolved = build(
            json!({
                "type": "object",
                "definitions": {"a": {"type": "string"}},
                "properties": {"a": {"$ref": "#/definitions/a"}}
            }),
            "test",
        );
        assert!(matches!(unresolved, Err(ConfigError::Field { ref path, .. }) if path == "$.a"));

        let concat_array = build(
            json!({"type": "object", "properties": {"a": {
                "type": "array",
                "items": {"type": "string"},
                "transform": {"test": {"from": [{"jsonPath": "$.x"}], "method": "concatenate"}}
            }}}),
            "test",
        );
        assert!(concat_array.is_err());

        assert!(build(json!({"type": "string"}), "test").is_err());

        let computed_objects = build(
            json!({"type": "object", "properties": {"a": {
                "type": "array",
                "items": {"type": "object", "properties": {"x": {"type": "string"}}},
                "transform": {"test": {"from": [{"jsonPath": "$.x", "operations": [{"type": "split", "args": {"on": ","}}]}]}}
            }}}),
            "test",
        );
        assert!(matches!(computed_objects, Err(ConfigError::Field { ref path, .. }) if path == "$.a[*]"));

        let bad_path = build(
            json!({"type": "object", "properties": {"a": {
                "type": "string",
                "transform": {"test": {"from": [{"jsonPath": "$.a["}]}}
            }}}),
            "test",
        );
        assert!(matches!(
            bad_path,
            Err(ConfigError::Field { ref path, ref source }) if path == "$.a" && matches!(**source, ConfigError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_describe() {
        let schema = Schema::from_json(include_str!("../../test_data/image.json")).unwrap();
        let tree = InstanceTransformer::build(&schema, "cumulo", PathDialect::JsonPath).unwrap();
        let text = tree.describe();
        assert!(text.starts_with("$: object\n"));
        assert!(text.contains("  URL: object\n"));
        assert!(text.contains("    absolute*: string <- first($.absoluteUrl)"));
        assert!(text.contains("      name*: string <- copy @.name (default \"name\")"));
    }
}

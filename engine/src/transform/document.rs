//! Path-addressed assembly of output documents.
//!
//! Values are stored at paths such as `$.test1[0].a[1].name`. Missing
//! intermediate objects and arrays are created on the way; arrays grow with
//! `null` placeholders up to the addressed index.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::{AssemblyError, AssemblyResult};
use crate::transform::convert::kind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPath {
    raw: String,
    segments: Vec<Segment>,
}

static PATH_CACHE: Lazy<Mutex<HashMap<String, Arc<OutputPath>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

impl OutputPath {
    /// The document root, `$`.
    pub fn root() -> Self {
        Self {
            raw: "$".to_string(),
            segments: Vec::new(),
        }
    }

    pub fn parse(raw: &str) -> AssemblyResult<Self> {
        let invalid = |message: &str| AssemblyError::InvalidPath {
            path: raw.to_string(),
            message: message.to_string(),
        };
        let mut rest = raw.strip_prefix('$').ok_or_else(|| invalid("must start with '$'"))?;

        let mut segments = Vec::new();
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('.') {
                let end = after.find(['.', '[']).unwrap_or(after.len());
                if end == 0 {
                    return Err(invalid("empty key"));
                }
                segments.push(Segment::Key(after[..end].to_string()));
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('[') {
                let close = after.find(']').ok_or_else(|| invalid("unclosed bracket"))?;
                let index = after[..close]
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| invalid("array segments must be numeric indices"))?;
                segments.push(Segment::Index(index));
                rest = &after[close + 1..];
            } else {
                return Err(invalid("expected '.' or '['"));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Parse through a process-wide cache keyed by the path string.
    pub fn cached(raw: &str) -> AssemblyResult<Arc<Self>> {
        let mut cache = PATH_CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(hit) = cache.get(raw) {
            return Ok(Arc::clone(hit));
        }
        let parsed = Arc::new(Self::parse(raw)?);
        cache.insert(raw.to_string(), Arc::clone(&parsed));
        Ok(parsed)
    }

    pub fn key(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.raw.push('.');
        next.raw.push_str(name);
        next.segments.push(Segment::Key(name.to_string()));
        next
    }

    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.raw.push_str(&format!("[{index}]"));
        next.segments.push(Segment::Index(index));
        next
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for OutputPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// An output document under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Value,
}

impl Document {
    pub fn object() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    pub fn array() -> Self {
        Self {
            root: Value::Array(Vec::new()),
        }
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Store `value` at `path`. `None` leaves the document untouched.
    pub fn store(&mut self, path: &OutputPath, value: Option<Value>) -> AssemblyResult<()> {
        let Some(value) = value else {
            return Ok(());
        };
        store_at(&mut self.root, path.segments(), value, path)
    }

    /// Store at a path given as text, parsed through the path cache.
    pub fn save(&mut self, path: &str, value: Option<Value>) -> AssemblyResult<()> {
        let parsed = OutputPath::cached(path)?;
        self.store(&parsed, value)
    }

    pub fn into_value(self) -> Value {
        self.root
    }
}

fn store_at(slot: &mut Value, segments: &[Segment], value: Value, path: &OutputPath) -> AssemblyResult<()> {
    let Some((segment, rest)) = segments.split_first() else {
        place(slot, value);
        return Ok(());
    };

    match segment {
        Segment::Key(key) => {
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            let found = kind(slot);
            let map = slot.as_object_mut().ok_or_else(|| conflict(path, key, "an object", found))?;
            let child = map.entry(key.clone()).or_insert(Value::Null);
            store_at(child, rest, value, path)
        }
        Segment::Index(index) => {
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            let found = kind(slot);
            let items = slot
                .as_array_mut()
                .ok_or_else(|| conflict(path, &format!("[{index}]"), "an array", found))?;
            if items.len() <= *index {
                items.resize(index + 1, Value::Null);
            }
            store_at(&mut items[*index], rest, value, path)
        }
    }
}

/// Final assignment: maps merge with existing keys winning, anything else
/// overwrites.
fn place(slot: &mut Value, value: Value) {
    match (slot, value) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (k, v) in incoming {
                existing.entry(k).or_insert(v);
            }
        }
        (slot, value) => *slot = value,
    }
}

fn conflict(path: &OutputPath, at: &str, expected: &str, found: &str) -> AssemblyError {
    AssemblyError::ShapeConflict {
        path: path.to_string(),
        message: format!("{at} needs {expected} but the document holds {found}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn saved(tree: Value, path: &str, value: Value) -> Value {
        let mut doc = Document::from_value(tree);
        doc.save(path, Some(value)).unwrap();
        doc.into_value()
    }

    #[test]
    fn test_save_scalars_and_maps() {
        assert_eq!(saved(json!({}), "$.test", json!("string")), json!({"test": "string"}));
        assert_eq!(saved(json!({"test1": 1}), "$.test", json!("string")), json!({"test": "string", "test1": 1}));
        assert_eq!(saved(json!({"test1": 1}), "$.test1", json!("string")), json!({"test1": "string"}));
        assert_eq!(saved(json!({}), "$.test1.test2", json!("string")), json!({"test1": {"test2": "string"}}));
        assert_eq!(saved(json!({}), "$.test1", json!({})), json!({"test1": {}}));
        assert_eq!(
            saved(json!({"test1": {"testA": "a"}}), "$.test1.testB", json!("B")),
            json!({"test1": {"testA": "a", "testB": "B"}})
        );
    }

    #[test]
    fn test_nil_is_a_no_op() {
        let mut doc = Document::object();
        doc.save("$.test", None).unwrap();
        assert_eq!(doc.into_value(), json!({}));
    }

    #[test]
    fn test_save_in_arrays() {
        assert_eq!(saved(json!({"test1": ["a", "b"]}), "$.test1[2]", json!("c")), json!({"test1": ["a", "b", "c"]}));
        assert_eq!(saved(json!({}), "$.test1[0].a", json!("aValue")), json!({"test1": [{"a": "aValue"}]}));
        assert_eq!(
            saved(json!({"test1": [{"a": "aValue"}]}), "$.test1[0].b", json!("bValue")),
            json!({"test1": [{"a": "aValue", "b": "bValue"}]})
        );
        assert_eq!(
            saved(json!({"test1": [{"a": "aValue"}]}), "$.test1[1].a", json!("a2ndValue")),
            json!({"test1": [{"a": "aValue"}, {"a": "a2ndValue"}]})
        );
    }

    #[test]
    fn test_nested_arrays_fill_with_null() {
        assert_eq!(saved(json!({}), "$.test1[0][1]", json!("nestedValue")), json!({"test1": [[null, "nestedValue"]]}));
        assert_eq!(
            saved(json!({}), "$.test1[0].a[1].name", json!("nestedName")),
            json!({"test1": [{"a": [null, {"name": "nestedName"}]}]})
        );
        assert_eq!(
            saved(json!({"test1": [{"a": ["existingValue"]}]}), "$.test1[0].a[1]", json!("nestedValue")),
            json!({"test1": [{"a": ["existingValue", "nestedValue"]}]})
        );
    }

    #[test]
    fn test_map_merge_keeps_existing_keys() {
        let merged = saved(json!({"m": {"a": 1, "b": 2}}), "$.m", json!({"b": 20, "c": 30}));
        assert_eq!(merged, json!({"m": {"a": 1, "b": 2, "c": 30}}));
    }

    #[test]
    fn test_map_merge_at_index_slot() {
        let mut doc = Document::object();
        doc.save("$.x[0]", Some(json!({"a": "1"}))).unwrap();
        doc.save("$.x[0]", Some(json!({"b": "2"}))).unwrap();
        doc.save("$.x[0]", Some(json!({"a": "other"}))).unwrap();
        assert_eq!(doc.into_value(), json!({"x": [{"a": "1", "b": "2"}]}));
    }

    #[test]
    fn test_shape_conflict() {
        let mut doc = Document::from_value(json!({"a": "text"}));
        let err = doc.save("$.a.b", Some(json!(1))).unwrap_err();
        assert!(matches!(err, AssemblyError::ShapeConflict { ref path, .. } if path == "$.a.b"));

        let mut doc = Document::from_value(json!({"a": {}}));
        assert!(doc.save("$.a[0]", Some(json!(1))).is_err());
    }

    #[test]
    fn test_path_parsing_and_cache() {
        let p = OutputPath::parse("$.test1[0].a").unwrap();
        assert_eq!(
            p.segments(),
            &[Segment::Key("test1".into()), Segment::Index(0), Segment::Key("a".into())]
        );
        assert_eq!(OutputPath::root().key("test1").index(0).key("a"), p);
        assert!(OutputPath::parse("test").is_err());
        assert!(OutputPath::parse("$.a[*]").is_err());

        let first = OutputPath::cached("$.cached.path").unwrap();
        let second = OutputPath::cached("$.cached.path").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}

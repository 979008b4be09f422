//! Transformer entry points.
//!
//! A transformer is compiled once from a schema and a transform identifier,
//! then applied to any number of input documents:
//!
//! ```rust,ignore
//! use jstransform::{JsonTransformer, Schema, Transformer};
//!
//! let schema = Schema::from_file("image.json")?;
//! let transformer = JsonTransformer::new(schema, "cumulo")?;
//! let out = transformer.transform(br#"{"type": "image", "crops": []}"#)?;
//! ```
//!
//! Each call runs the tree, layers static fields on top, serializes the result
//! and checks it against the schema before returning it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{ConfigResult, TransformError, TransformResult};
use crate::schema::Schema;
use crate::transform::document::{Document, OutputPath};
use crate::transform::dsl::{PathDialect, PathRewrite};
use crate::transform::source::{JsonSource, Source, XmlDocument};
use crate::transform::tree::{Call, InstanceTransformer};
use crate::validation;

// =============================================================================
// Options
// =============================================================================

/// What a required array with zero elements turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptyArrayPolicy {
    /// `[]`
    #[default]
    EmptySequence,
    /// `null`
    Null,
}

/// A value written into every result at a fixed output path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticField {
    pub path: String,
    pub value: Value,
}

/// Options for a transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformOptions {
    /// Check the result against the schema before returning it
    pub validate: bool,

    pub empty_required_array: EmptyArrayPolicy,

    /// Stored after the tree ran; existing object keys win on merge
    pub static_fields: Vec<StaticField>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            validate: true,
            empty_required_array: EmptyArrayPolicy::default(),
            static_fields: Vec::new(),
        }
    }
}

/// Input document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Json,
    Xml,
}

// =============================================================================
// Transformers
// =============================================================================

/// Converts raw input bytes into schema-conforming JSON.
pub trait Transformer: Send + Sync {
    fn transform(&self, raw: &[u8]) -> TransformResult<Vec<u8>>;
}

/// State shared by the JSON and XML transformers.
#[derive(Debug)]
struct Compiled {
    schema: Arc<Schema>,
    identifier: String,
    root: InstanceTransformer,
    options: TransformOptions,
    static_fields: Vec<(Arc<OutputPath>, Value)>,
}

impl Compiled {
    fn new(schema: Arc<Schema>, identifier: &str, dialect: PathDialect, options: TransformOptions) -> ConfigResult<Self> {
        let root = InstanceTransformer::build(&schema, identifier, dialect)?;
        let static_fields = options
            .static_fields
            .iter()
            .map(|field| -> ConfigResult<(Arc<OutputPath>, Value)> {
                Ok((OutputPath::cached(&field.path)?, field.value.clone()))
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(Self {
            schema,
            identifier: identifier.to_string(),
            root,
            options,
            static_fields,
        })
    }

    fn run(&self, source: &dyn Source) -> TransformResult<(Value, Vec<u8>)> {
        let span = tracing::debug_span!("transform", identifier = %self.identifier);
        let _enter = span.enter();

        let call = Call {
            source,
            empty_array: self.options.empty_required_array,
        };
        let transformed = self
            .root
            .transform(&call, &PathRewrite::root())?
            .unwrap_or_else(|| self.root.placeholder(self.options.empty_required_array));

        let mut doc = Document::from_value(transformed);
        for (path, value) in &self.static_fields {
            doc.store(path, Some(value.clone()))?;
        }
        let out = doc.into_value();

        let encoded = serde_json::to_vec(&out)?;
        if self.options.validate {
            validation::gate(&self.schema, &encoded)?;
        }
        tracing::debug!(bytes = encoded.len(), "transform complete");
        Ok((out, encoded))
    }
}

/// Transformer for JSON input.
#[derive(Debug)]
pub struct JsonTransformer {
    inner: Compiled,
}

impl JsonTransformer {
    pub fn new(schema: impl Into<Arc<Schema>>, identifier: &str) -> ConfigResult<Self> {
        Self::with_options(schema, identifier, TransformOptions::default())
    }

    pub fn with_options(
        schema: impl Into<Arc<Schema>>,
        identifier: &str,
        options: TransformOptions,
    ) -> ConfigResult<Self> {
        Ok(Self {
            inner: Compiled::new(schema.into(), identifier, PathDialect::JsonPath, options)?,
        })
    }

    /// Transform an already parsed document.
    pub fn transform_value(&self, input: &Value) -> TransformResult<Value> {
        self.inner.run(&JsonSource::new(input)).map(|(value, _)| value)
    }

    /// Text description of the compiled tree.
    pub fn describe(&self) -> String {
        self.inner.root.describe()
    }
}

impl Transformer for JsonTransformer {
    fn transform(&self, raw: &[u8]) -> TransformResult<Vec<u8>> {
        let input: Value =
            serde_json::from_slice(raw).map_err(|e| TransformError::Input(format!("invalid JSON: {e}")))?;
        self.inner.run(&JsonSource::new(&input)).map(|(_, encoded)| encoded)
    }
}

/// Transformer for XML input. Rule paths are XPath expressions.
#[derive(Debug)]
pub struct XmlTransformer {
    inner: Compiled,
}

impl XmlTransformer {
    pub fn new(schema: impl Into<Arc<Schema>>, identifier: &str) -> ConfigResult<Self> {
        Self::with_options(schema, identifier, TransformOptions::default())
    }

    pub fn with_options(
        schema: impl Into<Arc<Schema>>,
        identifier: &str,
        options: TransformOptions,
    ) -> ConfigResult<Self> {
        Ok(Self {
            inner: Compiled::new(schema.into(), identifier, PathDialect::XPath, options)?,
        })
    }

    /// Transform an XML document given as text.
    pub fn transform_str(&self, xml: &str) -> TransformResult<Value> {
        let doc = XmlDocument::parse(xml).map_err(TransformError::Input)?;
        self.inner.run(&doc).map(|(value, _)| value)
    }

    pub fn describe(&self) -> String {
        self.inner.root.describe()
    }
}

impl Transformer for XmlTransformer {
    fn transform(&self, raw: &[u8]) -> TransformResult<Vec<u8>> {
        let text = std::str::from_utf8(raw).map_err(|e| TransformError::Input(format!("input is not UTF-8: {e}")))?;
        let doc = XmlDocument::parse(text).map_err(TransformError::Input)?;
        self.inner.run(&doc).map(|(_, encoded)| encoded)
    }
}

/// Build a transformer for the given input format.
pub fn new_transformer(
    schema: impl Into<Arc<Schema>>,
    identifier: &str,
    format: InputFormat,
    options: TransformOptions,
) -> ConfigResult<Box<dyn Transformer>> {
    Ok(match format {
        InputFormat::Json => Box::new(JsonTransformer::with_options(schema, identifier, options)?),
        InputFormat::Xml => Box::new(XmlTransformer::with_options(schema, identifier, options)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use serde_json::json;

    fn schema(fixture: &str) -> Schema {
        Schema::from_json(fixture).unwrap()
    }

    fn image() -> JsonTransformer {
        JsonTransformer::new(schema(include_str!("../../test_data/image.json")), "cumulo").unwrap()
    }

    #[test]
    fn test_basic_copy_and_default() {
        let input = json!({
            "type": "image",
            "crops": [
                {"height": 0, "path": "path", "relativePath": "", "width": 0},
                {"name": "aname", "height": 0, "path": "empty", "relativePath": "empty", "width": 0}
            ],
            "publishUrl": "publishURL",
            "absoluteUrl": "absoluteURL"
        });
        let out = image().transform_value(&input).unwrap();
        assert_eq!(
            out,
            json!({
                "URL": {"absolute": "absoluteURL", "publish": "publishURL"},
                "crops": [
                    {"height": 0, "name": "name", "path": "path", "relativePath": "", "width": 0},
                    {"height": 0, "name": "aname", "path": "empty", "relativePath": "empty", "width": 0}
                ],
                "type": "image"
            })
        );
    }

    #[test]
    fn test_input_too_simple_fails_validation() {
        let input = br#"{
            "type": "image",
            "crops": [{"path": "path"}, {"name": "aname", "relativePath": "empty"}],
            "publishUrl": "publishURL",
            "absoluteUrl": "absoluteURL"
        }"#;
        let err = image().transform(input).unwrap_err();
        assert!(err.is_validation_failure(), "{err}");
    }

    #[test]
    fn test_empty_optional_object_is_omitted() {
        let input = json!({
            "type": "image",
            "crops": [{"height": 1, "path": "p", "relativePath": "r", "width": 2}]
        });
        let out = image().transform_value(&input).unwrap();
        assert!(out.get("URL").is_none());
        assert_eq!(out["crops"][0]["name"], json!("name"));
    }

    #[test]
    fn test_array_transforms() {
        let tr = JsonTransformer::new(schema(include_str!("../../test_data/array-transforms.json")), "cumulo").unwrap();
        let input = json!({
            "type": "image",
            "data": {
                "contributors": [{"id": 1, "fullname": "one"}, {"id": 2, "fullname": "two"}],
                "lines": ["line1", "line2"]
            },
            "aSingleObject": [{"id": 1, "name": "test1"}]
        });
        assert_eq!(
            tr.transform_value(&input).unwrap(),
            json!({
                "contributors": [{"id": "1", "name": "one"}, {"id": "2", "name": "two"}],
                "lines": ["line1", "line2"],
                "wasSingleObject": [{"id": "1", "name": "test1"}]
            })
        );

        // Missing optional array is left out.
        let input = json!({"data": {"lines": ["line1"]}});
        assert_eq!(tr.transform_value(&input).unwrap(), json!({"lines": ["line1"]}));
    }

    #[test]
    fn test_all_operations() {
        let tr = JsonTransformer::new(schema(include_str!("../../test_data/operations.json")), "cumulo").unwrap();
        let input = json!({
            "type": "image",
            "data": {
                "attributes": [{"name": "length", "value": "00:13"}],
                "contributors": [{"id": 1, "fullname": "one"}, {"id": 2, "fullname": "two"}]
            },
            "mixedCase": "a|B|c|D",
            "invalid": false,
            "url": "http://foo.com/blah"
        });
        assert_eq!(
            tr.transform_value(&input).unwrap(),
            json!({
                "caseSplit": ["a", "b", "c", "d"],
                "contributor": "two",
                "duration": 13,
                "url": "http://gannettdigital.com/blah",
                "valid": true,
                "maxId": 2,
                "names": "one, two"
            })
        );
    }

    #[test]
    fn test_nested_arrays() {
        let tr = JsonTransformer::new(schema(include_str!("../../test_data/double-array.json")), "cumulo").unwrap();
        let input = json!({
            "data": {"double": [["1-1", "1-2"], ["2-1", "2-2"]]},
            "array1": [
                {"name": "array1-1", "array2": [{"name": "array1-1-1"}, {"name": "array1-1-2"}]},
                {"name": "array1-2", "array2": [{"name": "array1-2-1"}]}
            ]
        });
        assert_eq!(
            tr.transform_value(&input).unwrap(),
            json!({
                "array1": [
                    {"array2": [{"level2Name": "array1-1-1"}, {"level2Name": "array1-1-2"}], "level1Name": "array1-1"},
                    {"array2": [{"level2Name": "array1-2-1"}], "level1Name": "array1-2"}
                ],
                "double": [["1-1", "1-2"], ["2-1", "2-2"]]
            })
        );
    }

    #[test]
    fn test_date_times() {
        let tr = JsonTransformer::new(schema(include_str!("../../test_data/date-times.json")), "cumulo").unwrap();
        let out = tr
            .transform(br#"{"dates": [1529958073, "2018-06-25T20:21:13Z"], "requiredDate": "2018-06-25T20:21:13Z", "optionalDate": ""}"#)
            .unwrap();
        let out: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(
            out,
            json!({
                "dates": ["2018-06-25T20:21:13Z", "2018-06-25T20:21:13Z"],
                "requiredDate": "2018-06-25T20:21:13Z"
            })
        );
    }

    #[test]
    fn test_xml_teams() {
        let tr = XmlTransformer::new(schema(include_str!("../../test_data/teams.json")), "sport").unwrap();
        let out = tr.transform_str(include_str!("../../test_data/teams.xml")).unwrap();
        assert_eq!(
            out,
            json!({
                "league": "Premier",
                "founded": 1992,
                "teams": [
                    {"id": 1, "name": "Arsenal", "city": "London", "retired": false, "bestScore": 4},
                    {"id": 2, "name": "Everton & Co", "retired": true, "bestScore": 7}
                ]
            })
        );
    }

    #[test]
    fn test_new_transformer_by_format() {
        let tr = new_transformer(
            schema(include_str!("../../test_data/teams.json")),
            "sport",
            InputFormat::Xml,
            TransformOptions::default(),
        )
        .unwrap();
        let out = tr.transform(include_str!("../../test_data/teams.xml").as_bytes()).unwrap();
        let out: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(out["teams"][1]["name"], json!("Everton & Co"));

        assert!(matches!(tr.transform(b"<league>"), Err(TransformError::Input(_))));
    }

    #[test]
    fn test_malformed_source_path_fails_construction() {
        let bad = schema(r#"{
            "type": "object",
            "properties": {"a": {"type": "string", "transform": {"feed": {"from": [{"jsonPath": "$.a["}]}}}}
        }"#);
        let err = JsonTransformer::new(bad, "feed").unwrap_err();
        assert!(err.to_string().contains("$.a"), "{err}");
        assert!(matches!(err, ConfigError::Field { .. }));

        let bad_xml = schema(r#"{
            "type": "object",
            "properties": {"a": {"type": "string", "transform": {"feed": {"from": [{"xmlPath": "/a/"}]}}}}
        }"#);
        assert!(XmlTransformer::new(bad_xml, "feed").is_err());
    }

    #[test]
    fn test_bad_input_is_an_input_error() {
        assert!(matches!(image().transform(b"{nope"), Err(TransformError::Input(_))));
    }

    #[test]
    fn test_static_fields_and_disabled_validation() {
        let options: TransformOptions = serde_json::from_value(json!({
            "validate": false,
            "staticFields": [
                {"path": "$.source", "value": "feed"},
                {"path": "$.URL", "value": {"absolute": "ignored", "extra": true}}
            ]
        }))
        .unwrap();
        assert_eq!(options.empty_required_array, EmptyArrayPolicy::EmptySequence);

        let tr = JsonTransformer::with_options(schema(include_str!("../../test_data/image.json")), "cumulo", options).unwrap();
        let out = tr
            .transform_value(&json!({"type": "image", "absoluteUrl": "abs", "publishUrl": "pub"}))
            .unwrap();
        assert_eq!(out["source"], json!("feed"));
        assert_eq!(out["URL"], json!({"absolute": "abs", "publish": "pub", "extra": true}));
        // Validation is off, so the missing crops array is tolerated.
        assert_eq!(out["crops"], json!([]));
    }

    #[test]
    fn test_invalid_static_field_path() {
        let options = TransformOptions {
            static_fields: vec![StaticField {
                path: "source".into(),
                value: json!(1),
            }],
            ..TransformOptions::default()
        };
        let err = JsonTransformer::with_options(schema(include_str!("../../test_data/image.json")), "cumulo", options)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStaticField(_)));
    }

    #[test]
    fn test_unknown_identifier_copies_verbatim() {
        let tr = JsonTransformer::new(schema(include_str!("../../test_data/array-transforms.json")), "other").unwrap();
        let input = json!({"lines": ["a"], "contributors": [{"id": "7", "name": "n"}]});
        assert_eq!(
            tr.transform_value(&input).unwrap(),
            json!({"lines": ["a"], "contributors": [{"id": "7", "name": "n"}]})
        );
    }
}

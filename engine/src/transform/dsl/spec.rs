//! Per-field transform rules.
//!
//! A schema node carries its rules under `transform.<identifier>`:
//!
//! ```json
//! "transform": {
//!   "cumulo": {
//!     "from": [
//!       { "jsonPath": "$.data.contributors[0].fullname" },
//!       { "jsonPath": "$.data.contributors[1].fullname" }
//!     ],
//!     "method": "last"
//!   }
//! }
//! ```
//!
//! A node without a rule for the requested identifier gets an implicit rule
//! that copies from the node's own schema path.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::operations::{Operation, OperationDecl};
use super::path::{json_to_xpath, PathDialect, PathRewrite};
use crate::error::{ConfigError, ConfigResult, TransformError, TransformResult};
use crate::transform::convert::{as_text, DeclaredType, ScalarType};
use crate::transform::source::{check_path, Extracted, Source};

// =============================================================================
// Declarations (as written in the schema)
// =============================================================================

/// Rule block for one identifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDecl {
    #[serde(default)]
    pub from: Vec<SourceDecl>,

    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub method_options: MethodOptions,
}

/// One entry of `from`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDecl {
    #[serde(alias = "jsonPath", alias = "xmlPath")]
    pub path: String,

    #[serde(default)]
    pub operations: Vec<OperationDecl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodOptions {
    #[serde(default)]
    pub concatenate_delimiter: String,
}

// =============================================================================
// Compiled rules
// =============================================================================

/// How the results of several sources are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// First non-nil result in declared order
    #[default]
    First,
    /// First non-nil result in reverse declared order
    Last,
    /// Every non-nil result joined as text
    Concatenate,
}

impl Method {
    pub fn parse(name: Option<&str>) -> ConfigResult<Self> {
        match name.unwrap_or("") {
            "" | "first" => Ok(Method::First),
            "last" => Ok(Method::Last),
            "concatenate" => Ok(Method::Concatenate),
            other => Err(ConfigError::UnknownMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceSpec {
    path: String,
    operations: Vec<Operation>,
}

/// Compiled rule of one schema node.
#[derive(Debug, Clone)]
pub struct TransformSpec {
    sources: Vec<SourceSpec>,
    method: Method,
    delimiter: String,
    implicit: bool,
}

/// A value produced by a rule, with the source path it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    /// Rewritten path of the winning source
    pub path: String,
    /// True when operations or concatenation shaped the value
    pub computed: bool,
}

impl TransformSpec {
    /// Compile the rule of a schema node for `identifier`. Source paths are
    /// checked against `dialect` here, so a malformed path never reaches a call.
    pub fn from_schema(def: &Value, identifier: &str, schema_path: &str, dialect: PathDialect) -> ConfigResult<Self> {
        match def.get("transform").and_then(|t| t.get(identifier)) {
            Some(rule) => {
                let decl: RuleDecl =
                    serde_json::from_value(rule.clone()).map_err(|e| ConfigError::InvalidRule(e.to_string()))?;
                Self::from_decl(&decl, dialect)
            }
            None => Ok(Self::implicit(schema_path, dialect)),
        }
    }

    pub fn from_decl(decl: &RuleDecl, dialect: PathDialect) -> ConfigResult<Self> {
        if decl.from.is_empty() {
            return Err(ConfigError::InvalidRule("'from' must list at least one source".into()));
        }
        let method = Method::parse(decl.method.as_deref())?;
        let sources = decl
            .from
            .iter()
            .map(|s| -> ConfigResult<SourceSpec> {
                check_path(dialect, &s.path).map_err(|message| ConfigError::InvalidPath {
                    path: s.path.clone(),
                    message,
                })?;
                let operations = s.operations.iter().map(OperationDecl::build).collect::<ConfigResult<Vec<_>>>()?;
                Ok(SourceSpec {
                    path: s.path.clone(),
                    operations,
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            sources,
            method,
            delimiter: decl.method_options.concatenate_delimiter.clone(),
            implicit: false,
        })
    }

    /// Copy from the node's own location. Inside arrays the path is relative
    /// to the innermost element. XML sources get the XPath form.
    pub fn implicit(schema_path: &str, dialect: PathDialect) -> Self {
        let path = match schema_path.rfind("[*]") {
            Some(pos) => format!("@{}", &schema_path[pos + 3..]),
            None => schema_path.to_string(),
        };
        let path = match dialect {
            PathDialect::JsonPath => path,
            PathDialect::XPath => json_to_xpath(&path),
        };
        Self {
            sources: vec![SourceSpec {
                path,
                operations: Vec::new(),
            }],
            method: Method::First,
            delimiter: String::new(),
            implicit: true,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    /// True when any source runs operations on its value.
    pub fn has_operations(&self) -> bool {
        self.sources.iter().any(|s| !s.operations.is_empty())
    }

    /// Evaluate the rule against a source.
    ///
    /// `field` is the schema path of the node, used to annotate errors.
    pub fn evaluate(
        &self,
        source: &dyn Source,
        declared: DeclaredType,
        rewrite: &PathRewrite,
        field: &str,
    ) -> TransformResult<Option<Resolved>> {
        match self.method {
            Method::First => self.first_of(self.sources.iter(), source, declared, rewrite, field),
            Method::Last => self.first_of(self.sources.iter().rev(), source, declared, rewrite, field),
            Method::Concatenate => self.concatenate(source, rewrite, field),
        }
    }

    fn first_of<'s>(
        &self,
        sources: impl Iterator<Item = &'s SourceSpec>,
        source: &dyn Source,
        declared: DeclaredType,
        rewrite: &PathRewrite,
        field: &str,
    ) -> TransformResult<Option<Resolved>> {
        for spec in sources {
            if let Some(resolved) = spec.resolve(source, declared, rewrite, field)? {
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }

    fn concatenate(&self, source: &dyn Source, rewrite: &PathRewrite, field: &str) -> TransformResult<Option<Resolved>> {
        let declared = DeclaredType::Scalar(ScalarType::String);
        let mut parts = Vec::with_capacity(self.sources.len());
        let mut first_path = None;
        for spec in &self.sources {
            if let Some(resolved) = spec.resolve(source, declared, rewrite, field)? {
                parts.push(as_text(&resolved.value).unwrap_or_else(|| resolved.value.to_string()));
                first_path.get_or_insert(resolved.path);
            }
        }
        Ok(first_path.map(|path| Resolved {
            value: Value::String(parts.join(&self.delimiter)),
            path,
            computed: true,
        }))
    }
}

impl SourceSpec {
    fn resolve(
        &self,
        source: &dyn Source,
        declared: DeclaredType,
        rewrite: &PathRewrite,
        field: &str,
    ) -> TransformResult<Option<Resolved>> {
        let path = rewrite.apply(&self.path, source.dialect()).into_owned();

        let extracted = source.extract(&path, declared).map_err(|message| TransformError::Extraction {
            field: field.to_string(),
            path: path.clone(),
            message,
        })?;

        let mut value = match extracted {
            None => return Ok(None),
            Some(Extracted::Value(v)) => v,
            Some(Extracted::Unconverted { raw, reason }) => {
                if self.operations.is_empty() {
                    return Err(TransformError::Extraction {
                        field: field.to_string(),
                        path,
                        message: reason,
                    });
                }
                tracing::debug!(field, path = %path, %reason, "handing unconverted text to operations");
                Value::String(raw)
            }
        };

        for op in &self.operations {
            if value.is_null() {
                break;
            }
            value = op.apply(&value).map_err(|source| TransformError::Operation {
                field: field.to_string(),
                path: path.clone(),
                source,
            })?;
        }

        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(Resolved {
            value,
            path,
            computed: !self.operations.is_empty(),
        }))
    }
}

impl fmt::Display for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self.method {
            Method::First => "first",
            Method::Last => "last",
            Method::Concatenate => "concatenate",
        };
        let sources: Vec<String> = self
            .sources
            .iter()
            .map(|s| {
                let mut out = s.path.clone();
                for op in &s.operations {
                    out.push_str(" | ");
                    out.push_str(op.name());
                }
                out
            })
            .collect();
        if self.implicit {
            write!(f, "copy {}", sources.join(", "))
        } else {
            write!(f, "{}({})", method, sources.join(", "))
        }
    }
}

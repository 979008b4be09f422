//! Value operations applied to extracted values.
//!
//! Operations are declared inside a rule's `from` entry:
//!
//! ```json
//! "operations": [
//!   { "type": "changeCase", "args": { "to": "lower" } },
//!   { "type": "split", "args": { "on": "|" } }
//! ]
//! ```
//!
//! Each declaration is resolved through a name -> constructor registry when the
//! transformer is built, so bad names and bad arguments surface before any
//! document is processed. Applying an operation is pure.

use convert_case::{Case, Casing};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

use crate::error::{ConfigError, ConfigResult, OperationError, OperationResult};
use crate::transform::convert::{as_text, kind};

/// Arguments of an operation declaration.
pub type Args = Map<String, Value>;

/// An operation as written in the schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDecl {
    #[serde(rename = "type")]
    pub name: String,
    #[serde(default)]
    pub args: Args,
}

/// Target of the `changeCase` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    Lower,
    Upper,
    Title,
    Camel,
    Pascal,
    Snake,
    Kebab,
}

/// A validated operation.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Change the case of a text
    ChangeCase(CaseMode),

    /// `MM:SS` or `HH:MM:SS` to whole seconds
    Duration,

    /// Negate a boolean
    Inverse,

    /// Largest number of a sequence or delimited text
    Max { delimiter: String },

    /// Replace every match of a pattern
    Replace { pattern: Regex, replacement: String },

    /// Split text, optionally keeping a single element
    Split { on: String, index: Option<usize> },
}

type Constructor = fn(&Args) -> ConfigResult<Operation>;

static REGISTRY: Lazy<BTreeMap<&'static str, Constructor>> = Lazy::new(|| {
    let mut table: BTreeMap<&'static str, Constructor> = BTreeMap::new();
    table.insert("changeCase", init_change_case);
    table.insert("duration", |_| Ok(Operation::Duration));
    table.insert("inverse", |_| Ok(Operation::Inverse));
    table.insert("max", init_max);
    table.insert("replace", init_replace);
    table.insert("split", init_split);
    table
});

/// Names of every registered operation, sorted.
pub fn operation_names() -> Vec<&'static str> {
    REGISTRY.keys().copied().collect()
}

impl OperationDecl {
    /// Validate the declaration into an executable operation.
    pub fn build(&self) -> ConfigResult<Operation> {
        let constructor = REGISTRY
            .get(self.name.as_str())
            .ok_or_else(|| ConfigError::UnknownOperation(self.name.clone()))?;
        constructor(&self.args)
    }
}

// =============================================================================
// Construction
// =============================================================================

fn invalid(operation: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidArguments {
        operation: operation.to_string(),
        message: message.into(),
    }
}

/// Read a text argument; numbers and booleans are accepted as their text form.
fn text_arg(args: &Args, operation: &str, key: &str) -> ConfigResult<Option<String>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => as_text(v)
            .map(Some)
            .ok_or_else(|| invalid(operation, format!("'{key}' must be a string, got {}", kind(v)))),
    }
}

fn init_change_case(args: &Args) -> ConfigResult<Operation> {
    let to = text_arg(args, "changeCase", "to")?.ok_or_else(|| invalid("changeCase", "missing 'to'"))?;
    let mode = match to.to_ascii_lowercase().as_str() {
        "lower" => CaseMode::Lower,
        "upper" => CaseMode::Upper,
        "title" => CaseMode::Title,
        "camel" => CaseMode::Camel,
        "pascal" => CaseMode::Pascal,
        "snake" => CaseMode::Snake,
        "kebab" => CaseMode::Kebab,
        other => return Err(invalid("changeCase", format!("unknown case {other:?}"))),
    };
    Ok(Operation::ChangeCase(mode))
}

fn init_max(args: &Args) -> ConfigResult<Operation> {
    let delimiter = text_arg(args, "max", "delimiter")?.unwrap_or_else(|| ",".to_string());
    if delimiter.is_empty() {
        return Err(invalid("max", "'delimiter' must not be empty"));
    }
    Ok(Operation::Max { delimiter })
}

fn init_replace(args: &Args) -> ConfigResult<Operation> {
    let regex = text_arg(args, "replace", "regex")?;
    let old = text_arg(args, "replace", "old")?;
    let replacement = text_arg(args, "replace", "new")?.ok_or_else(|| invalid("replace", "missing 'new'"))?;
    let source = match (regex, old) {
        (Some(pattern), None) => pattern,
        (None, Some(literal)) => regex::escape(&literal),
        (Some(_), Some(_)) => return Err(invalid("replace", "'regex' and 'old' are mutually exclusive")),
        (None, None) => return Err(invalid("replace", "one of 'regex' or 'old' is required")),
    };
    let pattern = Regex::new(&source).map_err(|e| invalid("replace", format!("invalid regex: {e}")))?;
    Ok(Operation::Replace { pattern, replacement })
}

fn init_split(args: &Args) -> ConfigResult<Operation> {
    let on = text_arg(args, "split", "on")?.ok_or_else(|| invalid("split", "missing 'on'"))?;
    if on.is_empty() {
        return Err(invalid("split", "'on' must not be empty"));
    }
    let index = match args.get("index") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(
            n.as_u64()
                .ok_or_else(|| invalid("split", format!("'index' must be a non-negative integer, got {n}")))?
                as usize,
        ),
        Some(Value::String(s)) => Some(
            s.trim()
                .parse::<usize>()
                .map_err(|_| invalid("split", format!("'index' must be a non-negative integer, got {s:?}")))?,
        ),
        Some(other) => return Err(invalid("split", format!("'index' must be an integer, got {}", kind(other)))),
    };
    Ok(Operation::Split { on, index })
}

// =============================================================================
// Application
// =============================================================================

impl Operation {
    /// Registry name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ChangeCase(_) => "changeCase",
            Operation::Duration => "duration",
            Operation::Inverse => "inverse",
            Operation::Max { .. } => "max",
            Operation::Replace { .. } => "replace",
            Operation::Split { .. } => "split",
        }
    }

    /// Apply this operation to a non-null value.
    ///
    /// A `Value::Null` result means the operation produced nothing (an
    /// out-of-range split index, for instance).
    pub fn apply(&self, value: &Value) -> OperationResult<Value> {
        match self {
            Operation::ChangeCase(mode) => {
                let text = self.expect_text(value)?;
                Ok(Value::String(change_case(text, *mode)))
            }
            Operation::Duration => self.apply_duration(value),
            Operation::Inverse => match value {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(self.unexpected("a boolean", other)),
            },
            Operation::Max { delimiter } => self.apply_max(value, delimiter),
            Operation::Replace { pattern, replacement } => {
                let text = self.expect_text(value)?;
                Ok(Value::String(pattern.replace_all(text, replacement.as_str()).into_owned()))
            }
            Operation::Split { on, index } => {
                let text = self.expect_text(value)?;
                let mut parts = text.split(on.as_str());
                match index {
                    Some(i) => Ok(parts.nth(*i).map(|p| Value::String(p.to_string())).unwrap_or(Value::Null)),
                    None => Ok(Value::Array(parts.map(|p| Value::String(p.to_string())).collect())),
                }
            }
        }
    }

    fn unexpected(&self, expected: &'static str, found: &Value) -> OperationError {
        OperationError::UnexpectedInput {
            operation: self.name(),
            expected,
            found: kind(found).to_string(),
        }
    }

    fn failed(&self, message: impl Into<String>) -> OperationError {
        OperationError::Failed {
            operation: self.name(),
            message: message.into(),
        }
    }

    fn expect_text<'v>(&self, value: &'v Value) -> OperationResult<&'v str> {
        value.as_str().ok_or_else(|| self.unexpected("a string", value))
    }

    fn apply_duration(&self, value: &Value) -> OperationResult<Value> {
        let text = self.expect_text(value)?;
        let segments: Vec<&str> = text.trim().split(':').collect();
        if !(2..=3).contains(&segments.len()) {
            return Err(self.failed(format!("{text:?} is not MM:SS or HH:MM:SS")));
        }
        let mut seconds: u64 = 0;
        for segment in segments {
            let n: u64 = segment
                .trim()
                .parse()
                .map_err(|_| self.failed(format!("invalid segment {segment:?} in {text:?}")))?;
            seconds = seconds
                .checked_mul(60)
                .and_then(|s| s.checked_add(n))
                .ok_or_else(|| self.failed(format!("{text:?} overflows a duration in seconds")))?;
        }
        Ok(Value::from(seconds))
    }

    fn apply_max(&self, value: &Value, delimiter: &str) -> OperationResult<Value> {
        let candidates: Vec<Value> = match value {
            Value::Array(items) => items.clone(),
            Value::String(s) => s.split(delimiter).map(|p| Value::String(p.to_string())).collect(),
            Value::Number(_) => vec![value.clone()],
            other => return Err(self.unexpected("a sequence or delimited string", other)),
        };

        let mut best: Option<f64> = None;
        for candidate in &candidates {
            let n = match candidate {
                Value::Number(n) => n.as_f64(),
                Value::String(s) if s.trim().is_empty() => continue,
                Value::String(s) => s.trim().parse::<f64>().ok(),
                Value::Null => continue,
                _ => None,
            }
            .ok_or_else(|| self.failed(format!("{candidate} is not numeric")))?;
            best = Some(best.map_or(n, |b: f64| b.max(n)));
        }

        let best = best.ok_or_else(|| self.failed("no numeric values"))?;
        if best.fract() == 0.0 && best.abs() < i64::MAX as f64 {
            Ok(Value::from(best as i64))
        } else {
            Number::from_f64(best)
                .map(Value::Number)
                .ok_or_else(|| self.failed("result is not a finite number"))
        }
    }
}

fn change_case(text: &str, mode: CaseMode) -> String {
    match mode {
        CaseMode::Lower => text.to_lowercase(),
        CaseMode::Upper => text.to_uppercase(),
        CaseMode::Title => text.to_case(Case::Title),
        CaseMode::Camel => text.to_case(Case::Camel),
        CaseMode::Pascal => text.to_case(Case::Pascal),
        CaseMode::Snake => text.to_case(Case::Snake),
        CaseMode::Kebab => text.to_case(Case::Kebab),
    }
}

/// Human-readable listing of the registry, for the CLI.
pub fn operations_description() -> String {
    r#"Available operations:

| Operation  | Description                                   | Arguments                                 |
|------------|-----------------------------------------------|-------------------------------------------|
| changeCase | Change the case of a string                   | to: lower|upper|title|camel|pascal|snake|kebab |
| duration   | "MM:SS" or "HH:MM:SS" to seconds              | -                                         |
| inverse    | Negate a boolean                              | -                                         |
| max        | Largest value of a list or delimited string   | delimiter: separator (default ",")        |
| replace    | Replace all matches                           | regex: pattern OR old: literal, new: text |
| split      | Split a string                                | on: separator, index: element to keep     |

Example:
[
  {"type": "changeCase", "args": {"to": "lower"}},
  {"type": "split", "args": {"on": "|"}}
]"#
    .to_string()
}

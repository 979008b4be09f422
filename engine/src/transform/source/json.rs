use serde_json::Value;

use super::{Extracted, Source};
use crate::transform::convert::DeclaredType;
use crate::transform::dsl::PathDialect;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Step {
    Key(String),
    Index(usize),
    Wildcard,
}

/// A parsed JSON document used as transform input.
#[derive(Debug, Clone, Copy)]
pub struct JsonSource<'a> {
    root: &'a Value,
}

impl<'a> JsonSource<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self { root }
    }
}

impl Source for JsonSource<'_> {
    fn dialect(&self) -> PathDialect {
        PathDialect::JsonPath
    }

    fn extract(&self, path: &str, _declared: DeclaredType) -> Result<Option<Extracted>, String> {
        let steps = parse_path(path)?;
        Ok(select(self.root, &steps).map(Extracted::Value))
    }

    fn element_path(&self, path: &str, index: usize) -> String {
        let base = path.strip_suffix("[*]").unwrap_or(path);
        format!("{base}[{index}]")
    }
}

pub(super) fn parse_path(path: &str) -> Result<Vec<Step>, String> {
    let rest = path
        .strip_prefix('$')
        .ok_or_else(|| format!("JSON path {path:?} must start with '$'"))?;

    let mut steps = Vec::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((pos, c)) = chars.next() {
        match c {
            '.' => {
                let start = pos + 1;
                let mut end = rest.len();
                while let Some(&(p, next)) = chars.peek() {
                    if next == '.' || next == '[' {
                        end = p;
                        break;
                    }
                    chars.next();
                }
                match &rest[start..end] {
                    "" => return Err(format!("empty key in JSON path {path:?}")),
                    "*" => steps.push(Step::Wildcard),
                    key => steps.push(Step::Key(key.to_string())),
                }
            }
            '[' => {
                let close = rest[pos..]
                    .find(']')
                    .map(|offset| pos + offset)
                    .ok_or_else(|| format!("unclosed bracket in JSON path {path:?}"))?;
                let inner = rest[pos + 1..close].trim();
                let step = if inner == "*" {
                    Step::Wildcard
                } else if let Ok(i) = inner.parse::<usize>() {
                    Step::Index(i)
                } else if inner.len() >= 2
                    && ((inner.starts_with('\'') && inner.ends_with('\''))
                        || (inner.starts_with('"') && inner.ends_with('"')))
                {
                    Step::Key(inner[1..inner.len() - 1].to_string())
                } else {
                    return Err(format!("unsupported bracket [{inner}] in JSON path {path:?}"));
                };
                steps.push(step);
                while let Some(&(p, _)) = chars.peek() {
                    if p > close {
                        break;
                    }
                    chars.next();
                }
            }
            other => return Err(format!("unexpected {other:?} in JSON path {path:?}")),
        }
    }
    Ok(steps)
}

fn select(node: &Value, steps: &[Step]) -> Option<Value> {
    let Some((step, rest)) = steps.split_first() else {
        return (!node.is_null()).then(|| node.clone());
    };
    match step {
        Step::Key(key) => node.as_object()?.get(key).and_then(|child| select(child, rest)),
        Step::Index(i) => node.as_array()?.get(*i).and_then(|child| select(child, rest)),
        Step::Wildcard => {
            let children: Vec<&Value> = match node {
                Value::Array(items) => items.iter().collect(),
                Value::Object(map) => map.values().collect(),
                _ => return None,
            };
            let collected: Vec<Value> = children.into_iter().filter_map(|child| select(child, rest)).collect();
            (!collected.is_empty()).then_some(Value::Array(collected))
        }
    }
}

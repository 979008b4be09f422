//! XML input documents addressed with XPath.
//!
//! Parsing and evaluation are delegated to `xee-xpath` (XPath 3.1). The
//! adapter only turns the matched items into text and hands them to the
//! declared-type conversion.

use std::cell::RefCell;
use std::fmt;

use serde_json::Value;
use xee_xpath::{DocumentHandle, Documents, Item, Queries, Query};

use super::{Extracted, Source};
use crate::transform::convert::{from_text, DeclaredType};
use crate::transform::dsl::PathDialect;

/// A parsed XML document used as transform input.
pub struct XmlDocument {
    documents: RefCell<Documents>,
    handle: DocumentHandle,
}

impl fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlDocument").finish_non_exhaustive()
    }
}

/// Check that `path` is a well-formed XPath expression.
pub fn compile_xpath(path: &str) -> Result<(), String> {
    Queries::default()
        .sequence(path)
        .map(|_| ())
        .map_err(|e| format!("invalid XPath {path:?}: {e:?}"))
}

impl XmlDocument {
    /// Parse an XML document.
    pub fn parse(xml: &str) -> Result<Self, String> {
        let mut documents = Documents::new();
        let handle = documents
            .add_string_without_uri(xml)
            .map_err(|e| format!("invalid XML: {e:?}"))?;
        Ok(Self {
            documents: RefCell::new(documents),
            handle,
        })
    }

    /// Evaluate an XPath expression from the document node and return the
    /// string value of every item, in document order.
    pub fn select(&self, path: &str) -> Result<Vec<String>, String> {
        let queries = Queries::default();
        let query = queries
            .many(path, |documents: &mut Documents, item: &Item| Ok(item.string_value(documents.xot())?))
            .map_err(|e| format!("invalid XPath {path:?}: {e:?}"))?;
        let mut documents = self.documents.borrow_mut();
        query
            .execute(&mut documents, self.handle.clone())
            .map_err(|e| format!("XPath {path:?} failed: {e:?}"))
    }
}

impl Source for XmlDocument {
    fn dialect(&self) -> PathDialect {
        PathDialect::XPath
    }

    fn extract(&self, path: &str, declared: DeclaredType) -> Result<Option<Extracted>, String> {
        let items = self.select(path)?;
        let Some(first) = items.first() else {
            return Ok(None);
        };

        match declared {
            DeclaredType::Array => Ok(Some(Extracted::Value(Value::Array(
                items.iter().map(|text| Value::String(text.trim().to_string())).collect(),
            )))),
            DeclaredType::Scalar(ty) => {
                let raw = first.trim().to_string();
                match from_text(&raw, ty) {
                    Ok(Some(value)) => Ok(Some(Extracted::Value(value))),
                    Ok(None) => Ok(None),
                    Err(reason) => Ok(Some(Extracted::Unconverted { raw, reason })),
                }
            }
        }
    }

    fn element_path(&self, path: &str, index: usize) -> String {
        format!("({})[{}]", path, index + 1)
    }
}

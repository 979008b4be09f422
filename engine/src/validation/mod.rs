//! Validator gate for transform results.
//!
//! The assembled document is validated in its encoded form, the same bytes a
//! caller receives. Structural problems (the bytes are not JSON) propagate as
//! [`TransformError::Schema`]; schema violations become
//! [`TransformError::ValidationFailure`] with every diagnostic line.
//!
//! # Example
//!
//! ```rust,ignore
//! use jstransform::{validation, Schema};
//!
//! let schema = Schema::from_file("image.json")?;
//! match validation::gate(&schema, br#"{"type": "image"}"#) {
//!     Ok(()) => println!("valid"),
//!     Err(e) => println!("{e}"),
//! }
//! ```

use crate::error::{TransformError, TransformResult};
use crate::schema::Schema;

/// Check an encoded document against the schema.
pub fn gate(schema: &Schema, encoded: &[u8]) -> TransformResult<()> {
    let errors = schema.validate(encoded)?;
    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(count = errors.len(), "transformed result failed validation");
        Err(TransformError::ValidationFailure { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_value(json!({
            "type": "object",
            "required": ["id", "name"],
            "properties": {
                "id": {"type": "integer"},
                "name": {"type": "string"}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_document_passes() {
        assert!(gate(&schema(), br#"{"id": 1, "name": "x"}"#).is_ok());
    }

    #[test]
    fn test_every_violation_is_reported() {
        let err = gate(&schema(), br#"{"id": "one", "name": null}"#).unwrap_err();
        match err {
            TransformError::ValidationFailure { errors } => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unparseable_bytes_are_a_schema_error() {
        assert!(matches!(gate(&schema(), b"{"), Err(TransformError::Schema(_))));
    }
}

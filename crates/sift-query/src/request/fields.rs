//! The `fields` section.

use serde_json::Value;

use crate::{error::QueryError, value};

/// A field to return alongside each hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRequest {
    /// Field name or glob.
    pub field: String,
    /// Output format, for date fields.
    pub format: Option<String>,
}

/// Decodes `fields`: an array of names or `{field, format}` objects.
pub fn parse_fields(v: &Value) -> Result<Vec<FieldRequest>, QueryError> {
    let items = v
        .as_array()
        .ok_or_else(|| QueryError::parsing("[fields] should be an array"))?;
    items
        .iter()
        .map(|item| match item {
            Value::String(field) => Ok(FieldRequest {
                field: field.clone(),
                format: None,
            }),
            Value::Object(obj) => {
                let field = obj
                    .get("field")
                    .ok_or_else(|| QueryError::parsing("[fields] field is required"))?;
                let format = obj
                    .get("format")
                    .map(|f| value::as_str(f, "fields", "format").map(str::to_string))
                    .transpose()?;
                Ok(FieldRequest {
                    field: value::as_str(field, "fields", "field")?.to_string(),
                    format,
                })
            }
            _ => Err(QueryError::parsing(
                "[fields] entries should be strings or objects",
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn mixed_entries() {
        let fields = parse_fields(&json!(["title", {"field": "published", "format": "%Y"}])).unwrap();
        assert_eq!(fields[0].field, "title");
        assert_eq!(fields[1].format.as_deref(), Some("%Y"));
    }

    #[test]
    fn errors() {
        assert!(parse_fields(&json!("title")).is_err());
        assert!(parse_fields(&json!([{"format": "%Y"}])).is_err());
        assert!(parse_fields(&json!([1])).is_err());
    }
}

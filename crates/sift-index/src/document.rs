//! Conversion of JSON documents into Tantivy documents.

use serde_json::Value;
use sift_query::{FieldKind, parse_date};
use tantivy::{DateTime, TantivyDocument, schema::Field};

use crate::{IndexError, schema::IndexSchema};

/// Builds the Tantivy document for `source`.
///
/// Mapped fields are looked up by dotted path. Arrays index every element; `null` and absent
/// fields are skipped. The full source is stored alongside for `_source` retrieval.
pub fn build_document(
    schema: &IndexSchema,
    id: &str,
    source: &Value,
) -> Result<TantivyDocument, IndexError> {
    if !source.is_object() {
        return Err(IndexError::Document(format!(
            "document [{id}] must be a JSON object"
        )));
    }

    let mut doc = TantivyDocument::default();
    doc.add_text(schema.id, id);
    doc.add_text(schema.source, source.to_string());

    for (name, field, kind) in schema.fields() {
        match lookup(source, name) {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for item in items.iter().filter(|v| !v.is_null()) {
                    add_value(&mut doc, schema, field, kind, name, item)?;
                }
            }
            Some(value) => add_value(&mut doc, schema, field, kind, name, value)?,
        }
    }

    Ok(doc)
}

/// Finds the value at a dotted path.
pub fn lookup<'a>(source: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = source.get(path) {
        return Some(value);
    }
    path.split('.')
        .try_fold(source, |current, segment| current.get(segment))
}

/// Adds one scalar value to `doc`.
fn add_value(
    doc: &mut TantivyDocument,
    schema: &IndexSchema,
    field: Field,
    kind: FieldKind,
    name: &str,
    value: &Value,
) -> Result<(), IndexError> {
    let mismatch = |expected: &str| {
        IndexError::Document(format!(
            "field [{name}] expects {expected}, got [{value}]"
        ))
    };

    match (kind, value) {
        (FieldKind::Text | FieldKind::Keyword, Value::String(s)) => doc.add_text(field, s),
        (FieldKind::Keyword, Value::Number(_) | Value::Bool(_)) => {
            doc.add_text(field, value.to_string());
        }
        (FieldKind::Numeric, Value::Number(n)) => {
            doc.add_f64(field, n.as_f64().ok_or_else(|| mismatch("a number"))?);
        }
        (FieldKind::Numeric, Value::String(s)) => {
            doc.add_f64(field, s.trim().parse().map_err(|_| mismatch("a number"))?);
        }
        (FieldKind::Bool, Value::Bool(b)) => doc.add_bool(field, *b),
        (FieldKind::Bool, Value::String(s)) => {
            doc.add_bool(field, s.parse().map_err(|_| mismatch("a boolean"))?);
        }
        (FieldKind::Date, Value::Number(n)) => {
            let millis = n.as_i64().ok_or_else(|| mismatch("epoch milliseconds"))?;
            doc.add_date(field, DateTime::from_timestamp_millis(millis));
        }
        (FieldKind::Date, Value::String(s)) => {
            let parsed = parse_date(s, schema.format(name)).map_err(|_| mismatch("a date"))?;
            doc.add_date(field, DateTime::from_timestamp_millis(parsed.timestamp_millis()));
        }
        (FieldKind::Text, _) => return Err(mismatch("a string")),
        (FieldKind::Keyword, _) => return Err(mismatch("a scalar")),
        (FieldKind::Numeric, _) => return Err(mismatch("a number")),
        (FieldKind::Bool, _) => return Err(mismatch("a boolean")),
        (FieldKind::Date, _) => return Err(mismatch("a date")),
    }
    Ok(())
}

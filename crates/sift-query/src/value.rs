//! Typed decoding of untyped request values.
//!
//! Every accessor returns a [`QueryError`] on a type mismatch instead of panicking. `ctx` is the
//! clause or section name used to prefix messages, as in `[multi_match] query should be a string`.

use serde_json::{Map, Value};

use crate::error::QueryError;

/// A JSON object in input order.
pub type Object = Map<String, Value>;

/// Decodes an object.
pub fn as_object<'a>(value: &'a Value, ctx: &str) -> Result<&'a Object, QueryError> {
    value
        .as_object()
        .ok_or_else(|| QueryError::parsing(format!("[{ctx}] should be an object")))
}

/// Decodes a string.
pub fn as_str<'a>(value: &'a Value, ctx: &str, key: &str) -> Result<&'a str, QueryError> {
    value
        .as_str()
        .ok_or_else(|| QueryError::parsing(format!("[{ctx}] {key} should be a string")))
}

/// Decodes a boolean.
pub fn as_bool(value: &Value, ctx: &str, key: &str) -> Result<bool, QueryError> {
    value
        .as_bool()
        .ok_or_else(|| QueryError::parsing(format!("[{ctx}] {key} should be a boolean")))
}

/// Decodes any JSON number as `f64`.
pub fn as_f64(value: &Value, ctx: &str, key: &str) -> Result<f64, QueryError> {
    value
        .as_f64()
        .ok_or_else(|| QueryError::parsing(format!("[{ctx}] {key} should be a number")))
}

/// Decodes an integral number. `3.0` is accepted; `3.5` is not.
pub fn as_i64(value: &Value, ctx: &str, key: &str) -> Result<i64, QueryError> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(f as i64),
        _ => Err(QueryError::parsing(format!(
            "[{ctx}] {key} should be an integer"
        ))),
    }
}

/// Decodes a non-negative integer; negative values are `IllegalArgument`.
pub fn as_usize(value: &Value, ctx: &str, key: &str) -> Result<usize, QueryError> {
    let n = as_i64(value, ctx, key)?;
    usize::try_from(n).map_err(|_| {
        QueryError::illegal_argument(format!("[{ctx}] {key} must be non-negative, got [{n}]"))
    })
}

/// Decodes an array of strings.
pub fn as_string_list(value: &Value, ctx: &str, key: &str) -> Result<Vec<String>, QueryError> {
    let items = value
        .as_array()
        .ok_or_else(|| QueryError::parsing(format!("[{ctx}] {key} should be an array")))?;
    items
        .iter()
        .map(|item| as_str(item, ctx, key).map(str::to_string))
        .collect()
}

/// Decodes a string or an array of strings.
pub fn as_one_or_many_strings(
    value: &Value,
    ctx: &str,
    key: &str,
) -> Result<Vec<String>, QueryError> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        _ => as_string_list(value, ctx, key),
    }
}

/// Decodes a `boost`. A negative boost means "unset".
pub fn boost(value: &Value, ctx: &str) -> Result<Option<f32>, QueryError> {
    let boost = as_f64(value, ctx, "boost")?;
    if boost < 0.0 {
        return Ok(None);
    }
    Ok(Some(boost as f32))
}

/// Renders a scalar as query text. Numbers and booleans are accepted where text is expected.
pub fn scalar_text(value: &Value, ctx: &str, key: &str) -> Result<String, QueryError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(QueryError::parsing(format!(
            "[{ctx}] {key} should be a string, number or boolean"
        ))),
    }
}

/// Decodes the `{field: spec}` shape shared by single-field clauses.
pub fn single_field<'a>(value: &'a Value, ctx: &str) -> Result<(&'a str, &'a Value), QueryError> {
    let obj = as_object(value, ctx)?;
    let mut entries = obj.iter();
    match (entries.next(), entries.next()) {
        (Some((field, spec)), None) => Ok((field.as_str(), spec)),
        (None, _) => Err(QueryError::parsing(format!(
            "[{ctx}] query malformed, no field specified"
        ))),
        (Some(_), Some(_)) => Err(QueryError::parsing(format!(
            "[{ctx}] query doesn't support multiple fields, found [{}]",
            obj.keys().cloned().collect::<Vec<_>>().join(", ")
        ))),
    }
}

/// Prefixes an error message with a clause name, keeping its kind.
pub fn in_clause(ctx: &str) -> impl FnOnce(QueryError) -> QueryError + '_ {
    move |err| QueryError::new(err.kind, format!("[{ctx}] {}", err.message))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn integers_accept_integral_floats() {
        assert_eq!(as_i64(&json!(3.0), "t", "size").unwrap(), 3);
        let err = as_i64(&json!(3.5), "t", "size").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
    }

    #[test]
    fn negative_usize_is_illegal_argument() {
        let err = as_usize(&json!(-1), "search", "size").unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalArgument);
        assert_eq!(err.message, "[search] size must be non-negative, got [-1]");
    }

    #[test]
    fn negative_boost_is_unset() {
        assert_eq!(boost(&json!(-1), "match").unwrap(), None);
        assert_eq!(boost(&json!(0), "match").unwrap(), Some(0.0));
        assert_eq!(boost(&json!(2.5), "match").unwrap(), Some(2.5));
        assert_eq!(boost(&json!("2"), "match").unwrap_err().kind, ErrorKind::Parsing);
    }

    #[test]
    fn single_field_rejects_multiple_keys() {
        let err = single_field(&json!({"a": 1, "b": 2}), "term").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
        assert!(err.message.contains("[a, b]"));
    }

    #[test]
    fn in_clause_keeps_kind() {
        let err = in_clause("bool")(QueryError::x_content_parse("bad value"));
        assert_eq!(err.kind, ErrorKind::XContentParse);
        assert_eq!(err.message, "[bool] bad value");
    }
}

//! The `range` clause.

use std::ops::Bound;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::debug;
use serde_json::Value;

use super::CompileContext;
use crate::{
    clause::{Clause, RangeClause, RangeValue},
    error::QueryError,
    mapping::FieldKind,
    value,
};

/// Compiles `{field: {gt, gte, lt, lte, from, to, include_lower, include_upper, format, boost}}`.
///
/// `from` and `to` are inclusive unless `include_lower` or `include_upper` is `false`; a `null`
/// leaves that side open. Later keys override earlier ones on the same side.
///
/// Bounds on date fields are parsed with `format` (or the field's mapped format) and otherwise
/// as RFC 3339 or `YYYY-MM-DD`; numbers on date fields are epoch milliseconds. Bounds on numeric
/// fields must be numbers or numeric strings.
pub fn compile_range(ctx: &mut CompileContext<'_>, body: &Value) -> Result<Clause, QueryError> {
    let (field, spec) = value::single_field(body, "range")?;
    let obj = value::as_object(spec, "range")?;
    let property = ctx.mappings().get(field);
    let kind = property.map(|p| p.kind);

    let format = match obj.get("format") {
        Some(v) => Some(value::as_str(v, "range", "format")?),
        None => property.and_then(|p| p.format.as_deref()),
    };

    let mut lower = Bound::Unbounded;
    let mut upper = Bound::Unbounded;
    let mut boost = None;
    let mut include_lower = true;
    let mut include_upper = true;
    let mut lower_from = false;
    let mut upper_to = false;
    for (key, v) in obj {
        match key.to_lowercase().as_str() {
            "gt" => {
                lower = Bound::Excluded(bound(v, kind, format)?);
                lower_from = false;
            }
            "gte" => {
                lower = Bound::Included(bound(v, kind, format)?);
                lower_from = false;
            }
            "lt" => {
                upper = Bound::Excluded(bound(v, kind, format)?);
                upper_to = false;
            }
            "lte" => {
                upper = Bound::Included(bound(v, kind, format)?);
                upper_to = false;
            }
            "from" => {
                lower = match v {
                    Value::Null => Bound::Unbounded,
                    v => Bound::Included(bound(v, kind, format)?),
                };
                lower_from = true;
            }
            "to" => {
                upper = match v {
                    Value::Null => Bound::Unbounded,
                    v => Bound::Included(bound(v, kind, format)?),
                };
                upper_to = true;
            }
            "include_lower" => include_lower = value::as_bool(v, "range", "include_lower")?,
            "include_upper" => include_upper = value::as_bool(v, "range", "include_upper")?,
            "boost" => boost = value::boost(v, "range")?,
            "format" => {}
            other => debug!("[range] ignoring unknown key [{other}]"),
        }
    }

    if lower_from && !include_lower {
        lower = exclusive(lower);
    }
    if upper_to && !include_upper {
        upper = exclusive(upper);
    }

    Ok(Clause::Range(RangeClause {
        field: field.to_string(),
        lower,
        upper,
        boost,
    }))
}

/// Turns an inclusive bound into an exclusive one.
fn exclusive(bound: Bound<RangeValue>) -> Bound<RangeValue> {
    match bound {
        Bound::Included(v) => Bound::Excluded(v),
        other => other,
    }
}

/// Decodes one bound according to the field kind.
fn bound(v: &Value, kind: Option<FieldKind>, format: Option<&str>) -> Result<RangeValue, QueryError> {
    match (kind, v) {
        (Some(FieldKind::Date), Value::String(s)) => parse_date(s, format).map(RangeValue::Date),
        (Some(FieldKind::Date), Value::Number(n)) => {
            let millis = n.as_i64().ok_or_else(|| {
                QueryError::x_content_parse(format!("[range] invalid epoch milliseconds [{n}]"))
            })?;
            DateTime::from_timestamp_millis(millis)
                .map(RangeValue::Date)
                .ok_or_else(|| {
                    QueryError::x_content_parse(format!("[range] epoch milliseconds [{n}] out of range"))
                })
        }
        (Some(FieldKind::Numeric), Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(RangeValue::Number)
            .map_err(|_| QueryError::x_content_parse(format!("[range] failed to parse number [{s}]"))),
        (_, Value::Number(n)) => n
            .as_f64()
            .map(RangeValue::Number)
            .ok_or_else(|| QueryError::parsing("[range] invalid number")),
        (_, Value::String(s)) => Ok(RangeValue::Text(s.clone())),
        _ => Err(QueryError::parsing(
            "[range] bounds should be numbers or strings",
        )),
    }
}

/// Parses a date bound.
pub fn parse_date(input: &str, format: Option<&str>) -> Result<DateTime<Utc>, QueryError> {
    let parsed = match format {
        Some(format) => NaiveDateTime::parse_from_str(input, format)
            .map(|dt| dt.and_utc())
            .or_else(|_| {
                NaiveDate::parse_from_str(input, format)
                    .map(|d| d.and_time(NaiveTime::MIN).and_utc())
            })
            .ok(),
        None => DateTime::parse_from_rfc3339(input)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(input, "%Y-%m-%d")
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN).and_utc())
            }),
    };
    parsed.ok_or_else(|| {
        QueryError::x_content_parse(format!("[range] failed to parse date [{input}]"))
    })
}

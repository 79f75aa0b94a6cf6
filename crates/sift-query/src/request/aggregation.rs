//! The `aggs` / `aggregations` section.
//!
//! Aggregations are validated against the mappings here so that an engine only ever sees
//! requests it can run: the field exists, is aggregatable, and has a kind the aggregation
//! understands.

use serde_json::Value;

use crate::{
    error::QueryError,
    mapping::{FieldKind, Mappings},
    value,
};

/// Default bucket count for `terms`.
pub const DEFAULT_TERMS_SIZE: usize = 10;

/// A named aggregation and its sub-aggregations.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// Name the result is reported under.
    pub name: String,
    /// What to compute.
    pub kind: AggregationKind,
    /// Nested aggregations, computed per bucket.
    pub aggregations: Vec<Self>,
}

/// The computation an [`Aggregation`] performs.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationKind {
    /// Most frequent values.
    Terms {
        /// Source field.
        field: String,
        /// Number of buckets.
        size: usize,
    },
    /// Explicit value ranges.
    Range {
        /// Source field.
        field: String,
        /// Buckets in input order.
        ranges: Vec<RangeBucket>,
    },
    /// Fixed-width numeric buckets.
    Histogram {
        /// Source field.
        field: String,
        /// Bucket width, always positive.
        interval: f64,
        /// Buckets with fewer documents are dropped.
        min_doc_count: u64,
    },
    /// Fixed-width time buckets.
    DateHistogram {
        /// Source field.
        field: String,
        /// Bucket width such as `1d` or `30m`.
        fixed_interval: String,
    },
    /// A single-value or stats metric.
    Metric {
        /// Which metric.
        metric: MetricKind,
        /// Source field.
        field: String,
    },
}

/// One bucket of a range aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBucket {
    /// Bucket name.
    pub key: Option<String>,
    /// Inclusive lower bound.
    pub from: Option<f64>,
    /// Exclusive upper bound.
    pub to: Option<f64>,
}

/// Metric aggregations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Mean value.
    Avg,
    /// Sum of values.
    Sum,
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
    /// Count, min, max, avg and sum together.
    Stats,
    /// Number of values.
    ValueCount,
}

impl MetricKind {
    /// Decodes a metric name.
    fn parse(name: &str) -> Option<Self> {
        match name {
            "avg" => Some(Self::Avg),
            "sum" => Some(Self::Sum),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "stats" => Some(Self::Stats),
            "value_count" => Some(Self::ValueCount),
            _ => None,
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Stats => "stats",
            Self::ValueCount => "value_count",
        }
    }
}

impl AggregationKind {
    /// The field this aggregation reads.
    pub fn field(&self) -> &str {
        match self {
            Self::Terms { field, .. }
            | Self::Range { field, .. }
            | Self::Histogram { field, .. }
            | Self::DateHistogram { field, .. }
            | Self::Metric { field, .. } => field,
        }
    }

    /// Wire name of the aggregation type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terms { .. } => "terms",
            Self::Range { .. } => "range",
            Self::Histogram { .. } => "histogram",
            Self::DateHistogram { .. } => "date_histogram",
            Self::Metric { metric, .. } => metric.as_str(),
        }
    }
}

/// Bucket aggregation types.
const BUCKET_TYPES: [&str; 4] = ["terms", "range", "histogram", "date_histogram"];

/// Decodes an `aggs` object: `{name: {type: body, aggs: {...}}}`.
pub fn parse_aggregations(v: &Value, mappings: &Mappings) -> Result<Vec<Aggregation>, QueryError> {
    let obj = value::as_object(v, "aggs")?;
    obj.iter()
        .map(|(name, spec)| parse_aggregation(name, spec, mappings))
        .collect()
}

/// Decodes one named aggregation.
fn parse_aggregation(
    name: &str,
    spec: &Value,
    mappings: &Mappings,
) -> Result<Aggregation, QueryError> {
    let obj = value::as_object(spec, name)?;
    let mut kind = None;
    let mut aggregations = Vec::new();

    for (key, body) in obj {
        match key.as_str() {
            "aggs" | "aggregations" => aggregations = parse_aggregations(body, mappings)?,
            agg_type => {
                if kind.is_some() {
                    return Err(QueryError::parsing(format!(
                        "[{name}] aggregation has more than one type"
                    )));
                }
                kind = Some(parse_kind(name, agg_type, body, mappings)?);
            }
        }
    }

    let kind = kind.ok_or_else(|| {
        QueryError::parsing(format!("[{name}] aggregation type is missing"))
    })?;
    if matches!(kind, AggregationKind::Metric { .. }) && !aggregations.is_empty() {
        return Err(QueryError::parsing(format!(
            "[{name}] metric aggregation [{}] cannot have sub-aggregations",
            kind.as_str()
        )));
    }

    Ok(Aggregation {
        name: name.to_string(),
        kind,
        aggregations,
    })
}

/// Decodes the body of one aggregation type.
fn parse_kind(
    name: &str,
    agg_type: &str,
    body: &Value,
    mappings: &Mappings,
) -> Result<AggregationKind, QueryError> {
    let metric = MetricKind::parse(agg_type);
    if metric.is_none() && !BUCKET_TYPES.contains(&agg_type) {
        return Err(QueryError::not_implemented(format!(
            "[{name}] aggregation type [{agg_type}] is not supported"
        )));
    }

    let obj = value::as_object(body, agg_type)?;
    let field = obj
        .get("field")
        .ok_or_else(|| QueryError::parsing(format!("[{name}] [{agg_type}] field is required")))?;
    let field = value::as_str(field, agg_type, "field")?.to_string();

    let kind = match agg_type {
        "terms" => {
            let size = match obj.get("size") {
                Some(v) => value::as_usize(v, "terms", "size")?,
                None => DEFAULT_TERMS_SIZE,
            };
            check_field(&field, agg_type, mappings, |_| true)?;
            AggregationKind::Terms { field, size }
        }
        "range" => {
            check_field(&field, agg_type, mappings, FieldKind::is_numeric_like)?;
            let ranges = obj
                .get("ranges")
                .and_then(Value::as_array)
                .ok_or_else(|| QueryError::parsing("[range] ranges should be an array"))?
                .iter()
                .map(parse_bucket)
                .collect::<Result<_, _>>()?;
            AggregationKind::Range { field, ranges }
        }
        "histogram" => {
            check_field(&field, agg_type, mappings, FieldKind::is_numeric_like)?;
            let interval = obj
                .get("interval")
                .ok_or_else(|| QueryError::parsing("[histogram] interval is required"))?;
            let interval = value::as_f64(interval, "histogram", "interval")?;
            if interval <= 0.0 {
                return Err(QueryError::illegal_argument(format!(
                    "[histogram] interval must be positive, got [{interval}]"
                )));
            }
            let min_doc_count = match obj.get("min_doc_count") {
                Some(v) => value::as_usize(v, "histogram", "min_doc_count")? as u64,
                None => 0,
            };
            AggregationKind::Histogram {
                field,
                interval,
                min_doc_count,
            }
        }
        "date_histogram" => {
            check_field(&field, agg_type, mappings, |kind| kind == FieldKind::Date)?;
            let interval = obj
                .get("fixed_interval")
                .or_else(|| obj.get("interval"))
                .ok_or_else(|| {
                    QueryError::parsing("[date_histogram] fixed_interval is required")
                })?;
            let fixed_interval = value::as_str(interval, "date_histogram", "fixed_interval")?;
            if !is_fixed_interval(fixed_interval) {
                return Err(QueryError::illegal_argument(format!(
                    "[date_histogram] invalid fixed_interval [{fixed_interval}]"
                )));
            }
            AggregationKind::DateHistogram {
                field,
                fixed_interval: fixed_interval.to_string(),
            }
        }
        other => {
            let metric = metric.ok_or_else(|| {
                QueryError::not_implemented(format!(
                    "[{name}] aggregation type [{other}] is not supported"
                ))
            })?;
            if metric != MetricKind::ValueCount {
                check_field(&field, agg_type, mappings, FieldKind::is_numeric_like)?;
            } else {
                check_field(&field, agg_type, mappings, |_| true)?;
            }
            AggregationKind::Metric { metric, field }
        }
    };
    Ok(kind)
}

/// Decodes `{key, from, to}`.
fn parse_bucket(v: &Value) -> Result<RangeBucket, QueryError> {
    let obj = value::as_object(v, "range")?;
    let bound = |key: &str| {
        obj.get(key)
            .filter(|v| !v.is_null())
            .map(|v| value::as_f64(v, "range", key))
            .transpose()
    };
    Ok(RangeBucket {
        key: obj
            .get("key")
            .map(|k| value::as_str(k, "range", "key").map(str::to_string))
            .transpose()?,
        from: bound("from")?,
        to: bound("to")?,
    })
}

/// Requires `field` to be mapped, aggregatable, and of an accepted kind.
fn check_field(
    field: &str,
    agg_type: &str,
    mappings: &Mappings,
    accepts: impl Fn(FieldKind) -> bool,
) -> Result<(), QueryError> {
    let property = mappings.get(field).ok_or_else(|| {
        QueryError::illegal_argument(format!("[{agg_type}] field [{field}] is not mapped"))
    })?;
    if !property.is_aggregatable() {
        return Err(QueryError::illegal_argument(format!(
            "[{agg_type}] field [{field}] is not aggregatable"
        )));
    }
    if !accepts(property.kind) {
        return Err(QueryError::illegal_argument(format!(
            "[{agg_type}] field [{field}] has an unsupported type"
        )));
    }
    Ok(())
}

/// Matches `\d+(ms|s|m|h|d)`.
fn is_fixed_interval(interval: &str) -> bool {
    let digits = interval.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && matches!(&interval[digits..], "ms" | "s" | "m" | "h" | "d")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{ErrorKind, mapping::Property};

    fn mappings() -> Mappings {
        Mappings::new()
            .with_field("tag", Property::keyword())
            .with_field("price", Property::numeric())
            .with_field("published", Property::date())
            .with_field("body", Property::text())
            .with_field("secret", Property::keyword().with_aggregatable(false))
    }

    fn parse(v: Value) -> Result<Vec<Aggregation>, QueryError> {
        parse_aggregations(&v, &mappings())
    }

    #[test]
    fn terms_with_nested_metric() {
        let aggs = parse(json!({
            "tags": {
                "terms": {"field": "tag", "size": 5},
                "aggs": {"avg_price": {"avg": {"field": "price"}}}
            }
        }))
        .unwrap();
        assert_eq!(aggs[0].name, "tags");
        assert_eq!(
            aggs[0].kind,
            AggregationKind::Terms {
                field: "tag".into(),
                size: 5
            }
        );
        assert_eq!(
            aggs[0].aggregations[0].kind,
            AggregationKind::Metric {
                metric: MetricKind::Avg,
                field: "price".into()
            }
        );
    }

    #[test]
    fn buckets() {
        let aggs = parse(json!({
            "prices": {"range": {"field": "price", "ranges": [{"to": 10}, {"key": "big", "from": 10}]}},
            "spread": {"histogram": {"field": "price", "interval": 5, "min_doc_count": 1}},
            "daily": {"date_histogram": {"field": "published", "fixed_interval": "1d"}}
        }))
        .unwrap();
        let AggregationKind::Range { ranges, .. } = &aggs[0].kind else {
            panic!("expected range");
        };
        assert_eq!(ranges[0].to, Some(10.0));
        assert_eq!(ranges[1].key.as_deref(), Some("big"));
        assert_eq!(aggs[1].kind.as_str(), "histogram");
        assert_eq!(aggs[2].kind.field(), "published");
    }

    #[test]
    fn value_count_accepts_keywords() {
        assert!(parse(json!({"n": {"value_count": {"field": "tag"}}})).is_ok());
    }

    #[test]
    fn error_kinds() {
        let cases = [
            (json!({"x": {"percentiles": {"field": "price"}}}), ErrorKind::NotImplemented),
            (json!({"x": {"filters": {"filters": {"a": {"match_all": {}}}}}}), ErrorKind::NotImplemented),
            (json!({"x": {"geo_bounds": {}}}), ErrorKind::NotImplemented),
            (json!({"x": {"composite": 3}}), ErrorKind::NotImplemented),
            (json!({"x": {"terms": {"field": "missing"}}}), ErrorKind::IllegalArgument),
            (json!({"x": {"terms": {"field": "secret"}}}), ErrorKind::IllegalArgument),
            (json!({"x": {"terms": {"field": "body"}}}), ErrorKind::IllegalArgument),
            (json!({"x": {"avg": {"field": "tag"}}}), ErrorKind::IllegalArgument),
            (json!({"x": {"date_histogram": {"field": "price", "fixed_interval": "1d"}}}), ErrorKind::IllegalArgument),
            (json!({"x": {"date_histogram": {"field": "published", "fixed_interval": "1 week"}}}), ErrorKind::IllegalArgument),
            (json!({"x": {"histogram": {"field": "price", "interval": 0}}}), ErrorKind::IllegalArgument),
            (json!({"x": {"sum": {"field": "price"}, "aggs": {"y": {"max": {"field": "price"}}}}}), ErrorKind::Parsing),
            (json!({"x": {}}), ErrorKind::Parsing),
            (json!({"x": {"terms": {}}}), ErrorKind::Parsing),
        ];
        for (input, kind) in cases {
            let err = parse(input.clone()).unwrap_err();
            assert_eq!(err.kind, kind, "input {input}");
        }
    }

    #[test]
    fn fixed_intervals() {
        for ok in ["1d", "30m", "500ms", "12h", "10s"] {
            assert!(is_fixed_interval(ok), "{ok}");
        }
        for bad in ["d", "1w", "1.5h", ""] {
            assert!(!is_fixed_interval(bad), "{bad}");
        }
    }
}

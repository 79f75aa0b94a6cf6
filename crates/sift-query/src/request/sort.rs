//! Sort specifications.

use serde_json::Value;

use crate::{error::QueryError, mapping::Mappings, value};

/// The relevance score pseudo-field.
pub const SCORE_FIELD: &str = "_score";

/// The document id pseudo-field.
pub const ID_FIELD: &str = "_id";

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

impl SortOrder {
    /// Decodes `asc` or `desc`, case-insensitively.
    fn parse(value: &str) -> Result<Self, QueryError> {
        match value.to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(QueryError::illegal_argument(format!(
                "[sort] unknown order [{value}], expected asc or desc"
            ))),
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Where documents without a value for the sort field go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MissingPolicy {
    /// Before every document with a value.
    First,
    /// After every document with a value.
    #[default]
    Last,
}

impl MissingPolicy {
    /// Decodes `_first` or `_last`.
    fn parse(value: &str) -> Result<Self, QueryError> {
        match value {
            "_first" => Ok(Self::First),
            "_last" => Ok(Self::Last),
            _ => Err(QueryError::illegal_argument(format!(
                "[sort] unknown missing value [{value}], expected _first or _last"
            ))),
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    /// Field name, or `_score` / `_id`.
    pub field: String,
    /// Direction.
    pub order: SortOrder,
    /// Placement of documents lacking the field.
    pub missing: MissingPolicy,
}

impl SortField {
    /// A key with the default order for `field`.
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        let order = if field == SCORE_FIELD {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        };
        Self {
            field,
            order,
            missing: MissingPolicy::default(),
        }
    }

    /// True for the relevance pseudo-field.
    pub fn is_score(&self) -> bool {
        self.field == SCORE_FIELD
    }
}

/// Decodes `sort`: a string, an object, or an array of either.
pub fn parse_sort(value: &Value, mappings: &Mappings) -> Result<Vec<SortField>, QueryError> {
    let mut out = Vec::new();
    match value {
        Value::Array(items) => {
            for item in items {
                parse_entry(item, &mut out)?;
            }
        }
        _ => parse_entry(value, &mut out)?,
    }
    for sort in &out {
        check_sortable(sort, mappings)?;
    }
    Ok(out)
}

/// Decodes one array entry. An object entry may carry several fields.
fn parse_entry(value: &Value, out: &mut Vec<SortField>) -> Result<(), QueryError> {
    match value {
        Value::String(s) => {
            let sort = match s.strip_prefix('-') {
                Some(field) if !field.is_empty() => SortField {
                    order: SortOrder::Desc,
                    ..SortField::new(field)
                },
                _ => SortField::new(s.as_str()),
            };
            out.push(sort);
        }
        Value::Object(obj) => {
            for (field, spec) in obj {
                let mut sort = SortField::new(field.as_str());
                match spec {
                    Value::String(order) => sort.order = SortOrder::parse(order)?,
                    Value::Object(options) => apply_options(&mut sort, options)?,
                    _ => {
                        return Err(QueryError::parsing(format!(
                            "[sort] [{field}] should be a string or an object"
                        )));
                    }
                }
                out.push(sort);
            }
        }
        _ => {
            return Err(QueryError::parsing(
                "[sort] entries should be strings or objects",
            ));
        }
    }
    Ok(())
}

/// Applies `{order, missing}`.
fn apply_options(sort: &mut SortField, options: &value::Object) -> Result<(), QueryError> {
    if let Some(order) = options.get("order") {
        sort.order = SortOrder::parse(value::as_str(order, "sort", "order")?)?;
    }
    if let Some(missing) = options.get("missing") {
        sort.missing = MissingPolicy::parse(value::as_str(missing, "sort", "missing")?)?;
    }
    Ok(())
}

/// Rejects unmapped and non-sortable fields.
fn check_sortable(sort: &SortField, mappings: &Mappings) -> Result<(), QueryError> {
    if sort.field == SCORE_FIELD || sort.field == ID_FIELD {
        return Ok(());
    }
    match mappings.get(&sort.field) {
        None => Err(QueryError::illegal_argument(format!(
            "[sort] field [{}] is not mapped",
            sort.field
        ))),
        Some(property) if !property.is_sortable() => Err(QueryError::illegal_argument(format!(
            "[sort] field [{}] is not sortable",
            sort.field
        ))),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{ErrorKind, mapping::Property};

    fn mappings() -> Mappings {
        Mappings::new()
            .with_field("year", Property::numeric())
            .with_field("title", Property::text())
            .with_field("slug", Property::keyword().with_sortable(false))
    }

    #[test]
    fn string_forms() {
        let sort = parse_sort(&json!(["-year", "_score", "_id"]), &mappings()).unwrap();
        assert_eq!(sort[0].field, "year");
        assert_eq!(sort[0].order, SortOrder::Desc);
        assert_eq!(sort[1].order, SortOrder::Desc);
        assert_eq!(sort[2].order, SortOrder::Asc);
    }

    #[test]
    fn object_forms() {
        let sort = parse_sort(
            &json!({"year": {"order": "DESC", "missing": "_first"}}),
            &mappings(),
        )
        .unwrap();
        assert_eq!(
            sort,
            vec![SortField {
                field: "year".into(),
                order: SortOrder::Desc,
                missing: MissingPolicy::First,
            }]
        );

        let sort = parse_sort(&json!([{"_score": "asc"}, "year"]), &mappings()).unwrap();
        assert_eq!(sort[0].order, SortOrder::Asc);
        assert_eq!(sort[1].missing, MissingPolicy::Last);
    }

    #[test]
    fn rejects_unsortable_and_unmapped() {
        for field in ["title", "slug", "nope"] {
            let err = parse_sort(&json!(field), &mappings()).unwrap_err();
            assert_eq!(err.kind, ErrorKind::IllegalArgument, "field {field}");
        }
    }

    #[test]
    fn rejects_bad_shapes() {
        let err = parse_sort(&json!({"year": "sideways"}), &mappings()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalArgument);
        let err = parse_sort(&json!(42), &mappings()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
        let err = parse_sort(&json!({"year": 1}), &mappings()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
    }
}

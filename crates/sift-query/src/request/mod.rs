//! Request assembly.
//!
//! [`Compiler::compile`] turns a whole request document into a [`SearchPlan`]. The sections are
//! decoded in a fixed order and the first failure is returned as is:
//!
//! 1. `size`
//! 2. `query`
//! 3. `highlight`
//! 4. `from`
//! 5. `explain`
//! 6. `aggs` / `aggregations`
//! 7. `fields`
//! 8. `_source`
//! 9. `sort`

mod aggregation;
mod fields;
mod highlight;
mod sort;
mod source;

pub use aggregation::{
    Aggregation, AggregationKind, DEFAULT_TERMS_SIZE, MetricKind, RangeBucket, parse_aggregations,
};
pub use fields::{FieldRequest, parse_fields};
pub use highlight::{
    DEFAULT_FRAGMENT_SIZE, DEFAULT_POST_TAG, DEFAULT_PRE_TAG, HighlightField, HighlightSpec,
};
use log::debug;
use serde_json::Value;
use sift_config::SearchSettings;
pub use sort::{ID_FIELD, MissingPolicy, SCORE_FIELD, SortField, SortOrder, parse_sort};
pub use source::SourceFilter;

use crate::{
    analysis::AnalyzerCatalog,
    clause::Clause,
    compile::{ClauseRegistry, CompileContext},
    error::QueryError,
    mapping::Mappings,
    plan::SearchPlan,
    value,
};

/// Compiles request documents into search plans.
///
/// A compiler holds only settings and the clause registry, so one instance can serve every
/// request in a process.
#[derive(Clone, Default)]
pub struct Compiler {
    /// Process-wide limits and defaults.
    settings: SearchSettings,
    /// Clause dispatch table.
    registry: ClauseRegistry,
}

impl Compiler {
    /// A compiler with the built-in clause types.
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            settings,
            registry: ClauseRegistry::standard(),
        }
    }

    /// A compiler with a custom clause registry.
    pub fn with_registry(settings: SearchSettings, registry: ClauseRegistry) -> Self {
        Self { settings, registry }
    }

    /// The settings this compiler applies.
    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Compiles a full request document.
    pub fn compile(
        &self,
        request: &Value,
        mappings: &Mappings,
        catalog: &dyn AnalyzerCatalog,
    ) -> Result<SearchPlan, QueryError> {
        let obj = value::as_object(request, "request")?;

        let size = self.size(obj.get("size"))?;

        let query = match obj.get("query") {
            None | Some(Value::Null) => Clause::MatchAll { boost: None },
            Some(query) => self.compile_query(query, mappings, catalog)?,
        };
        let mut plan = SearchPlan::new(query, size);

        if let Some(highlight) = obj.get("highlight") {
            plan.highlight = Some(HighlightSpec::parse(highlight)?);
            plan.include_locations = true;
        }

        if let Some(from) = obj.get("from") {
            let from = value::as_i64(from, "request", "from")?;
            if from > 0 {
                plan.from = usize::try_from(from).unwrap_or(usize::MAX);
            } else if from < 0 {
                debug!("ignoring negative from [{from}]");
            }
        }

        if let Some(explain) = obj.get("explain") {
            plan.explain = value::as_bool(explain, "request", "explain")?;
        }

        let aggs = match (obj.get("aggs"), obj.get("aggregations")) {
            (Some(_), Some(_)) => {
                return Err(QueryError::parsing(
                    "[request] only one of [aggs] and [aggregations] may be given",
                ));
            }
            (aggs, aggregations) => aggs.or(aggregations),
        };
        if let Some(aggs) = aggs {
            plan.aggregations = parse_aggregations(aggs, mappings)?;
        }

        if let Some(fields) = obj.get("fields") {
            plan.fields = parse_fields(fields)?;
        }

        plan.source = SourceFilter::parse(obj.get("_source"))?;

        if let Some(sort) = obj.get("sort") {
            plan.sort = parse_sort(sort, mappings)?;
        }

        Ok(plan)
    }

    /// Compiles only a query object such as `{"match": {...}}`.
    pub fn compile_query(
        &self,
        query: &Value,
        mappings: &Mappings,
        catalog: &dyn AnalyzerCatalog,
    ) -> Result<Clause, QueryError> {
        CompileContext::new(&self.registry, mappings, catalog, &self.settings).compile(query)
    }

    /// Decodes `size`, clamping it (or the default) to the configured maximum.
    fn size(&self, size: Option<&Value>) -> Result<usize, QueryError> {
        let size = match size {
            Some(size) => value::as_usize(size, "request", "size")?,
            None => self.settings.default_size,
        };
        if size > self.settings.max_results {
            debug!(
                "clamping size [{size}] to max_results [{}]",
                self.settings.max_results
            );
            return Ok(self.settings.max_results);
        }
        Ok(size)
    }
}

/// Compiles a request with default settings and the built-in clause types.
pub fn compile(
    request: &Value,
    mappings: &Mappings,
    catalog: &dyn AnalyzerCatalog,
) -> Result<SearchPlan, QueryError> {
    Compiler::default().compile(request, mappings, catalog)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;
    use crate::{ErrorKind, mapping::Property};

    fn mappings() -> Mappings {
        Mappings::new()
            .with_field("title", Property::text())
            .with_field("year", Property::numeric())
            .with_field("tag", Property::keyword())
    }

    fn catalog() -> HashSet<String> {
        ["standard".to_string()].into_iter().collect()
    }

    fn plan(request: Value) -> Result<SearchPlan, QueryError> {
        compile(&request, &mappings(), &catalog())
    }

    #[test]
    fn empty_request() {
        let plan = plan(json!({})).unwrap();
        assert_eq!(plan.query, Clause::MatchAll { boost: None });
        assert_eq!(plan.size, 10);
        assert_eq!(plan.from, 0);
        assert!(plan.sorts_by_score());
        assert!(plan.source.is_enabled());
        assert!(!plan.include_locations);
    }

    #[test]
    fn full_request() {
        let plan = plan(json!({
            "query": {"match": {"title": "rust"}},
            "size": 5,
            "from": 20,
            "explain": true,
            "highlight": {"fields": {"title": {}}},
            "aggs": {"tags": {"terms": {"field": "tag"}}},
            "fields": ["title"],
            "_source": ["title"],
            "sort": ["-year"]
        }))
        .unwrap();
        assert_eq!(plan.query.kind().as_str(), "match");
        assert_eq!((plan.from, plan.size), (20, 5));
        assert!(plan.explain);
        assert!(plan.include_locations);
        assert_eq!(plan.aggregations[0].name, "tags");
        assert_eq!(plan.fields[0].field, "title");
        assert_eq!(plan.source.includes(), ["title".to_string()]);
        assert_eq!(plan.sort[0].order, SortOrder::Desc);
        assert!(!plan.sorts_by_score());
    }

    #[test]
    fn size_is_clamped() {
        let compiler = Compiler::new(SearchSettings {
            max_results: 100,
            ..SearchSettings::default()
        });
        let plan = compiler
            .compile(&json!({"size": 5000}), &mappings(), &catalog())
            .unwrap();
        assert_eq!(plan.size, 100);

        let compiler = Compiler::new(SearchSettings {
            max_results: 5,
            default_size: 10,
            ..SearchSettings::default()
        });
        let plan = compiler.compile(&json!({}), &mappings(), &catalog()).unwrap();
        assert_eq!(plan.size, 5);
    }

    #[test]
    fn negative_from_is_ignored() {
        assert_eq!(plan(json!({"from": -3})).unwrap().from, 0);
    }

    #[test]
    fn null_query_matches_all() {
        assert_eq!(
            plan(json!({"query": null})).unwrap().query,
            Clause::MatchAll { boost: None }
        );
    }

    #[test]
    fn error_kinds() {
        let cases = [
            (json!([]), ErrorKind::Parsing),
            (json!({"size": -1}), ErrorKind::IllegalArgument),
            (json!({"size": "ten"}), ErrorKind::Parsing),
            (json!({"query": {}}), ErrorKind::NotImplemented),
            (json!({"query": {"percolate": {}}}), ErrorKind::NotImplemented),
            (json!({"from": "x"}), ErrorKind::Parsing),
            (json!({"explain": "yes"}), ErrorKind::Parsing),
            (json!({"sort": ["title"]}), ErrorKind::IllegalArgument),
            (json!({"_source": 1}), ErrorKind::Parsing),
            (
                json!({"aggs": {"a": {"avg": {"field": "year"}}}, "aggregations": {}}),
                ErrorKind::Parsing,
            ),
        ];
        for (request, kind) in cases {
            let err = plan(request.clone()).unwrap_err();
            assert_eq!(err.kind, kind, "request {request}");
        }
    }

    #[test]
    fn earlier_sections_fail_first() {
        // size is checked before query
        let err = plan(json!({"query": {}, "size": -1})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalArgument);
    }
}

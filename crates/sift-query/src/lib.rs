//! Query DSL compiler for sift.
//!
//! This crate turns a loosely typed JSON search request into a typed [`SearchPlan`]: a query
//! tree of [`Clause`] nodes with analyzers resolved, `minimum_should_match` thresholds
//! computed, and the result window, sort, projection, highlight and aggregation sections
//! validated against the index [`Mappings`].
//!
//! Execution is not part of this crate. An engine consumes the plan, and supplies the set of
//! analyzer names it knows through [`AnalyzerCatalog`].
//!
//! ```
//! use std::collections::HashSet;
//!
//! use serde_json::json;
//! use sift_query::{Clause, Mappings, Occur, Property, compile};
//!
//! let mappings = Mappings::new()
//!     .with_field("title", Property::text())
//!     .with_field("body", Property::text());
//! let catalog: HashSet<String> = ["standard".to_string()].into_iter().collect();
//!
//! let plan = compile(
//!     &json!({
//!         "query": {"multi_match": {"query": "rust", "fields": ["title", "body"]}},
//!         "size": 5
//!     }),
//!     &mappings,
//!     &catalog,
//! )
//! .unwrap();
//!
//! let Clause::Bool(root) = &plan.query else { panic!() };
//! assert_eq!(root.children_with(Occur::Should).count(), 2);
//! assert_eq!(plan.size, 5);
//! ```

#![warn(missing_docs)]

mod analysis;
mod clause;
mod compile;
mod error;
mod mapping;
mod plan;
mod request;
mod threshold;
mod value;

pub use analysis::{
    AnalyzerCatalog, AnalyzerRef, AnalyzerSource, FieldAnalyzers, resolve_by_name,
    resolve_for_field,
};
pub use clause::{
    BoolChild, BoolClause, Clause, ClauseKind, Fuzziness, FuzzyClause, MatchClause,
    MatchPhraseClause, MultiMatchType, Occur, Operator, PatternClause, RangeClause, RangeValue,
    TermClause, TermValue, TermsClause,
};
pub use compile::{ClauseCompiler, ClauseRegistry, CompileContext, parse_date};
pub use error::{ErrorKind, QueryError};
pub use mapping::{FieldKind, Mappings, Property};
pub use plan::SearchPlan;
pub use request::{
    Aggregation, AggregationKind, Compiler, DEFAULT_FRAGMENT_SIZE, DEFAULT_POST_TAG,
    DEFAULT_PRE_TAG, DEFAULT_TERMS_SIZE, FieldRequest, HighlightField, HighlightSpec, ID_FIELD,
    MetricKind, MissingPolicy, RangeBucket, SCORE_FIELD, SortField, SortOrder, SourceFilter,
    compile,
};
pub use threshold::{ConditionalRule, Threshold, compute};
pub use value::Object;

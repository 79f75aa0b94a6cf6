//! The executable plan produced for one request.

use crate::{
    clause::Clause,
    request::{Aggregation, FieldRequest, HighlightSpec, SortField, SourceFilter},
};

/// A fully compiled request, ready for an engine to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPlan {
    /// Root of the query tree.
    pub query: Clause,
    /// Number of hits to skip.
    pub from: usize,
    /// Number of hits to return, already clamped to the configured maximum.
    pub size: usize,
    /// Sort keys in priority order. Empty means by score.
    pub sort: Vec<SortField>,
    /// `_source` projection.
    pub source: SourceFilter,
    /// Extra fields to return with each hit.
    pub fields: Vec<FieldRequest>,
    /// Highlighting, when requested.
    pub highlight: Option<HighlightSpec>,
    /// Top-level aggregations in input order.
    pub aggregations: Vec<Aggregation>,
    /// Whether to return a score explanation per hit.
    pub explain: bool,
    /// Whether the engine must track term positions for highlighting.
    pub include_locations: bool,
}

impl SearchPlan {
    /// A plan around `query` with every other option at its default.
    pub fn new(query: Clause, size: usize) -> Self {
        Self {
            query,
            from: 0,
            size,
            sort: Vec::new(),
            source: SourceFilter::all(),
            fields: Vec::new(),
            highlight: None,
            aggregations: Vec::new(),
            explain: false,
            include_locations: false,
        }
    }

    /// True when hits are ordered by relevance.
    pub fn sorts_by_score(&self) -> bool {
        self.sort.is_empty() || (self.sort.len() == 1 && self.sort[0].is_score())
    }
}

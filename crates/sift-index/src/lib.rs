//! Tantivy-backed execution of sift search plans.
//!
//! This crate holds the engine side of sift:
//! - Named analyzers, built in or assembled from config, shared with the compiler as its
//!   analyzer catalog
//! - A Tantivy schema derived from field mappings
//! - Conversion of JSON documents into index documents
//! - Lowering of compiled clauses into Tantivy queries
//! - Execution of a [`sift_query::SearchPlan`]: windowing, sorting, `_source` filtering,
//!   highlighting, explanations and aggregations
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use sift_index::{AnalyzerRegistry, SearchIndex};
//! use sift_query::{Compiler, Mappings, Property};
//!
//! let mappings = Mappings::new().with_field("title", Property::text());
//! let index =
//!     SearchIndex::create_in_ram(mappings, Arc::new(AnalyzerRegistry::new()), "standard").unwrap();
//!
//! index.add_document("1", &json!({"title": "Searching with Rust"})).unwrap();
//! index.commit().unwrap();
//!
//! let response = index
//!     .query(&Compiler::default(), &json!({"query": {"match": {"title": "rust"}}}))
//!     .unwrap();
//! assert_eq!(response.total, 1);
//! assert_eq!(response.hits[0].id, "1");
//! ```

#![warn(missing_docs)]

mod analyzer;
mod document;
mod error;
mod index;
mod lower;
mod schema;

pub use analyzer::{
    AnalyzerRegistry, build_analyzer, build_language_analyzer, parse_language, tokenize,
};
pub use document::build_document;
pub use error::IndexError;
pub use index::{Hit, SearchIndex, SearchResponse};
pub use lower::lower_clause;
pub use schema::{ID_FIELD, IndexSchema, SOURCE_FIELD};

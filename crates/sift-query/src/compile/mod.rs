//! Query tree building.
//!
//! A [`ClauseRegistry`] maps clause names to compiler functions. [`CompileContext`] dispatches a
//! query object to the compiler registered for its single key, tracks nesting depth, and gives
//! compilers access to mappings, the analyzer catalog and settings.

mod boolean;
mod query_string;
mod range;
mod term;
mod text;

use std::collections::HashMap;

use log::debug;
pub use range::parse_date;
use serde_json::Value;
use sift_config::SearchSettings;

use crate::{
    analysis::{AnalyzerCatalog, FieldAnalyzers},
    clause::Clause,
    error::QueryError,
    mapping::Mappings,
    value,
};

/// A function compiling the body of one clause type.
pub type ClauseCompiler = fn(&mut CompileContext<'_>, &Value) -> Result<Clause, QueryError>;

/// Clause name to compiler lookup.
#[derive(Clone)]
pub struct ClauseRegistry {
    /// Compilers by lowercase clause name.
    compilers: HashMap<&'static str, ClauseCompiler>,
}

impl ClauseRegistry {
    /// A registry with no compilers.
    pub fn empty() -> Self {
        Self {
            compilers: HashMap::new(),
        }
    }

    /// A registry with every built-in clause type.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("bool", boolean::compile_bool);
        registry.register("match", text::compile_match);
        registry.register("match_phrase", text::compile_match_phrase);
        registry.register("multi_match", text::compile_multi_match);
        registry.register("query_string", query_string::compile_query_string);
        registry.register("term", term::compile_term);
        registry.register("terms", term::compile_terms);
        registry.register("prefix", term::compile_prefix);
        registry.register("wildcard", term::compile_wildcard);
        registry.register("fuzzy", term::compile_fuzzy);
        registry.register("match_all", term::compile_match_all);
        registry.register("match_none", term::compile_match_none);
        registry.register("range", range::compile_range);
        registry
    }

    /// Registers a compiler, returning the one it replaced.
    ///
    /// `name` must be lowercase; lookups lowercase the clause name before matching.
    pub fn register(
        &mut self,
        name: &'static str,
        compiler: ClauseCompiler,
    ) -> Option<ClauseCompiler> {
        self.compilers.insert(name, compiler)
    }

    /// Looks up a compiler by lowercase name.
    pub fn get(&self, name: &str) -> Option<ClauseCompiler> {
        self.compilers.get(name).copied()
    }

    /// Registered clause names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.compilers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ClauseRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// State threaded through the compilation of one query tree.
pub struct CompileContext<'a> {
    /// Dispatch table.
    registry: &'a ClauseRegistry,
    /// Field mappings of the target index.
    mappings: &'a Mappings,
    /// Analyzer catalog.
    catalog: &'a dyn AnalyzerCatalog,
    /// Process-wide settings.
    settings: &'a SearchSettings,
    /// Number of clauses currently being compiled on the stack.
    depth: usize,
}

impl<'a> CompileContext<'a> {
    /// Creates a context at depth zero.
    pub fn new(
        registry: &'a ClauseRegistry,
        mappings: &'a Mappings,
        catalog: &'a dyn AnalyzerCatalog,
        settings: &'a SearchSettings,
    ) -> Self {
        Self {
            registry,
            mappings,
            catalog,
            settings,
            depth: 0,
        }
    }

    /// Field mappings.
    pub fn mappings(&self) -> &'a Mappings {
        self.mappings
    }

    /// Analyzer catalog.
    pub fn catalog(&self) -> &'a dyn AnalyzerCatalog {
        self.catalog
    }

    /// Search settings.
    pub fn settings(&self) -> &'a SearchSettings {
        self.settings
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Starts analyzer resolution for one clause.
    pub fn field_analyzers(&self, explicit: Option<&str>) -> Result<FieldAnalyzers<'a>, QueryError> {
        FieldAnalyzers::new(
            self.catalog,
            self.mappings,
            explicit,
            &self.settings.default_analyzer,
        )
    }

    /// Compiles a query object such as `{"match": {...}}`.
    ///
    /// The object must hold exactly one clause type.
    pub fn compile(&mut self, query: &Value) -> Result<Clause, QueryError> {
        let obj = value::as_object(query, "query")?;
        let mut entries = obj.iter();
        let (name, body) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            (None, _) => {
                return Err(QueryError::not_implemented(
                    "[query] empty query object is not supported",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(QueryError::parsing(format!(
                    "[query] expected exactly one clause type, found [{}]",
                    obj.keys().cloned().collect::<Vec<_>>().join(", ")
                )));
            }
        };

        let name = name.to_lowercase();
        let compiler = self.registry.get(&name).ok_or_else(|| {
            QueryError::not_implemented(format!("[{name}] query doesn't support"))
        })?;

        if self.depth >= self.settings.max_nesting_depth {
            return Err(QueryError::parsing(format!(
                "[{name}] query nested deeper than {} levels",
                self.settings.max_nesting_depth
            )));
        }

        self.depth += 1;
        debug!("compiling [{name}] clause at depth {}", self.depth);
        let result = compiler(self, body);
        self.depth -= 1;
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;
    use crate::{ErrorKind, clause::ClauseKind};

    fn compile_with(query: Value, settings: &SearchSettings) -> Result<Clause, QueryError> {
        let registry = ClauseRegistry::standard();
        let mappings = Mappings::new();
        let catalog: HashSet<String> = HashSet::from(["standard".to_string()]);
        CompileContext::new(&registry, &mappings, &catalog, settings).compile(&query)
    }

    fn compile(query: Value) -> Result<Clause, QueryError> {
        compile_with(query, &SearchSettings::default())
    }

    #[test]
    fn dispatches_by_name_case_insensitively() {
        let clause = compile(json!({"MATCH_ALL": {}})).unwrap();
        assert_eq!(clause.kind(), ClauseKind::MatchAll);
    }

    #[test]
    fn unknown_clause_is_not_implemented() {
        let err = compile(json!({"geo_shape": {}})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotImplemented);
        assert_eq!(err.message, "[geo_shape] query doesn't support");
    }

    #[test]
    fn two_clause_types_is_parsing_error() {
        let err = compile(json!({"match_all": {}, "match_none": {}})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
    }

    #[test]
    fn empty_object_is_not_implemented() {
        assert_eq!(compile(json!({})).unwrap_err().kind, ErrorKind::NotImplemented);
    }

    #[test]
    fn non_object_is_parsing_error() {
        assert_eq!(compile(json!("match_all")).unwrap_err().kind, ErrorKind::Parsing);
    }

    #[test]
    fn nesting_limit() {
        let settings = SearchSettings {
            max_nesting_depth: 3,
            ..SearchSettings::default()
        };
        let depth_three = json!({"bool": {"must": {"bool": {"must": {"match_all": {}}}}}});
        assert!(compile_with(depth_three.clone(), &settings).is_ok());

        let depth_four = json!({"bool": {"must": depth_three}});
        let err = compile_with(depth_four, &settings).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
    }

    #[test]
    fn custom_compiler_can_be_registered() {
        fn compile_nothing(_: &mut CompileContext<'_>, _: &Value) -> Result<Clause, QueryError> {
            Ok(Clause::MatchNone)
        }

        let mut registry = ClauseRegistry::standard();
        assert!(registry.register("nothing", compile_nothing).is_none());
        assert!(registry.names().contains(&"nothing"));

        let mappings = Mappings::new();
        let catalog: HashSet<String> = HashSet::new();
        let settings = SearchSettings::default();
        let clause = CompileContext::new(&registry, &mappings, &catalog, &settings)
            .compile(&json!({"nothing": null}))
            .unwrap();
        assert_eq!(clause, Clause::MatchNone);
    }
}

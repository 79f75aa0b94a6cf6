//! Analyzer resolution.
//!
//! Text clauses need to know which analyzer turns their query text into terms. The analyzer is
//! chosen, in order, from an explicit clause-level name, the field's search analyzer, the field's
//! index analyzer, and finally the process default. Within one multi-field clause, a field that
//! maps no analyzer of its own reuses the first analyzer an earlier field resolved.

use std::{collections::HashSet, hash::BuildHasher};

use log::{debug, warn};

use crate::{
    error::QueryError,
    mapping::{FieldKind, Mappings},
};

/// A catalog of analyzers that can be looked up by name.
pub trait AnalyzerCatalog {
    /// Returns true if an analyzer with this name is registered.
    fn contains(&self, name: &str) -> bool;
}

impl<S: BuildHasher> AnalyzerCatalog for HashSet<String, S> {
    fn contains(&self, name: &str) -> bool {
        HashSet::<String, S>::contains(self, name)
    }
}

/// Where a resolved analyzer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyzerSource {
    /// Named on the clause itself.
    Explicit,
    /// The field's `search_analyzer`.
    FieldSearch,
    /// The field's `analyzer`.
    FieldIndex,
    /// Reused from an earlier field of the same clause.
    Inherited,
    /// The process-wide default.
    Default,
}

/// A resolved analyzer name and its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnalyzerRef {
    /// Analyzer name, as registered in the catalog.
    pub name: String,
    /// How the name was chosen.
    pub source: AnalyzerSource,
}

impl AnalyzerRef {
    /// Creates a reference.
    pub fn new(name: impl Into<String>, source: AnalyzerSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// Reference to the process default analyzer.
    pub fn default_named(name: impl Into<String>) -> Self {
        Self::new(name, AnalyzerSource::Default)
    }
}

/// Resolves an explicitly named analyzer.
pub fn resolve_by_name(
    catalog: &dyn AnalyzerCatalog,
    name: &str,
) -> Result<AnalyzerRef, QueryError> {
    if catalog.contains(name) {
        Ok(AnalyzerRef::new(name, AnalyzerSource::Explicit))
    } else {
        Err(QueryError::not_found(format!("analyzer [{name}] not found")))
    }
}

/// Resolves the `(index, search)` analyzers mapped on a field.
///
/// Both are absent for unmapped and non-text fields. A mapped name the catalog does not know
/// is treated as absent.
pub fn resolve_for_field(
    catalog: &dyn AnalyzerCatalog,
    mappings: &Mappings,
    field: &str,
) -> (Option<AnalyzerRef>, Option<AnalyzerRef>) {
    let Some(property) = mappings.get(field) else {
        return (None, None);
    };
    if property.kind != FieldKind::Text {
        return (None, None);
    }

    let lookup = |name: Option<&String>, source: AnalyzerSource| {
        let name = name?;
        if catalog.contains(name) {
            Some(AnalyzerRef::new(name.as_str(), source))
        } else {
            warn!("field [{field}] maps unknown analyzer [{name}]; ignoring it");
            None
        }
    };

    (
        lookup(property.analyzer.as_ref(), AnalyzerSource::FieldIndex),
        lookup(property.search_analyzer.as_ref(), AnalyzerSource::FieldSearch),
    )
}

/// Per-clause analyzer resolution state.
///
/// Carries the explicit override, the analyzer inherited from earlier fields, and the default.
pub struct FieldAnalyzers<'a> {
    /// Catalog used for field lookups.
    catalog: &'a dyn AnalyzerCatalog,
    /// Field mappings.
    mappings: &'a Mappings,
    /// Clause-level analyzer; when set, every field uses it.
    explicit: Option<AnalyzerRef>,
    /// First analyzer a field of this clause resolved from its own mapping.
    inherited: Option<AnalyzerRef>,
    /// Fallback when nothing else applies.
    default: AnalyzerRef,
}

impl<'a> FieldAnalyzers<'a> {
    /// Creates the context, resolving `explicit` against the catalog.
    pub fn new(
        catalog: &'a dyn AnalyzerCatalog,
        mappings: &'a Mappings,
        explicit: Option<&str>,
        default_name: &str,
    ) -> Result<Self, QueryError> {
        let explicit = explicit
            .map(|name| resolve_by_name(catalog, name))
            .transpose()?;
        Ok(Self {
            catalog,
            mappings,
            explicit,
            inherited: None,
            default: AnalyzerRef::default_named(default_name),
        })
    }

    /// Resolves the analyzer for one field of the clause.
    ///
    /// Fields must be resolved in input order for inheritance to be deterministic.
    pub fn resolve(&mut self, field: &str) -> AnalyzerRef {
        if let Some(explicit) = &self.explicit {
            return explicit.clone();
        }

        let (index, search) = resolve_for_field(self.catalog, self.mappings, field);
        if let Some(own) = search.or(index) {
            if self.inherited.is_none() {
                self.inherited = Some(own.clone());
            }
            return own;
        }

        if let Some(inherited) = &self.inherited {
            debug!(
                "field [{field}] has no analyzer; reusing [{}] from an earlier field",
                inherited.name
            );
            return AnalyzerRef::new(inherited.name.as_str(), AnalyzerSource::Inherited);
        }

        self.default.clone()
    }
}

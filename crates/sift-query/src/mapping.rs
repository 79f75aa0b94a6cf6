//! Field mappings.
//!
//! Mappings describe the fields of an index: their type, their analyzers and what they may be
//! used for. The compiler only reads them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueryError;

/// Field mappings of an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mappings {
    /// Field definitions by name.
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
}

impl Mappings {
    /// Creates empty mappings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes mappings from their JSON form.
    pub fn from_json(value: &Value) -> Result<Self, QueryError> {
        Self::deserialize(value)
            .map_err(|e| QueryError::parsing(format!("[mappings] {e}")))
    }

    /// Adds a field, returning the mappings for chaining.
    pub fn with_field(mut self, name: impl Into<String>, property: Property) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    /// Looks up a field.
    pub fn get(&self, field: &str) -> Option<&Property> {
        self.properties.get(field)
    }

    /// Names of all indexed text fields, in name order.
    pub fn text_fields(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|(_, p)| p.kind == FieldKind::Text && p.index)
            .map(|(name, _)| name.as_str())
    }
}

/// The type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Analyzed full text.
    Text,
    /// Exact, unanalyzed string.
    Keyword,
    /// A number.
    #[serde(alias = "long", alias = "integer", alias = "double", alias = "float")]
    Numeric,
    /// A boolean.
    #[serde(alias = "boolean")]
    Bool,
    /// A timestamp.
    Date,
}

impl FieldKind {
    /// Whether range and metric operations apply to this kind.
    pub fn is_numeric_like(self) -> bool {
        matches!(self, Self::Numeric | Self::Date)
    }
}

/// Definition of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Field type.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Analyzer used at index time, and at search time unless `search_analyzer` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    /// Analyzer used at search time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_analyzer: Option<String>,
    /// Whether the field is searchable.
    #[serde(default = "default_true")]
    pub index: bool,
    /// Whether the raw value is stored.
    #[serde(default)]
    pub store: bool,
    /// Whether results may be sorted by this field; defaults to true except for text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,
    /// Whether aggregations may use this field; defaults to true except for text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregatable: Option<bool>,
    /// Whether highlight snippets may be produced from this field.
    #[serde(default)]
    pub highlightable: bool,
    /// Date format (chrono `strftime` syntax) for date fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Serde default for `index`.
fn default_true() -> bool {
    true
}

impl Property {
    /// Creates a property of the given kind with default flags.
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            analyzer: None,
            search_analyzer: None,
            index: true,
            store: false,
            sortable: None,
            aggregatable: None,
            highlightable: false,
            format: None,
        }
    }

    /// A text field.
    pub fn text() -> Self {
        Self::new(FieldKind::Text)
    }

    /// A keyword field.
    pub fn keyword() -> Self {
        Self::new(FieldKind::Keyword)
    }

    /// A numeric field.
    pub fn numeric() -> Self {
        Self::new(FieldKind::Numeric)
    }

    /// A date field.
    pub fn date() -> Self {
        Self::new(FieldKind::Date)
    }

    /// A boolean field.
    pub fn boolean() -> Self {
        Self::new(FieldKind::Bool)
    }

    /// Sets the index-time analyzer.
    pub fn with_analyzer(mut self, name: impl Into<String>) -> Self {
        self.analyzer = Some(name.into());
        self
    }

    /// Sets the search-time analyzer.
    pub fn with_search_analyzer(mut self, name: impl Into<String>) -> Self {
        self.search_analyzer = Some(name.into());
        self
    }

    /// Marks the field highlightable.
    pub fn highlightable(mut self) -> Self {
        self.highlightable = true;
        self
    }

    /// Sets the sortable flag explicitly.
    pub fn with_sortable(mut self, sortable: bool) -> Self {
        self.sortable = Some(sortable);
        self
    }

    /// Sets the aggregatable flag explicitly.
    pub fn with_aggregatable(mut self, aggregatable: bool) -> Self {
        self.aggregatable = Some(aggregatable);
        self
    }

    /// Sets the date format.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Whether results may be sorted by this field.
    pub fn is_sortable(&self) -> bool {
        self.sortable.unwrap_or(self.kind != FieldKind::Text)
    }

    /// Whether aggregations may use this field.
    pub fn is_aggregatable(&self) -> bool {
        self.aggregatable.unwrap_or(self.kind != FieldKind::Text)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_type_aliases() {
        let mappings = Mappings::from_json(&json!({
            "properties": {
                "views": {"type": "long"},
                "price": {"type": "double"},
                "published": {"type": "boolean"},
                "title": {"type": "text", "analyzer": "english", "highlightable": true}
            }
        }))
        .unwrap();

        assert_eq!(mappings.get("views").unwrap().kind, FieldKind::Numeric);
        assert_eq!(mappings.get("price").unwrap().kind, FieldKind::Numeric);
        assert_eq!(mappings.get("published").unwrap().kind, FieldKind::Bool);
        let title = mappings.get("title").unwrap();
        assert_eq!(title.analyzer.as_deref(), Some("english"));
        assert!(title.index);
        assert!(title.highlightable);
    }

    #[test]
    fn unknown_type_is_parsing_error() {
        let err = Mappings::from_json(&json!({"properties": {"geo": {"type": "geo_point"}}}))
            .unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Parsing);
    }

    #[test]
    fn sortable_defaults_by_kind() {
        assert!(!Property::text().is_sortable());
        assert!(Property::text().with_sortable(true).is_sortable());
        assert!(Property::keyword().is_sortable());
        assert!(Property::numeric().is_aggregatable());
        assert!(!Property::numeric().with_aggregatable(false).is_aggregatable());
    }

    #[test]
    fn text_fields_skips_unindexed() {
        let mut hidden = Property::text();
        hidden.index = false;
        let mappings = Mappings::new()
            .with_field("title", Property::text())
            .with_field("tag", Property::keyword())
            .with_field("notes", hidden)
            .with_field("body", Property::text());

        assert_eq!(mappings.text_fields().collect::<Vec<_>>(), vec!["body", "title"]);
    }
}

//! Tantivy schema derived from field mappings.
//!
//! Every mapped field becomes one tantivy field:
//! - `text`: tokenized with the field's index analyzer, positions recorded, stored
//! - `keyword`: a single raw token, stored, fast
//! - `numeric`: `f64`, indexed, stored, fast
//! - `bool`: indexed, stored, fast
//! - `date`: indexed, stored, fast
//!
//! Two fields are always present: `_id` (the document id, raw and stored) and `_source` (the
//! original JSON document, stored only).

use std::collections::HashMap;

use sift_query::{FieldKind, Mappings, Property};
use tantivy::schema::{
    DateOptions, FAST, Field, IndexRecordOption, NumericOptions, STORED, STRING, Schema,
    TextFieldIndexing, TextOptions,
};

use crate::{IndexError, analyzer::AnalyzerRegistry};

/// Name of the document id field.
pub const ID_FIELD: &str = "_id";

/// Name of the stored source field.
pub const SOURCE_FIELD: &str = "_source";

/// Handles to the fields of an index built from mappings.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    /// The underlying Tantivy schema.
    schema: Schema,
    /// Document id.
    pub id: Field,
    /// Original JSON document.
    pub source: Field,
    /// Mapped fields by name, with their kind.
    fields: HashMap<String, (Field, FieldKind)>,
    /// Date formats by field name.
    formats: HashMap<String, String>,
}

impl IndexSchema {
    /// Builds the schema for `mappings`.
    ///
    /// Text fields are indexed with their `analyzer`, or `default_analyzer` when they name none.
    /// Every analyzer used must be present in `analyzers`.
    pub fn from_mappings(
        mappings: &Mappings,
        analyzers: &AnalyzerRegistry,
        default_analyzer: &str,
    ) -> Result<Self, IndexError> {
        let mut builder = Schema::builder();

        let id = builder.add_text_field(ID_FIELD, STRING | STORED);
        let source = builder.add_text_field(SOURCE_FIELD, STORED);

        let mut fields = HashMap::new();
        let mut formats = HashMap::new();
        for (name, property) in &mappings.properties {
            let field = match property.kind {
                FieldKind::Text => {
                    let analyzer = property.analyzer.as_deref().unwrap_or(default_analyzer);
                    if analyzers.get(analyzer).is_none() {
                        return Err(IndexError::UnknownAnalyzer(analyzer.to_string()));
                    }
                    builder.add_text_field(name, text_options(property, analyzer))
                }
                FieldKind::Keyword => builder.add_text_field(name, STRING | STORED | FAST),
                FieldKind::Numeric => builder.add_f64_field(name, numeric_options(property)),
                FieldKind::Bool => builder.add_bool_field(name, numeric_options(property)),
                FieldKind::Date => {
                    let mut options = DateOptions::default().set_stored().set_fast();
                    if property.index {
                        options = options.set_indexed();
                    }
                    builder.add_date_field(name, options)
                }
            };
            fields.insert(name.clone(), (field, property.kind));
            if let Some(format) = &property.format {
                formats.insert(name.clone(), format.clone());
            }
        }

        Ok(Self {
            schema: builder.build(),
            id,
            source,
            fields,
            formats,
        })
    }

    /// Returns a reference to the underlying Tantivy schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Looks up a mapped field.
    pub fn field(&self, name: &str) -> Option<(Field, FieldKind)> {
        self.fields.get(name).copied()
    }

    /// Mapped fields in no particular order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Field, FieldKind)> {
        self.fields
            .iter()
            .map(|(name, (field, kind))| (name.as_str(), *field, *kind))
    }

    /// The date format of a field, if it declares one.
    pub fn format(&self, name: &str) -> Option<&str> {
        self.formats.get(name).map(String::as_str)
    }
}

/// Options for a text field.
fn text_options(property: &Property, analyzer: &str) -> TextOptions {
    let options = TextOptions::default().set_stored();
    if !property.index {
        return options;
    }
    options.set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(analyzer)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    )
}

/// Options for numeric and boolean fields.
fn numeric_options(property: &Property) -> NumericOptions {
    let options = NumericOptions::default().set_stored().set_fast();
    if property.index {
        options.set_indexed()
    } else {
        options
    }
}

//! The `highlight` section.

use serde_json::Value;

use crate::{error::QueryError, value};

/// Default opening tag around highlighted terms.
pub const DEFAULT_PRE_TAG: &str = "<mark>";

/// Default closing tag around highlighted terms.
pub const DEFAULT_POST_TAG: &str = "</mark>";

/// Default snippet length in characters.
pub const DEFAULT_FRAGMENT_SIZE: usize = 150;

/// Highlighting request.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightSpec {
    /// Fields to highlight, in input order.
    pub fields: Vec<HighlightField>,
    /// Opening tags.
    pub pre_tags: Vec<String>,
    /// Closing tags.
    pub post_tags: Vec<String>,
    /// Snippet length in characters.
    pub fragment_size: usize,
    /// Snippets per field. Zero returns the whole field.
    pub number_of_fragments: usize,
}

/// Per-field highlighting overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightField {
    /// Field name.
    pub field: String,
    /// Overrides [`HighlightSpec::fragment_size`].
    pub fragment_size: Option<usize>,
    /// Overrides [`HighlightSpec::number_of_fragments`].
    pub number_of_fragments: Option<usize>,
}

impl HighlightSpec {
    /// Decodes `{fields, pre_tags, post_tags, fragment_size, number_of_fragments}`.
    pub fn parse(v: &Value) -> Result<Self, QueryError> {
        let obj = value::as_object(v, "highlight")?;
        let mut spec = Self {
            fields: Vec::new(),
            pre_tags: vec![DEFAULT_PRE_TAG.to_string()],
            post_tags: vec![DEFAULT_POST_TAG.to_string()],
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            number_of_fragments: 1,
        };

        for (key, v) in obj {
            match key.as_str() {
                "fields" => spec.fields = parse_fields(v)?,
                "pre_tags" => {
                    spec.pre_tags = value::as_one_or_many_strings(v, "highlight", "pre_tags")?;
                }
                "post_tags" => {
                    spec.post_tags = value::as_one_or_many_strings(v, "highlight", "post_tags")?;
                }
                "fragment_size" => {
                    spec.fragment_size = value::as_usize(v, "highlight", "fragment_size")?;
                }
                "number_of_fragments" => {
                    spec.number_of_fragments =
                        value::as_usize(v, "highlight", "number_of_fragments")?;
                }
                _ => {}
            }
        }
        Ok(spec)
    }

    /// The first opening tag.
    pub fn pre_tag(&self) -> &str {
        self.pre_tags.first().map_or(DEFAULT_PRE_TAG, String::as_str)
    }

    /// The first closing tag.
    pub fn post_tag(&self) -> &str {
        self.post_tags.first().map_or(DEFAULT_POST_TAG, String::as_str)
    }
}

/// Decodes the `fields` object.
fn parse_fields(v: &Value) -> Result<Vec<HighlightField>, QueryError> {
    let obj = value::as_object(v, "highlight.fields")?;
    obj.iter()
        .map(|(field, options)| {
            let mut out = HighlightField {
                field: field.clone(),
                fragment_size: None,
                number_of_fragments: None,
            };
            if let Value::Object(options) = options {
                if let Some(size) = options.get("fragment_size") {
                    out.fragment_size = Some(value::as_usize(size, "highlight", "fragment_size")?);
                }
                if let Some(count) = options.get("number_of_fragments") {
                    out.number_of_fragments =
                        Some(value::as_usize(count, "highlight", "number_of_fragments")?);
                }
            }
            Ok(out)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ErrorKind;

    #[test]
    fn defaults() {
        let spec = HighlightSpec::parse(&json!({"fields": {"title": {}, "body": {"fragment_size": 80}}}))
            .unwrap();
        assert_eq!(spec.pre_tag(), "<mark>");
        assert_eq!(spec.fields.len(), 2);
        assert_eq!(spec.fields[0].field, "title");
        assert_eq!(spec.fields[1].fragment_size, Some(80));
    }

    #[test]
    fn custom_tags() {
        let spec = HighlightSpec::parse(&json!({"fields": {}, "pre_tags": "<b>", "post_tags": ["</b>"]}))
            .unwrap();
        assert_eq!(spec.pre_tag(), "<b>");
        assert_eq!(spec.post_tag(), "</b>");
    }

    #[test]
    fn errors() {
        let err = HighlightSpec::parse(&json!({"fragment_size": -1})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalArgument);
        let err = HighlightSpec::parse(&json!({"fields": ["title"]})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
        let err = HighlightSpec::parse(&json!({"pre_tags": [1]})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
    }
}

//! `_source` projection.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::{Map, Value};

use crate::{error::QueryError, value};

/// Include and exclude glob patterns over dotted field paths.
///
/// An empty include list keeps every field; excludes win over includes. `enabled == false`
/// drops the source entirely.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    /// Whether any source is returned.
    enabled: bool,
    /// Include patterns as written.
    includes: Vec<String>,
    /// Exclude patterns as written.
    excludes: Vec<String>,
    /// Compiled includes.
    include_set: GlobSet,
    /// Compiled excludes.
    exclude_set: GlobSet,
}

impl PartialEq for SourceFilter {
    fn eq(&self, other: &Self) -> bool {
        self.enabled == other.enabled
            && self.includes == other.includes
            && self.excludes == other.excludes
    }
}

impl SourceFilter {
    /// Returns the whole source.
    pub fn all() -> Self {
        Self {
            enabled: true,
            includes: Vec::new(),
            excludes: Vec::new(),
            include_set: GlobSet::empty(),
            exclude_set: GlobSet::empty(),
        }
    }

    /// Returns no source.
    pub fn none() -> Self {
        Self {
            enabled: false,
            ..Self::all()
        }
    }

    /// Builds a filter from include and exclude patterns.
    pub fn from_patterns(includes: Vec<String>, excludes: Vec<String>) -> Result<Self, QueryError> {
        Ok(Self {
            enabled: true,
            include_set: build_set(&includes)?,
            exclude_set: build_set(&excludes)?,
            includes,
            excludes,
        })
    }

    /// Decodes `_source`: a boolean, a pattern, a list, or `{includes, excludes}`.
    pub fn parse(value: Option<&Value>) -> Result<Self, QueryError> {
        match value {
            None | Some(Value::Null) | Some(Value::Bool(true)) => Ok(Self::all()),
            Some(Value::Bool(false)) => Ok(Self::none()),
            Some(Value::String(pattern)) => Self::from_patterns(vec![pattern.clone()], Vec::new()),
            Some(v @ Value::Array(_)) => {
                Self::from_patterns(value::as_string_list(v, "_source", "patterns")?, Vec::new())
            }
            Some(Value::Object(obj)) => {
                let mut includes = Vec::new();
                let mut excludes = Vec::new();
                for (key, v) in obj {
                    match key.as_str() {
                        "includes" | "include" => {
                            includes = value::as_one_or_many_strings(v, "_source", key)?;
                        }
                        "excludes" | "exclude" => {
                            excludes = value::as_one_or_many_strings(v, "_source", key)?;
                        }
                        _ => {}
                    }
                }
                Self::from_patterns(includes, excludes)
            }
            Some(_) => Err(QueryError::parsing(
                "[_source] should be a boolean, a string, an array or an object",
            )),
        }
    }

    /// Whether any source is returned.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Include patterns.
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Exclude patterns.
    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// Whether a dotted field path survives the filter.
    pub fn allows(&self, path: &str) -> bool {
        if !self.enabled || self.exclude_set.is_match(path) {
            return false;
        }
        self.includes.is_empty() || self.include_set.is_match(path)
    }

    /// Projects a document. Returns `None` when the source is disabled.
    pub fn apply(&self, document: &Value) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        if self.includes.is_empty() && self.excludes.is_empty() {
            return Some(document.clone());
        }
        match document {
            Value::Object(obj) => Some(Value::Object(self.project(obj, ""))),
            other => Some(other.clone()),
        }
    }

    /// Recursive worker for [`Self::apply`].
    fn project(&self, obj: &Map<String, Value>, prefix: &str) -> Map<String, Value> {
        let mut out = Map::new();
        for (key, v) in obj {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            if self.exclude_set.is_match(&path) {
                continue;
            }
            if self.allows(&path) {
                out.insert(key.clone(), v.clone());
            } else if let Value::Object(inner) = v {
                let projected = self.project(inner, &path);
                if !projected.is_empty() {
                    out.insert(key.clone(), Value::Object(projected));
                }
            }
        }
        out
    }
}

impl Default for SourceFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Compiles a list of glob patterns.
fn build_set(patterns: &[String]) -> Result<GlobSet, QueryError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            QueryError::parsing(format!("[_source] invalid pattern [{pattern}]: {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| QueryError::parsing(format!("[_source] invalid patterns: {e}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ErrorKind;

    fn doc() -> Value {
        json!({
            "title": "Rust",
            "author": {"name": "Ferris", "email": "ferris@example.com"},
            "body": "text"
        })
    }

    #[test]
    fn defaults_and_disabled() {
        assert_eq!(SourceFilter::parse(None).unwrap().apply(&doc()), Some(doc()));
        assert_eq!(SourceFilter::parse(Some(&json!(false))).unwrap().apply(&doc()), None);
    }

    #[test]
    fn includes() {
        let filter = SourceFilter::parse(Some(&json!(["title", "author.*"]))).unwrap();
        assert_eq!(
            filter.apply(&doc()),
            Some(json!({
                "title": "Rust",
                "author": {"name": "Ferris", "email": "ferris@example.com"}
            }))
        );
    }

    #[test]
    fn excludes_win() {
        let filter = SourceFilter::parse(Some(&json!({
            "includes": "author.*",
            "excludes": ["author.email"]
        })))
        .unwrap();
        assert!(filter.allows("author.name"));
        assert!(!filter.allows("author.email"));
        assert_eq!(filter.apply(&doc()), Some(json!({"author": {"name": "Ferris"}})));
    }

    #[test]
    fn invalid() {
        let err = SourceFilter::parse(Some(&json!("a["))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
        let err = SourceFilter::parse(Some(&json!(3))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
    }
}
